//! Configuration, read from the environment at startup.

use secrecy::SecretString;
use serde::Serialize;

use crate::error::ConfigError;

/// Default Discord REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Default HTTP listen port.
pub const DEFAULT_PORT: u16 = 8000;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot token presented to the Discord API (`Authorization: Bot <token>`).
    pub bot_token: SecretString,
    /// Channel ids, in the order they are polled.
    pub channel_ids: Vec<String>,
    /// Base URL of the Discord REST API.
    pub api_base: String,
    /// Port the HTTP API listens on.
    pub port: u16,
}

impl Config {
    /// Read configuration from environment variables.
    ///
    /// `DISCORD_BOT_TOKEN` and `DISCORD_CHANNELS` are required;
    /// `DISCORD_API_BASE` and `PORT` have defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token =
            std::env::var("DISCORD_BOT_TOKEN").map_err(|_| ConfigError::MissingRequired {
                key: "DISCORD_BOT_TOKEN".to_string(),
                hint: "export DISCORD_BOT_TOKEN=<bot token>".to_string(),
            })?;

        let channels_raw =
            std::env::var("DISCORD_CHANNELS").map_err(|_| ConfigError::MissingRequired {
                key: "DISCORD_CHANNELS".to_string(),
                hint: "export DISCORD_CHANNELS=<id>,<id>,...".to_string(),
            })?;

        let channel_ids: Vec<String> = channels_raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if channel_ids.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "DISCORD_CHANNELS".to_string(),
                message: "expected a comma-separated list of channel ids".to_string(),
            });
        }

        let api_base =
            std::env::var("DISCORD_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| DEFAULT_PORT.to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: "expected a port number".to_string(),
            })?;

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            channel_ids,
            api_base,
            port,
        })
    }
}

/// Hosting platform details, detected from well-known environment variables.
///
/// Reported by the `/api/server` and `/api/health` endpoints so clients can
/// tell where the service is running and which URL reaches it.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformInfo {
    pub platform: &'static str,
    pub public_url: String,
}

/// Detect the hosting platform the service runs on.
///
/// Falls back to `local` with a localhost URL when no platform marker is set.
pub fn platform_info(port: u16) -> PlatformInfo {
    if std::env::var("RENDER").is_ok() {
        PlatformInfo {
            platform: "render",
            public_url: std::env::var("RENDER_EXTERNAL_URL")
                .unwrap_or_else(|_| "https://your-app.onrender.com".to_string()),
        }
    } else if let Ok(url) = std::env::var("RAILWAY_STATIC_URL") {
        PlatformInfo {
            platform: "railway",
            public_url: url,
        }
    } else if let Ok(app) = std::env::var("FLY_APP_NAME") {
        PlatformInfo {
            platform: "fly",
            public_url: format!("https://{}.fly.dev", app),
        }
    } else if let Ok(app) = std::env::var("HEROKU_APP_NAME") {
        PlatformInfo {
            platform: "heroku",
            public_url: format!("https://{}.herokuapp.com", app),
        }
    } else {
        PlatformInfo {
            platform: "local",
            public_url: format!("http://localhost:{}", port),
        }
    }
}
