use std::sync::Arc;

use axum::http::Request;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

use discord_scout::config::{Config, platform_info};
use discord_scout::discord::DiscordClient;
use discord_scout::poller::Poller;
use discord_scout::routes::{AppState, router};
use discord_scout::store::SeenStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let platform = platform_info(config.port);
    eprintln!("📡 Discord Scout v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Platform: {} ({})", platform.platform, platform.public_url);
    eprintln!("   API: http://0.0.0.0:{}/api/messages/new", config.port);
    eprintln!("   Channels: {}", config.channel_ids.len());
    for (i, channel_id) in config.channel_ids.iter().enumerate() {
        eprintln!("     {}. {}", i + 1, channel_id);
    }
    eprintln!();

    let client = DiscordClient::new(config.api_base.clone(), config.bot_token.clone());

    // Startup self-test: log which channels the bot can actually read.
    for channel_id in &config.channel_ids {
        match client.probe(channel_id).await {
            Ok(info) => tracing::info!(
                channel_id = %channel_id,
                name = info.name.as_deref().unwrap_or("?"),
                "Channel accessible"
            ),
            Err(e) => tracing::warn!(
                channel_id = %channel_id,
                error = %e,
                "Channel probe failed"
            ),
        }
    }

    let store = Arc::new(SeenStore::new());
    let poller = Arc::new(Poller::new(
        Arc::new(client),
        Arc::clone(&store),
        config.channel_ids.clone(),
    ));

    let state = AppState {
        poller,
        store,
        port: config.port,
    };

    // Build router with middleware
    let app = router(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "HTTP API listening");

    axum::serve(listener, app).await?;

    Ok(())
}
