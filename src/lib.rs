//! Discord Scout — polls Discord channels for game-server discovery embeds
//! and serves the extracted events over a small JSON API.

pub mod config;
pub mod discord;
pub mod error;
pub mod extract;
pub mod poller;
pub mod routes;
pub mod store;
