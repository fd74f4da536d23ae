//! # slackline
//!
//! Command-line RTM client. Connects, logs incoming events and sends
//! commands typed on stdin (`<type> [json fields]`, e.g.
//! `typing {"channel":"D024BE91L"}`).
//!
//! ## Usage
//!
//! ```bash
//! # Run with the token from the environment
//! SLACKLINE_TOKEN=xoxb-... slackline
//!
//! # Run with a config file
//! slackline /path/to/slackline.toml
//! ```

mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slackline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args_os().nth(1) {
        Some(path) => config::Config::from_file(path)?,
        None => config::Config::load()?,
    };

    tracing::info!(api = %config.api.base_url, "Starting slackline");

    metrics::init_metrics();

    handlers::run_client(config).await
}
