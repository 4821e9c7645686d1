//! Tracing subscriber setup
//!
//! `RUST_LOG` overrides the default `scout=info` filter. When a log directory
//! is configured, everything is mirrored to `scout.log` there.

use crate::config::ScoutConfig;
use crate::error::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const DEFAULT_FILTER: &str = "scout=info";
pub const LOG_FILE: &str = "scout.log";

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Install the global subscriber; call once from a binary's `main`
pub fn init(config: &ScoutConfig) -> Result<()> {
    match &config.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;
            let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);

            tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_appender))
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
    Ok(())
}
