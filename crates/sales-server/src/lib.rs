//! # sales-server
//!
//! Binaries for the sales agent:
//!
//! - `sales-tool-server`: the sales tool catalog served over stdin/stdout
//! - `sales-agent`: client CLI (smoke test, REPL, tools listing, Gemini chat)

pub mod commands;
pub mod config;

pub use config::AppConfig;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the subscriber. Logs go to stderr; stdout may carry the protocol.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
