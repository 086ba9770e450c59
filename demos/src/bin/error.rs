//! Logs at every level, then panics on an out-of-bounds index.
//!
//! Installs its own JSON subscriber, so every line carries the request id of
//! the invocation that produced it.

use std::process::ExitCode;

use ferrule_engine::logging::{ENV_LOG_LEVEL, level_directive};
use ferrule_engine::{Context, Options};
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

async fn handler(_ctx: Context, event: serde_json::Value) -> anyhow::Result<serde_json::Value> {
    tracing::debug!(%event, "debug message");
    tracing::info!(%event, "info message");
    tracing::warn!(%event, "warn message");
    tracing::error!(%event, "error message");

    let words = vec!["hey"];
    let idx = words.len();
    println!("{}", words[idx]);

    Ok(serde_json::Value::Null)
}

async fn with_request_span(
    ctx: Context,
    event: serde_json::Value,
) -> anyhow::Result<serde_json::Value> {
    let span = tracing::info_span!("invocation", request_id = %ctx.request_id());
    handler(ctx, event).instrument(span).await
}

fn init_json_logging() {
    let level = std::env::var(ENV_LOG_LEVEL).map_or("info", |raw| level_directive(&raw));
    tracing_subscriber::fmt()
        .json()
        .with_current_span(true)
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stdout)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_json_logging();
    ferrule_engine::start(with_request_span, Options::new().with_default_logging(false)).await
}
