//! Runs an in-process extension that counts invocations.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use ferrule_engine::{Context, InternalExtension, Options};

const EXTENSION_NAME: &str = "Extension.Example";

async fn handler(_ctx: Context, event: serde_json::Value) -> anyhow::Result<serde_json::Value> {
    Ok(event)
}

fn counting_extension() -> InternalExtension {
    let invocations = Arc::new(AtomicUsize::new(0));
    let on_invoke = Arc::clone(&invocations);

    InternalExtension::new(EXTENSION_NAME)
        .on_init(|| -> anyhow::Result<()> {
            tracing::info!(extension = EXTENSION_NAME, "initialised");
            Ok(())
        })
        .on_invoke(move |deadline, event| {
            let seen = on_invoke.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                let remaining_ms = deadline.map(|d| d.remaining().as_millis());
                tracing::info!(
                    extension = EXTENSION_NAME,
                    request_id = ?event.request_id,
                    remaining_ms,
                    seen,
                    "invoke"
                );
            }
        })
        .on_sigterm(move |deadline| async move {
            let started = Instant::now();
            tracing::info!(
                extension = EXTENSION_NAME,
                total = invocations.load(Ordering::SeqCst),
                "shutting down"
            );
            tracing::info!(
                extension = EXTENSION_NAME,
                cleanup_ms = started.elapsed().as_millis(),
                budget_left_ms = deadline.remaining().as_millis(),
                "cleanup complete"
            );
        })
}

#[tokio::main]
async fn main() -> ExitCode {
    let options = Options::new().with_extension(counting_extension());
    ferrule_engine::start(handler, options).await
}
