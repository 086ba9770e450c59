//! The invocation loop.

use std::future::Future;
use std::pin::Pin;
use std::process::ExitCode;

use ferrule_client::{ExtensionsClient, RuntimeClient};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use crate::config::{Options, RuntimeEnv};
use crate::error::RuntimeError;
use crate::extension::ExtensionManager;
use crate::handler::Handler;
use crate::logging;
use crate::pipeline::Pipeline;

type ShutdownSignal = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Serve invocations with `handler` until a fatal condition or shutdown.
///
/// With extensions configured, SIGTERM (Ctrl-C off unix) shuts them down and
/// the loop then returns `Ok(())`. Without extensions no signal handler is
/// installed. Every other exit is an `Err`.
pub async fn run<H, I, O>(handler: H, options: Options, env: RuntimeEnv) -> Result<(), RuntimeError>
where
    H: Handler<I, O>,
    I: DeserializeOwned,
    O: Serialize,
{
    let signal = if options.extensions.is_empty() {
        None
    } else {
        Some(termination_signal().map_err(RuntimeError::Signal)?)
    };
    serve(handler, options, env, signal).await
}

/// Like [`run`], with `shutdown` standing in for the termination signal.
///
/// `shutdown` is only observed when extensions are configured.
pub async fn run_until<H, I, O, S>(
    handler: H,
    options: Options,
    env: RuntimeEnv,
    shutdown: S,
) -> Result<(), RuntimeError>
where
    H: Handler<I, O>,
    I: DeserializeOwned,
    O: Serialize,
    S: Future<Output = ()> + Send + 'static,
{
    serve(handler, options, env, Some(Box::pin(shutdown))).await
}

/// Entry point for a runtime binary.
///
/// Reads the environment, installs the default subscriber unless disabled,
/// and runs the loop. Exit code 0 only after a graceful shutdown.
pub async fn start<H, I, O>(handler: H, options: Options) -> ExitCode
where
    H: Handler<I, O>,
    I: DeserializeOwned,
    O: Serialize,
{
    if options.default_logging {
        logging::init_default_subscriber();
    }

    let env = match RuntimeEnv::from_env() {
        Ok(env) => env,
        Err(e) => {
            tracing::error!(error = %e, "invalid runtime environment");
            return ExitCode::FAILURE;
        }
    };

    match run(handler, options, env).await {
        Ok(()) => ExitCode::SUCCESS,
        // Already logged in full before it was reported.
        Err(e) if e.is_fatal_panic() => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "runtime stopped");
            ExitCode::FAILURE
        }
    }
}

async fn serve<H, I, O>(
    handler: H,
    options: Options,
    env: RuntimeEnv,
    signal: Option<ShutdownSignal>,
) -> Result<(), RuntimeError>
where
    H: Handler<I, O>,
    I: DeserializeOwned,
    O: Serialize,
{
    let Options {
        trace_id,
        extensions,
        taxonomy,
        ..
    } = options;

    let client = RuntimeClient::new(&env.runtime_api).map_err(RuntimeError::Client)?;
    let pipeline = Pipeline::new(client)
        .with_taxonomy(taxonomy)
        .with_trace_id(trace_id)
        .with_function(env.function_name.clone(), env.function_version.clone());

    let mut stopped = match signal {
        Some(signal) if !extensions.is_empty() => {
            let ext_client =
                ExtensionsClient::new(&env.runtime_api).map_err(RuntimeError::Client)?;
            let manager = ExtensionManager::start(ext_client, extensions).await?;
            Some(watch_for_shutdown(manager, signal))
        }
        _ => None,
    };

    tracing::info!(runtime_api = %env.runtime_api, "runtime started");
    loop {
        let next = match stopped.as_mut() {
            Some(stopped) => tokio::select! {
                biased;
                _ = stopped => {
                    tracing::info!("extensions shut down, stopping runtime");
                    return Ok(());
                }
                next = pipeline.client().next_invocation() => next,
            },
            None => pipeline.client().next_invocation().await,
        };
        let invocation = next.map_err(RuntimeError::Fetch)?;
        pipeline.handle_invocation(&handler, invocation).await?;
    }
}

/// Shut the manager down once `signal` fires; the receiver resolves afterwards.
fn watch_for_shutdown(manager: ExtensionManager, signal: ShutdownSignal) -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        signal.await;
        tracing::info!("termination requested, shutting down extensions");
        manager.shutdown().await;
        let _ = tx.send(());
    });
    rx
}

#[cfg(unix)]
fn termination_signal() -> std::io::Result<ShutdownSignal> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    Ok(Box::pin(async move {
        sigterm.recv().await;
    }))
}

#[cfg(not(unix))]
fn termination_signal() -> std::io::Result<ShutdownSignal> {
    Ok(Box::pin(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }))
}
