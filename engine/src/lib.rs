//! Execution engine for ferrule.
//!
//! Pulls invocations from the control plane one at a time, runs the user
//! handler under panic containment, and reports each result. Optional
//! in-process extensions run their own event loops alongside.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`context`] | Per-invocation [`Context`] and advisory [`Deadline`] |
//! | [`handler`] | The [`Handler`] contract |
//! | [`pipeline`] | One invocation end to end |
//! | [`panic`] | Panic containment and stack capture |
//! | [`extension`] | [`InternalExtension`] and [`ExtensionManager`] |
//! | [`trace`] | Process-wide trace token slot |
//! | [`logging`] | Default `tracing` subscriber |
//!
//! # Example
//!
//! ```no_run
//! use ferrule_engine::{Context, Options};
//!
//! async fn echo(ctx: Context, input: serde_json::Value) -> Result<serde_json::Value, String> {
//!     Ok(serde_json::json!({ "requestId": ctx.request_id().as_str(), "input": input }))
//! }
//!
//! # async fn main_() -> std::process::ExitCode {
//! ferrule_engine::start(echo, Options::new()).await
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod extension;
pub mod handler;
pub mod logging;
pub mod panic;
pub mod pipeline;
mod runtime;
pub mod trace;

pub use config::{Options, RuntimeEnv};
pub use context::{Context, Deadline};
pub use error::{BoxError, ConfigError, RuntimeError};
pub use extension::{ExtensionManager, HookFut, InternalExtension, SHUTDOWN_BUDGET};
pub use handler::Handler;
pub use pipeline::{InvocationOutcome, Pipeline};
pub use runtime::{run, run_until, start};

pub use ferrule_client;
pub use ferrule_types;
