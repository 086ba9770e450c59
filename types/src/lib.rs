//! Core domain types for ferrule.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Both the control-plane clients and the execution engine build on it.
//!
//! # Contents
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`ids`] | Opaque identifiers issued by the control plane |
//! | [`invocation`] | One unit of work and its response-channel metadata |
//! | [`identity`] | Identity and client-context blobs carried with an invocation |
//! | [`record`] | Structured failure reports sent back to the control plane |
//! | [`stack`] | Stack frame extraction from rendered backtraces |
//! | [`taxonomy`] | Error and panic classification into `Runtime.*` tags |
//! | [`extension`] | Extension registration and lifecycle event wire types |

#![allow(clippy::missing_errors_doc)]

pub mod extension;
pub mod identity;
pub mod ids;
pub mod invocation;
pub mod record;
pub mod stack;
pub mod taxonomy;

pub use extension::{EventType, ExtensionEvent, RegisterRequest, Tracing};
pub use identity::{ClientApplication, ClientContext, CognitoIdentity};
pub use ids::{ExtensionId, RequestId};
pub use invocation::{
    DeadlineError, HEADER_CLIENT_CONTEXT, HEADER_COGNITO_IDENTITY, HEADER_DEADLINE_MS,
    HEADER_EXTENSION_IDENTIFIER, HEADER_EXTENSION_NAME, HEADER_FUNCTION_ARN, HEADER_REQUEST_ID,
    HEADER_TRACE_ID, Invocation, InvocationMetadata, MetadataError, parse_deadline_ms,
};
pub use record::{ErrorRecord, StackFrame};
pub use stack::{
    LOCATION_LABEL, MAX_STACK_FRAMES, frames_from_backtrace, location_frame, minimal_path,
    short_label,
};
pub use taxonomy::{Taxonomy, panic_message, short_type_name};
