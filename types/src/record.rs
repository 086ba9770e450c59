//! Structured failure reports.
//!
//! An [`ErrorRecord`] is both the wire body of a failure report and the
//! payload of the "invocation error" log line.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const HANDLER_ERROR: &str = "Runtime.HandlerError";
pub const UNMARSHAL_ERROR: &str = "Runtime.UnmarshalError";
pub const MARSHAL_ERROR: &str = "Runtime.MarshalError";

/// A single frame of a captured panic stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub path: String,
    pub line: u32,
    pub label: String,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.label, self.path, self.line)
    }
}

/// Failure description: taxonomy tag, message, and (for panics) stack frames.
///
/// A non-empty `stack_trace` means the record came from a contained panic.
/// The runtime loop relies on that to decide whether the process must exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(rename = "errorType")]
    pub error_type: String,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
    #[serde(
        rename = "stackTrace",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub stack_trace: Vec<StackFrame>,
}

impl ErrorRecord {
    #[must_use]
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: error_message.into(),
            stack_trace: Vec::new(),
        }
    }

    #[must_use]
    pub fn handler(error_message: impl Into<String>) -> Self {
        Self::new(HANDLER_ERROR, error_message)
    }

    #[must_use]
    pub fn unmarshal(err: &dyn fmt::Display) -> Self {
        Self::new(UNMARSHAL_ERROR, format!("failed to unmarshal input: {err}"))
    }

    #[must_use]
    pub fn marshal(err: &dyn fmt::Display) -> Self {
        Self::new(MARSHAL_ERROR, format!("failed to marshal output: {err}"))
    }

    #[must_use]
    pub fn panic(
        error_type: impl Into<String>,
        error_message: impl Into<String>,
        stack_trace: Vec<StackFrame>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: error_message.into(),
            stack_trace,
        }
    }

    #[must_use]
    pub fn is_panic(&self) -> bool {
        !self.stack_trace.is_empty()
    }

    /// Encode as the failure-report body.
    ///
    /// Never fails: if the record itself cannot be encoded a minimal
    /// `Runtime.MarshalError` body is returned instead.
    #[must_use]
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|e| {
            let fallback = serde_json::json!({
                "errorType": MARSHAL_ERROR,
                "errorMessage": format!("failed to marshal error: {e}"),
            });
            fallback.to_string().into_bytes()
        })
    }

    /// Stack rendered one frame per line, for log output.
    #[must_use]
    pub fn render_stack(&self) -> String {
        self.stack_trace
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.error_message)
    }
}

impl std::error::Error for ErrorRecord {}
