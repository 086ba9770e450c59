//! Process-wide trace token slot.
//!
//! Holds the trace token of the invocation currently being handled, for
//! tracing integrations that cannot reach the [`Context`](crate::Context).
//! One slot for the whole process is only sound because invocations are
//! handled strictly one at a time; code that can reach the context should
//! read [`Context::trace_id`](crate::Context::trace_id) instead.

use std::sync::{PoisonError, RwLock};

static TRACE_ID: RwLock<Option<String>> = RwLock::new(None);

/// Trace token of the in-flight invocation, if propagation is enabled and the
/// invocation carried one.
#[must_use]
pub fn current_trace_id() -> Option<String> {
    TRACE_ID
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Overwrite the slot. `None` clears it.
pub(crate) fn set_trace_id(trace_id: Option<&str>) {
    *TRACE_ID.write().unwrap_or_else(PoisonError::into_inner) = trace_id.map(str::to_string);
}
