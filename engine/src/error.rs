use ferrule_client::TransportError;
use ferrule_types::{ErrorRecord, RequestId};
use thiserror::Error;

/// Error type extension init hooks may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("AWS_LAMBDA_RUNTIME_API is not set")]
    MissingRuntimeApi,
}

/// Conditions that end the runtime loop.
///
/// Per-invocation failures never appear here; they are reported to the
/// control plane and the loop continues. The one exception is a contained
/// panic, which is reported and then surfaced as [`RuntimeError::HandlerPanicked`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to fetch next invocation: {0}")]
    Fetch(#[source] TransportError),
    #[error("failed to report invocation result: {0}")]
    Report(#[source] TransportError),
    #[error("handler panicked while processing {request_id}: {record}")]
    HandlerPanicked {
        request_id: RequestId,
        record: ErrorRecord,
    },
    #[error("extension {name} failed to initialize: {source}")]
    ExtensionInit {
        name: String,
        #[source]
        source: BoxError,
    },
    #[error("extension {name} failed to register: {source}")]
    ExtensionRegister {
        name: String,
        #[source]
        source: TransportError,
    },
    #[error("failed to create control-plane client: {0}")]
    Client(#[source] TransportError),
    #[error("failed to install termination signal handler: {0}")]
    Signal(#[source] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RuntimeError {
    /// True when the loop stopped because a handler panicked.
    ///
    /// The panic has already been logged and reported at that point.
    #[must_use]
    pub fn is_fatal_panic(&self) -> bool {
        matches!(self, Self::HandlerPanicked { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, RuntimeError};
    use ferrule_types::{ErrorRecord, RequestId};

    #[test]
    fn only_handler_panics_are_fatal_panics() {
        let panicked = RuntimeError::HandlerPanicked {
            request_id: RequestId::new("req-1"),
            record: ErrorRecord::panic("Runtime.Panic", "boom", Vec::new()),
        };
        assert!(panicked.is_fatal_panic());
        assert_eq!(
            panicked.to_string(),
            "handler panicked while processing req-1: Runtime.Panic: boom"
        );

        let config = RuntimeError::from(ConfigError::MissingRuntimeApi);
        assert!(!config.is_fatal_panic());
        assert_eq!(config.to_string(), "AWS_LAMBDA_RUNTIME_API is not set");
    }
}
