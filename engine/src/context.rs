//! Per-invocation execution context.

use std::time::{Duration, SystemTime};

use ferrule_types::{ClientContext, CognitoIdentity, ErrorRecord, InvocationMetadata, RequestId};

/// Absolute point in time by which work should finish.
///
/// Deadlines are advisory. Nothing is interrupted when one passes; code is
/// expected to check [`Deadline::remaining`] or await [`Deadline::expired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline(SystemTime);

impl Deadline {
    #[must_use]
    pub fn at(when: SystemTime) -> Self {
        Self(when)
    }

    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self(SystemTime::now() + budget)
    }

    #[must_use]
    pub fn when(&self) -> SystemTime {
        self.0
    }

    /// Time left, saturating at zero.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.0
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Resolves once the deadline has passed.
    pub async fn expired(self) {
        tokio::time::sleep(self.remaining()).await;
    }
}

/// Read-only facts about the invocation being handled.
#[derive(Debug, Clone)]
pub struct Context {
    request_id: RequestId,
    invoked_function_arn: String,
    identity: Option<CognitoIdentity>,
    client_context: Option<ClientContext>,
    trace_id: Option<String>,
    deadline: Deadline,
}

impl Context {
    /// Context with only an id and a deadline, for exercising handlers directly.
    #[must_use]
    pub fn new(request_id: RequestId, deadline: Deadline) -> Self {
        Self {
            request_id,
            invoked_function_arn: String::new(),
            identity: None,
            client_context: None,
            trace_id: None,
            deadline,
        }
    }

    /// Build the context for a fetched invocation.
    ///
    /// Undecodable metadata becomes a handler-level failure record so it can
    /// be reported against `request_id`.
    pub(crate) fn from_metadata(
        request_id: RequestId,
        metadata: &InvocationMetadata,
    ) -> Result<Self, ErrorRecord> {
        let deadline = metadata
            .deadline()
            .map_err(|e| ErrorRecord::handler(e.to_string()))?;
        let identity = metadata
            .identity()
            .map_err(|e| ErrorRecord::handler(e.to_string()))?;
        let client_context = metadata
            .client_context()
            .map_err(|e| ErrorRecord::handler(e.to_string()))?;

        Ok(Self {
            request_id,
            invoked_function_arn: metadata.invoked_function_arn.clone().unwrap_or_default(),
            identity,
            client_context,
            trace_id: metadata.trace_id.clone().filter(|t| !t.is_empty()),
            deadline: Deadline::at(deadline),
        })
    }

    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    #[must_use]
    pub fn invoked_function_arn(&self) -> &str {
        &self.invoked_function_arn
    }

    #[must_use]
    pub fn identity(&self) -> Option<&CognitoIdentity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn client_context(&self) -> Option<&ClientContext> {
        self.client_context.as_ref()
    }

    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    #[must_use]
    pub fn deadline(&self) -> Deadline {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::{Context, Deadline};
    use ferrule_types::{InvocationMetadata, RequestId};
    use std::time::{Duration, UNIX_EPOCH};

    fn metadata(deadline_ms: &str) -> InvocationMetadata {
        InvocationMetadata {
            deadline_ms: Some(deadline_ms.to_string()),
            ..InvocationMetadata::default()
        }
    }

    #[test]
    fn deadline_in_the_past_is_expired() {
        let deadline = Deadline::at(UNIX_EPOCH);
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn deadline_in_the_future_has_time_left() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.is_expired());
        assert!(deadline.remaining() > Duration::from_secs(59));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_resolves_at_deadline() {
        let start = tokio::time::Instant::now();
        Deadline::after(Duration::from_millis(50)).expired().await;
        assert!(start.elapsed() >= Duration::from_millis(49));
    }

    #[test]
    fn builds_from_metadata() {
        let meta = InvocationMetadata {
            deadline_ms: Some("1700000000000".to_string()),
            trace_id: Some("Root=1-abc".to_string()),
            cognito_identity: Some(r#"{"cognito_identity_id":"us-east-1:42"}"#.to_string()),
            client_context: Some(r#"{"custom":{"k":"v"}}"#.to_string()),
            invoked_function_arn: Some("arn:aws:lambda:us-east-1:1:function:f".to_string()),
        };
        let ctx = Context::from_metadata(RequestId::new("req-1"), &meta).unwrap();

        assert_eq!(ctx.request_id().as_str(), "req-1");
        assert_eq!(ctx.invoked_function_arn(), "arn:aws:lambda:us-east-1:1:function:f");
        assert_eq!(ctx.trace_id(), Some("Root=1-abc"));
        assert_eq!(
            ctx.identity().map(|i| i.cognito_identity_id.as_str()),
            Some("us-east-1:42")
        );
        assert_eq!(
            ctx.client_context().and_then(|c| c.custom.get("k")).map(String::as_str),
            Some("v")
        );
        assert_eq!(
            ctx.deadline().when(),
            UNIX_EPOCH + Duration::from_millis(1_700_000_000_000)
        );
    }

    #[test]
    fn bad_deadline_is_handler_failure() {
        let err = Context::from_metadata(RequestId::new("req-1"), &metadata("soon")).unwrap_err();
        assert_eq!(err.error_type, "Runtime.HandlerError");
        assert!(err.error_message.contains("soon"));
        assert!(!err.is_panic());
    }

    #[test]
    fn bad_identity_is_handler_failure() {
        let meta = InvocationMetadata {
            cognito_identity: Some("[".to_string()),
            ..metadata("1700000000000")
        };
        let err = Context::from_metadata(RequestId::new("req-1"), &meta).unwrap_err();
        assert_eq!(err.error_type, "Runtime.HandlerError");
        assert!(err.error_message.starts_with("failed to parse cognito identity"));
    }

    #[test]
    fn bad_client_context_is_handler_failure() {
        let meta = InvocationMetadata {
            client_context: Some(r#"{"client": 7}"#.to_string()),
            ..metadata("1700000000000")
        };
        let err = Context::from_metadata(RequestId::new("req-1"), &meta).unwrap_err();
        assert_eq!(err.error_type, "Runtime.HandlerError");
        assert!(err.error_message.starts_with("failed to parse client context"));
        assert!(err.stack_trace.is_empty());
    }
}
