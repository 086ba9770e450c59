//! One invocation, end to end: context, decode, invoke, encode, report.

use ferrule_client::RuntimeClient;
use ferrule_types::{ErrorRecord, Invocation, RequestId, Taxonomy};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::error::RuntimeError;
use crate::handler::Handler;
use crate::panic::contain;
use crate::trace;

/// Result of a pass that did not end the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    Succeeded,
    /// An ordinary failure, already reported.
    Failed(ErrorRecord),
}

/// Executes fetched invocations and reports their results.
#[derive(Debug, Clone)]
pub struct Pipeline {
    client: RuntimeClient,
    taxonomy: Taxonomy,
    trace_id: bool,
    function_name: Option<String>,
    function_version: Option<String>,
}

impl Pipeline {
    #[must_use]
    pub fn new(client: RuntimeClient) -> Self {
        Self {
            client,
            taxonomy: Taxonomy::default(),
            trace_id: false,
            function_name: None,
            function_version: None,
        }
    }

    pub fn with_taxonomy(mut self, taxonomy: Taxonomy) -> Self {
        self.taxonomy = taxonomy;
        self
    }

    /// Publish each invocation's trace token to [`trace::current_trace_id`].
    pub fn with_trace_id(mut self, enabled: bool) -> Self {
        self.trace_id = enabled;
        self
    }

    /// Function name and version attached to failure logs.
    pub fn with_function(mut self, name: Option<String>, version: Option<String>) -> Self {
        self.function_name = name;
        self.function_version = version;
        self
    }

    #[must_use]
    pub fn client(&self) -> &RuntimeClient {
        &self.client
    }

    /// Run `handler` against an already fetched invocation and report the result.
    ///
    /// Ordinary failures are reported and returned as
    /// [`InvocationOutcome::Failed`]. A contained panic is reported and then
    /// returned as [`RuntimeError::HandlerPanicked`]. A failed report is
    /// returned as [`RuntimeError::Report`].
    pub async fn handle_invocation<H, I, O>(
        &self,
        handler: &H,
        invocation: Invocation,
    ) -> Result<InvocationOutcome, RuntimeError>
    where
        H: Handler<I, O>,
        I: DeserializeOwned,
        O: Serialize,
    {
        let request_id = invocation.request_id.clone();
        tracing::debug!(request_id = %request_id, "handling invocation");

        match self.execute(handler, invocation).await {
            Ok(body) => {
                self.client
                    .report_success(&request_id, body)
                    .await
                    .map_err(RuntimeError::Report)?;
                Ok(InvocationOutcome::Succeeded)
            }
            Err(record) => {
                self.log_failure(&request_id, &record);
                self.client
                    .report_failure(&request_id, record.to_json())
                    .await
                    .map_err(RuntimeError::Report)?;
                if record.is_panic() {
                    return Err(RuntimeError::HandlerPanicked { request_id, record });
                }
                Ok(InvocationOutcome::Failed(record))
            }
        }
    }

    async fn execute<H, I, O>(
        &self,
        handler: &H,
        invocation: Invocation,
    ) -> Result<Vec<u8>, ErrorRecord>
    where
        H: Handler<I, O>,
        I: DeserializeOwned,
        O: Serialize,
    {
        let Invocation {
            request_id,
            payload,
            metadata,
        } = invocation;

        if self.trace_id {
            trace::set_trace_id(metadata.trace_id.as_deref());
        }
        let ctx = Context::from_metadata(request_id, &metadata)?;

        let taxonomy = &self.taxonomy;
        let attempt = async move {
            let input: I =
                serde_json::from_slice(&payload).map_err(|e| ErrorRecord::unmarshal(&e))?;
            let output = handler.call(ctx, input).await.map_err(|e| {
                ErrorRecord::new(taxonomy.classify_error::<H::Error>(), e.to_string())
            })?;
            serde_json::to_vec(&output).map_err(|e| ErrorRecord::marshal(&e))
        };

        match contain(attempt).await {
            Ok(result) => result,
            Err(panic) => Err(panic.into_record(taxonomy)),
        }
    }

    fn log_failure(&self, request_id: &RequestId, record: &ErrorRecord) {
        let stack = record.is_panic().then(|| record.render_stack());
        tracing::error!(
            request_id = %request_id,
            function_name = self.function_name.as_deref(),
            function_version = self.function_version.as_deref(),
            error_type = %record.error_type,
            error_message = %record.error_message,
            stack = stack.as_deref(),
            "invocation error"
        );
    }
}
