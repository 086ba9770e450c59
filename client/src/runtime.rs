//! Invocation transport: fetch the next invocation and report its result.

use ferrule_types::{
    HEADER_CLIENT_CONTEXT, HEADER_COGNITO_IDENTITY, HEADER_DEADLINE_MS, HEADER_FUNCTION_ARN,
    HEADER_REQUEST_ID, HEADER_TRACE_ID, Invocation, InvocationMetadata, RequestId,
};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;

use crate::{TransportError, build_http_client, drain_body, header_value};

const API_PATH: &str = "2018-06-01/runtime/invocation/";

const OP_NEXT: &str = "next";
const OP_RESPONSE: &str = "response";
const OP_ERROR: &str = "error";

/// Client for the invocation protocol.
///
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct RuntimeClient {
    http: reqwest::Client,
    base_url: String,
}

impl RuntimeClient {
    /// `address` is the `host:port` of the control plane.
    pub fn new(address: &str) -> Result<Self, TransportError> {
        Ok(Self {
            http: build_http_client()?,
            base_url: format!("http://{address}/{API_PATH}"),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Block until the control plane hands out the next invocation.
    ///
    /// The body is kept as raw bytes whatever its content type.
    pub async fn next_invocation(&self) -> Result<Invocation, TransportError> {
        let url = format!("{}{OP_NEXT}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(TransportError::request(OP_NEXT))?;

        let status = response.status();
        if status != StatusCode::OK {
            drain_body(response, OP_NEXT).await;
            return Err(TransportError::UnexpectedStatus {
                operation: OP_NEXT,
                status,
            });
        }

        let headers = response.headers();
        let request_id = header_value(headers, HEADER_REQUEST_ID)
            .filter(|id| !id.is_empty())
            .ok_or(TransportError::MissingHeader {
                operation: OP_NEXT,
                header: HEADER_REQUEST_ID,
            })?;
        let metadata = InvocationMetadata {
            deadline_ms: header_value(headers, HEADER_DEADLINE_MS),
            trace_id: header_value(headers, HEADER_TRACE_ID),
            cognito_identity: header_value(headers, HEADER_COGNITO_IDENTITY),
            client_context: header_value(headers, HEADER_CLIENT_CONTEXT),
            invoked_function_arn: header_value(headers, HEADER_FUNCTION_ARN),
        };

        let payload = response
            .bytes()
            .await
            .map_err(TransportError::request(OP_NEXT))?;

        Ok(Invocation {
            request_id: RequestId::new(request_id),
            payload: payload.to_vec(),
            metadata,
        })
    }

    /// Report a successful result. `payload` must already be JSON.
    pub async fn report_success(
        &self,
        request_id: &RequestId,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.post(request_id, OP_RESPONSE, payload).await
    }

    /// Report a failure. `payload` is an encoded error record.
    pub async fn report_failure(
        &self,
        request_id: &RequestId,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.post(request_id, OP_ERROR, payload).await
    }

    async fn post(
        &self,
        request_id: &RequestId,
        operation: &'static str,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        let url = format!("{}{request_id}/{operation}", self.base_url);
        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(TransportError::request(operation))?;

        let status = response.status();
        drain_body(response, operation).await;
        if status != StatusCode::ACCEPTED {
            return Err(TransportError::UnexpectedStatus { operation, status });
        }

        tracing::debug!(request_id = %request_id, operation, "result reported");
        Ok(())
    }
}
