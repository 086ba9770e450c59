//! One unit of work fetched from the control plane.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::identity::{ClientContext, CognitoIdentity};
use crate::ids::RequestId;

pub const HEADER_REQUEST_ID: &str = "lambda-runtime-aws-request-id";
pub const HEADER_DEADLINE_MS: &str = "lambda-runtime-deadline-ms";
pub const HEADER_TRACE_ID: &str = "lambda-runtime-trace-id";
pub const HEADER_COGNITO_IDENTITY: &str = "lambda-runtime-cognito-identity";
pub const HEADER_CLIENT_CONTEXT: &str = "lambda-runtime-client-context";
pub const HEADER_FUNCTION_ARN: &str = "lambda-runtime-invoked-function-arn";

pub const HEADER_EXTENSION_NAME: &str = "lambda-extension-name";
pub const HEADER_EXTENSION_IDENTIFIER: &str = "lambda-extension-identifier";

#[derive(Debug, Error)]
pub enum DeadlineError {
    #[error("failed to parse deadline: header is missing")]
    Missing,
    #[error("failed to parse deadline {raw:?}: {source}")]
    Invalid {
        raw: String,
        source: std::num::ParseIntError,
    },
}

/// Failure decoding one of the JSON metadata blobs.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to parse cognito identity: {0}")]
    Identity(#[source] serde_json::Error),
    #[error("failed to parse client context: {0}")]
    ClientContext(#[source] serde_json::Error),
}

/// Parse an epoch-milliseconds deadline into an absolute time.
///
/// Negative values are clamped to the epoch.
pub fn parse_deadline_ms(raw: &str) -> Result<SystemTime, DeadlineError> {
    let ms: i64 = raw.trim().parse().map_err(|source| DeadlineError::Invalid {
        raw: raw.to_string(),
        source,
    })?;
    let ms = u64::try_from(ms).unwrap_or(0);
    Ok(UNIX_EPOCH + Duration::from_millis(ms))
}

/// Response-channel metadata, one field per control-plane header.
///
/// Values are kept exactly as received; decoding happens on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationMetadata {
    pub deadline_ms: Option<String>,
    pub trace_id: Option<String>,
    pub cognito_identity: Option<String>,
    pub client_context: Option<String>,
    pub invoked_function_arn: Option<String>,
}

impl InvocationMetadata {
    pub fn deadline(&self) -> Result<SystemTime, DeadlineError> {
        let raw = self.deadline_ms.as_deref().ok_or(DeadlineError::Missing)?;
        parse_deadline_ms(raw)
    }

    /// Decode the identity blob. Absent or empty header yields `None`.
    pub fn identity(&self) -> Result<Option<CognitoIdentity>, MetadataError> {
        match non_empty(self.cognito_identity.as_deref()) {
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(MetadataError::Identity),
            None => Ok(None),
        }
    }

    /// Decode the client-context blob. Absent or empty header yields `None`.
    pub fn client_context(&self) -> Result<Option<ClientContext>, MetadataError> {
        match non_empty(self.client_context.as_deref()) {
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(MetadataError::ClientContext),
            None => Ok(None),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// A single unit of work. Consumed exactly once by the execution pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub request_id: RequestId,
    /// Raw JSON input, exactly as the control plane sent it.
    pub payload: Vec<u8>,
    pub metadata: InvocationMetadata,
}
