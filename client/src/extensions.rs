//! Extension transport: registration and lifecycle event polling.

use ferrule_types::{
    EventType, ExtensionEvent, ExtensionId, HEADER_EXTENSION_IDENTIFIER, HEADER_EXTENSION_NAME,
    RegisterRequest,
};
use reqwest::StatusCode;

use crate::{TransportError, build_http_client, drain_body, header_value};

const API_PATH: &str = "2020-01-01/extension/";

const OP_REGISTER: &str = "register";
const OP_EVENT_NEXT: &str = "event/next";

/// Client for the extension protocol.
///
/// Cloning shares the underlying connection pool, so each event loop can own one.
#[derive(Debug, Clone)]
pub struct ExtensionsClient {
    http: reqwest::Client,
    base_url: String,
}

impl ExtensionsClient {
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

    /// Register `name` for `events` and return the issued identifier.
    pub async fn register(
        &self,
        name: &str,
        events: &[EventType],
    ) -> Result<ExtensionId, TransportError> {
        let url = format!("{}{OP_REGISTER}", self.base_url);
        let body = RegisterRequest {
            events: events.to_vec(),
        };
        let response = self
            .http
            .post(&url)
            .header(HEADER_EXTENSION_NAME, name)
            .json(&body)
            .send()
            .await
            .map_err(TransportError::request(OP_REGISTER))?;

        let status = response.status();
        let identifier = header_value(response.headers(), HEADER_EXTENSION_IDENTIFIER);
        drain_body(response, OP_REGISTER).await;
        if status != StatusCode::OK {
            return Err(TransportError::UnexpectedStatus {
                operation: OP_REGISTER,
                status,
            });
        }

        let identifier = identifier
            .filter(|id| !id.is_empty())
            .ok_or(TransportError::MissingHeader {
                operation: OP_REGISTER,
                header: HEADER_EXTENSION_IDENTIFIER,
            })?;
        tracing::debug!(extension = name, "extension registered");
        Ok(ExtensionId::new(identifier))
    }

    /// Block until the next lifecycle event for `id` arrives.
    pub async fn next_event(&self, id: &ExtensionId) -> Result<ExtensionEvent, TransportError> {
        let url = format!("{}{OP_EVENT_NEXT}", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(HEADER_EXTENSION_IDENTIFIER, id.as_str())
            .send()
            .await
            .map_err(TransportError::request(OP_EVENT_NEXT))?;

        let status = response.status();
        if status != StatusCode::OK {
            drain_body(response, OP_EVENT_NEXT).await;
            return Err(TransportError::UnexpectedStatus {
                operation: OP_EVENT_NEXT,
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(TransportError::request(OP_EVENT_NEXT))?;
        serde_json::from_slice(&body).map_err(|source| TransportError::Decode {
            operation: OP_EVENT_NEXT,
            source,
        })
    }
}
