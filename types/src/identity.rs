//! Identity and client-context blobs.
//!
//! The control plane passes these as JSON-encoded header values. Every field
//! defaults so partial documents decode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identity of the caller when invoked through an identity pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitoIdentity {
    pub cognito_identity_id: String,
    pub cognito_identity_pool_id: String,
}

/// Metadata about the client application that issued the invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientApplication {
    pub installation_id: String,
    pub app_title: String,
    pub app_version_code: String,
    pub app_package_name: String,
}

/// Client application and device information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientContext {
    pub client: ClientApplication,
    pub env: HashMap<String, String>,
    pub custom: HashMap<String, String>,
}
