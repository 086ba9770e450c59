//! Runtime environment and user-facing options.

use ferrule_types::Taxonomy;

use crate::error::ConfigError;
use crate::extension::InternalExtension;

pub const ENV_RUNTIME_API: &str = "AWS_LAMBDA_RUNTIME_API";
pub const ENV_FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";
pub const ENV_FUNCTION_VERSION: &str = "AWS_LAMBDA_FUNCTION_VERSION";

/// Facts about the hosting environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEnv {
    /// `host:port` of the control plane.
    pub runtime_api: String,
    pub function_name: Option<String>,
    pub function_version: Option<String>,
}

impl RuntimeEnv {
    pub fn new(runtime_api: impl Into<String>) -> Self {
        Self {
            runtime_api: runtime_api.into(),
            function_name: None,
            function_version: None,
        }
    }

    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let runtime_api = non_empty(ENV_RUNTIME_API).ok_or(ConfigError::MissingRuntimeApi)?;
        Ok(Self {
            runtime_api,
            function_name: non_empty(ENV_FUNCTION_NAME),
            function_version: non_empty(ENV_FUNCTION_VERSION),
        })
    }
}

/// Named toggles for [`run`](crate::run) and [`start`](crate::start).
#[derive(Debug)]
pub struct Options {
    pub(crate) trace_id: bool,
    pub(crate) extensions: Vec<InternalExtension>,
    pub(crate) default_logging: bool,
    pub(crate) taxonomy: Taxonomy,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            trace_id: false,
            extensions: Vec::new(),
            default_logging: true,
            taxonomy: Taxonomy::default(),
        }
    }
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish each invocation's trace token process-wide.
    pub fn with_trace_id(mut self, enabled: bool) -> Self {
        self.trace_id = enabled;
        self
    }

    /// Add an extension. Extensions register in the order they are added.
    pub fn with_extension(mut self, extension: InternalExtension) -> Self {
        self.extensions.push(extension);
        self
    }

    /// `false` leaves subscriber installation to the caller.
    pub fn with_default_logging(mut self, enabled: bool) -> Self {
        self.default_logging = enabled;
        self
    }

    /// Replace the error and panic classification table.
    pub fn with_taxonomy(mut self, taxonomy: Taxonomy) -> Self {
        self.taxonomy = taxonomy;
        self
    }
}
