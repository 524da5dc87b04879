//! Error types shared across the crate.
//!
//! Capacity shortfalls are not errors at this level: they are reported per
//! candidate through [`crate::fit::CapacityExceeded`] and simply drop that
//! candidate from the search.

use crate::models::ArchitectureError;

/// Failure of the allocation search itself.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("no GPU setup can serve {users} concurrent full-length contexts")]
    NoSolutionFound { users: u32 },

    #[error("GPU memory utilization must be in (0, 1], got {0}")]
    InvalidUtilization(f64),

    #[error("max context length must be at least one token")]
    ZeroContext,

    #[error("user count must be at least one")]
    ZeroUsers,

    #[error("invalid model architecture: {0}")]
    Architecture(#[from] ArchitectureError),
}

/// Problems loading or filtering a GPU catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to parse GPU catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read GPU catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("GPU '{name}' has invalid {field}: {value}")]
    InvalidCard {
        name: String,
        field: &'static str,
        value: f64,
    },

    #[error("no GPU in the catalog matches '{0}'")]
    NoMatch(String),
}

/// Model metadata could not be resolved.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("malformed model config for '{model}': {message}")]
    Malformed { model: String, message: String },
}

/// Cloud provisioning failures.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("no API key configured (set RUNPOD_API_KEY or pass --api-key)")]
    MissingApiKey,

    #[error("provisioning request failed: {0}")]
    Http(String),

    #[error("provider rejected the request: {0}")]
    Api(String),

    #[error("unexpected provider response: {0}")]
    Response(String),
}
