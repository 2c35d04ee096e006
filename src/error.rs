//! Error types for the smart router.

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors talking to the upstream OpenAI-compatible backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Backend request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Backend returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    pub(crate) fn request(err: reqwest::Error) -> Self {
        Self::RequestFailed {
            reason: err.to_string(),
        }
    }
}

/// Errors on the routing decision path.
///
/// An empty registry is the only routing failure surfaced to callers;
/// everything else degrades to a safe default tier internally.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("No models available for routing")]
    NoModelsAvailable,
}
