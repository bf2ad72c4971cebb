//! Error types for the Supabase provider.

use thiserror::Error;

/// Errors that can occur while serving provider requests.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested remote object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider is not configured, or its configuration is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The Management API could not be reached or its response could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A Management API call failed before a response was received.
    #[error("Unable to {operation}, got error: {source}")]
    Request {
        /// What the provider was trying to do.
        operation: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// A local filesystem error, typically while reading function sources.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The Management API answered with an unexpected status.
    #[error("Unable to {operation}, got status {status}: {body}")]
    Api {
        /// What the provider was trying to do, e.g. `deploy function`.
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from the host.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Build an [`ProviderError::Api`] error from an unexpected response.
    pub fn api(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }

    /// Build a [`ProviderError::Request`] error from a failed API call.
    pub fn request(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Request {
            operation: operation.into(),
            source,
        }
    }

    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::Unimplemented(msg)
            | Self::InvalidRequest(msg) => msg.clone(),
            Self::Serialization(err) => err.to_string(),
            Self::Transport(err) => err.to_string(),
            Self::Http(err) => err.to_string(),
            Self::Io(err) => err.to_string(),
            Self::Request { .. } | Self::Api { .. } => self.to_string(),
        }
    }

    /// The diagnostic summary used when this error is reported to the host.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Http(_) | Self::Request { .. } | Self::Api { .. } | Self::Io(_) => "Client Error",
            Self::Configuration(_) => "Provider Not Configured",
            Self::Validation(_) => "Invalid Configuration",
            Self::InvalidRequest(_) => "Invalid Request",
            Self::UnknownResource(_) => "Unknown Type",
            Self::NotFound(_) => "Not Found",
            Self::Serialization(_) => "Invalid State",
            Self::Transport(_) => "Transport Error",
            Self::Unimplemented(_) => "Unsupported Operation",
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
            ProviderError::Http(err) => tonic::Status::unavailable(err.to_string()),
            err @ ProviderError::Request { .. } => tonic::Status::unavailable(err.to_string()),
            ProviderError::Io(err) => tonic::Status::internal(err.to_string()),
            err @ ProviderError::Api { .. } => tonic::Status::unknown(err.message()),
            ProviderError::Unimplemented(msg) => tonic::Status::unimplemented(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
        }
    }
}
