//! Fabric backend error types.
//!
//! Every gateway call returns [`FabricResult`]. HTTP failures are mapped onto
//! a small set of variants so callers can tell vanished resources and
//! transient conditions apart from hard failures.

use thiserror::Error;

/// Result type alias for fabric gateway operations.
pub type FabricResult<T> = Result<T, FabricError>;

/// Errors returned by the fabric backend or the transport to it.
#[derive(Debug, Error)]
pub enum FabricError {
    /// The addressed resource does not exist (HTTP 404).
    #[error("Resource not found: {resource}")]
    NotFound {
        /// The resource id or URI.
        resource: String,
    },

    /// The backend refused the request because the resource is busy or was
    /// modified concurrently (HTTP 409, 412).
    #[error("Conflict on {resource}: {message}")]
    Conflict {
        /// The resource id or URI.
        resource: String,
        /// Backend error message.
        message: String,
    },

    /// The backend failed internally (HTTP 5xx).
    #[error("Backend server error on {resource} (HTTP {status}): {message}")]
    Server {
        /// The resource id or URI.
        resource: String,
        /// HTTP status code.
        status: u16,
        /// Backend error message.
        message: String,
    },

    /// Any other non-success HTTP status.
    #[error("Request on {resource} rejected (HTTP {status}): {message}")]
    Status {
        /// The resource id or URI.
        resource: String,
        /// HTTP status code.
        status: u16,
        /// Backend error message.
        message: String,
    },

    /// An asynchronous backend task finished in an error state.
    #[error("Backend task {task} failed: {message}")]
    TaskFailed {
        /// The task URI.
        task: String,
        /// Joined task error messages.
        message: String,
    },

    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL construction failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Response body could not be decoded.
    #[error("Failed to decode {resource}: {message}")]
    Decode {
        /// The resource id or URI.
        resource: String,
        /// Decoder message.
        message: String,
    },

    /// A caller-supplied value was rejected before any request was sent.
    #[error("Invalid parameter {field}: {message}")]
    InvalidParameter {
        /// The offending field.
        field: String,
        /// Error message.
        message: String,
    },

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl FabricError {
    /// Creates a not-found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Creates a server error.
    pub fn server(resource: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            resource: resource.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid parameter error.
    pub fn invalid_parameter(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Maps a non-success HTTP status onto the error taxonomy.
    pub fn from_status(
        status: u16,
        resource: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let resource = resource.into();
        let message = message.into();
        match status {
            404 => Self::NotFound { resource },
            409 | 412 => Self::Conflict { resource, message },
            500..=599 => Self::Server {
                resource,
                status,
                message,
            },
            _ => Self::Status {
                resource,
                status,
                message,
            },
        }
    }

    /// Returns the HTTP status behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            FabricError::NotFound { .. } => Some(404),
            FabricError::Conflict { .. } => Some(409),
            FabricError::Server { status, .. } | FabricError::Status { status, .. } => {
                Some(*status)
            }
            FabricError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true if the addressed resource no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FabricError::NotFound { .. })
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FabricError::Conflict { .. } | FabricError::Server { .. } | FabricError::Transport(_)
        )
    }
}
