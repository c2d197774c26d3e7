//! Error types for synchronization operations.
//!
//! [`SyncError`] is the engine-level taxonomy. Only `Configuration` is fatal;
//! everything else is logged by the caller and left for the next pass.

use fabric_api::FabricError;
use thiserror::Error;

/// Result type alias for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while reconciling the SDN plane with the fabric.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Mapping configuration is invalid or ambiguous. Aborts startup.
    #[error("Invalid configuration for {field}: {message}")]
    Configuration {
        /// The mapping or option that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// The backend is busy or unreachable; retrying later may succeed.
    #[error("Transient fabric failure during {operation}: {message}")]
    TransientGateway {
        /// The operation that failed.
        operation: String,
        /// Error message.
        message: String,
    },

    /// A backend object was already deleted.
    #[error("Fabric resource vanished: {resource}")]
    ResourceVanished {
        /// The resource id or URI.
        resource: String,
    },

    /// A port's local link information is missing or invalid.
    #[error("Malformed binding profile on port {port}: {reason}")]
    MalformedPortBinding {
        /// The SDN port id.
        port: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Binding table read or commit failed.
    #[error("State store operation failed: {operation}: {message}")]
    Store {
        /// The operation that failed (e.g., "commit", "load").
        operation: String,
        /// Error message.
        message: String,
    },

    /// Non-transient backend failure.
    #[error("Fabric request failed: {0}")]
    Gateway(#[source] FabricError),

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl SyncError {
    /// Creates a configuration error.
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a transient gateway error.
    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientGateway {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a resource vanished error.
    pub fn vanished(resource: impl Into<String>) -> Self {
        Self::ResourceVanished {
            resource: resource.into(),
        }
    }

    /// Creates a malformed port binding error.
    pub fn malformed_port(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPortBinding {
            port: port.into(),
            reason: reason.into(),
        }
    }

    /// Creates a store error.
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::TransientGateway { .. })
    }

    /// Returns true if the backend object was already gone.
    pub fn is_vanished(&self) -> bool {
        matches!(self, SyncError::ResourceVanished { .. })
    }

    /// Returns true if the process must not continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Configuration { .. })
    }
}

impl From<FabricError> for SyncError {
    fn from(err: FabricError) -> Self {
        match err {
            FabricError::NotFound { resource } => SyncError::ResourceVanished { resource },
            e if e.is_retryable() => SyncError::TransientGateway {
                operation: "fabric request".to_string(),
                message: e.to_string(),
            },
            e => SyncError::Gateway(e),
        }
    }
}
