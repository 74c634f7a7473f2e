//! Error types for the log shipper

pub type Result<T> = std::result::Result<T, ShipperError>;

/// Errors raised while setting up a shipper.
///
/// Runtime shipping never surfaces these to the producer; they only appear
/// on construction and configuration paths.
#[derive(Debug, thiserror::Error)]
pub enum ShipperError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Unknown transport provider
    #[error("Unknown log provider: {0}")]
    UnknownProvider(String),

    /// Remote stream error
    #[error("Remote stream error: {0}")]
    Remote(#[from] RemoteError),
}

impl ShipperError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        ShipperError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        ShipperError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors reported by the remote log stream service.
///
/// Delivery distinguishes token conflicts, which are resolved by re-reading
/// the stream's sequence token, from everything else, which is retried with
/// backoff.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// The supplied sequence token is stale or missing
    #[error("invalid sequence token (expected {expected:?})")]
    InvalidSequenceToken { expected: Option<String> },

    /// The batch was already accepted under the supplied token
    #[error("data already accepted (next token {expected:?})")]
    DataAlreadyAccepted { expected: Option<String> },

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("service error ({code}): {message}")]
    Service { code: String, message: String },
}

impl RemoteError {
    /// Whether the error means the sequence token we sent is out of date
    pub fn is_token_conflict(&self) -> bool {
        matches!(
            self,
            RemoteError::InvalidSequenceToken { .. } | RemoteError::DataAlreadyAccepted { .. }
        )
    }

    /// Remote error code, as the service names it
    pub fn code(&self) -> &str {
        match self {
            RemoteError::ResourceAlreadyExists(_) => "ResourceAlreadyExistsException",
            RemoteError::ResourceNotFound(_) => "ResourceNotFoundException",
            RemoteError::InvalidSequenceToken { .. } => "InvalidSequenceTokenException",
            RemoteError::DataAlreadyAccepted { .. } => "DataAlreadyAcceptedException",
            RemoteError::Throttled(_) => "ThrottlingException",
            RemoteError::Transport(_) => "TransportError",
            RemoteError::AccessDenied(_) => "AccessDeniedException",
            RemoteError::InvalidParameter(_) => "InvalidParameterException",
            RemoteError::Service { code, .. } => code,
        }
    }
}
