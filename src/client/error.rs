use serde::Deserialize;
use serde::Serialize;

/// Failure reported by a [`crate::KvStore`] implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StoreError {
    /// Transport level
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Non-success HTTP-style status returned by the store
    #[error("Unexpected response code {status}: {message}")]
    Server { status: u16, message: String },

    /// Store-side business logic
    #[error(transparent)]
    Business(#[from] BusinessError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum NetworkError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The request observed its cancellation token
    #[error("Request cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum BusinessError {
    /// The contacted node lost or never had leadership
    #[error("No cluster leader")]
    NoLeader,

    /// Too many requests; back off before retrying
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Malformed key or prefix
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// ACL denied the read
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

/// How the watch loop reacts to a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Absorbed internally: reset the index, back off, fetch again
    Retryable,
    /// Terminates the watch
    Fatal,
}

impl StoreError {
    /// Classifies the failure.
    ///
    /// Transport failures and 5xx responses are transient. Everything the
    /// classifier does not recognise as transient is fatal.
    pub fn classify(&self) -> ErrorClass {
        match self {
            StoreError::Network(_) => ErrorClass::Retryable,

            StoreError::Server { status, .. } if (500..600).contains(status) => ErrorClass::Retryable,
            StoreError::Server { status: 429, .. } => ErrorClass::Retryable,
            StoreError::Server { .. } => ErrorClass::Fatal,

            StoreError::Business(BusinessError::NoLeader)
            | StoreError::Business(BusinessError::RateLimited { .. }) => ErrorClass::Retryable,

            StoreError::Business(BusinessError::InvalidTarget(_))
            | StoreError::Business(BusinessError::PermissionDenied(_)) => ErrorClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.classify() == ErrorClass::Retryable
    }
}
