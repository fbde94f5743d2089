use super::{ConfigError, ConflictError, RemoteError, StorageError, ValidationError};

/// Top-level error for every Tether operation.
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("conflict error: {0}")]
    Conflict(#[from] ConflictError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

pub type TetherResult<T> = Result<T, TetherError>;

/// Coarse classification used by the sync coordinator and status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Auth,
    Validation,
    Conflict,
    Storage,
    Config,
}

impl TetherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Remote(RemoteError::Auth { .. }) => ErrorKind::Auth,
            Self::Remote(RemoteError::Rejected { .. }) => ErrorKind::Validation,
            Self::Remote(_) => ErrorKind::Network,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether the failed attempt may succeed if repeated later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Remote(e) if e.is_transient())
    }

    /// Stable code for host applications.
    pub fn error_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Auth => "AUTH_ERROR",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Conflict => "CONFLICT_ERROR",
            ErrorKind::Storage => "STORAGE_ERROR",
            ErrorKind::Config => "CONFIG_ERROR",
        }
    }
}

impl From<serde_json::Error> for TetherError {
    fn from(e: serde_json::Error) -> Self {
        ValidationError::Serialization {
            reason: e.to_string(),
        }
        .into()
    }
}
