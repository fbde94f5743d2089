/// Failures talking to the remote source of truth.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("authentication failed: {reason}")]
    Auth { reason: String },

    #[error("remote rejected request with HTTP {status}: {reason}")]
    Rejected { status: u16, reason: String },

    #[error("malformed response: {reason}")]
    Protocol { reason: String },
}

impl RemoteError {
    /// Transient failures feed the retry path; everything else is final.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::Protocol { .. }
        )
    }
}
