//! Matrix adapter errors.

/// Errors surfaced by the Matrix adapter and its network client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatrixError {
    /// Bad credentials or the homeserver refused the login.
    #[error("matrix login failed: {0}")]
    Auth(String),
    /// Room does not exist or we may not join it.
    #[error("matrix join failed: {0}")]
    Join(String),
    /// Transient transport or server failure (timeouts, 5xx, connection refused).
    #[error("matrix network error: {0}")]
    Network(String),
    /// The homeserver rejected a send.
    #[error("matrix send failed: {0}")]
    Send(String),
    /// Outbound message for a channel that was never joined.
    #[error("channel not joined: {channel}")]
    NotJoined { channel: String },
    /// Operation needs an authenticated session.
    #[error("matrix adapter not connected")]
    NotConnected,
}

impl MatrixError {
    /// True for failures that may succeed when the same call is retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MatrixError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_retryable() {
        assert!(MatrixError::Network("timeout".into()).is_retryable());
        assert!(!MatrixError::Auth("forbidden".into()).is_retryable());
        assert!(!MatrixError::Send("rejected".into()).is_retryable());
        assert!(!MatrixError::NotJoined { channel: "#x".into() }.is_retryable());
    }
}
