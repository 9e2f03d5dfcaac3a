use thiserror::Error;

/// Errors the core can raise while driving a session. Each variant maps to
/// exactly one of the wire-level reactions described in the error handling
/// design: a close code, a non-fatal `{"error": ...}` frame, or nothing at
/// all (the failure is absorbed).
#[derive(Error, Debug)]
pub enum HubError {
    /// Missing, malformed, or expired token. Close 4001, no retry.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Malformed JSON, or a first message that isn't `register`. The
    /// session stays open awaiting a valid register frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Register payload missing fields, caller not a member of any org, or
    /// no virtual IP allocated anywhere. Reported once, session closed.
    #[error("registration rejected: {0}")]
    Contract(String),

    /// Per-recipient broadcast send failure. Logged, never propagated.
    #[error("send to peer failed: {0}")]
    TransientSend(String),

    /// Pong deadline exceeded.
    #[error("liveness check failed: no pong within deadline")]
    Liveness,

    /// Persistence port unavailable or returned an unexpected state during
    /// register handling.
    #[error("persistence error: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, HubError>;

impl HubError {
    /// The exact payload to put in a non-fatal `{"error": ...}` frame
    /// (§6.1, §7). Persistence failures are deliberately flattened to the
    /// generic "Registration failed" — the caller never learns why, only
    /// that it didn't work (§7 PersistenceError).
    pub fn wire_message(&self) -> String {
        match self {
            HubError::Protocol(msg) | HubError::Contract(msg) => msg.clone(),
            HubError::Persistence(_) => "Registration failed".to_string(),
            HubError::Auth(_) | HubError::TransientSend(_) | HubError::Liveness => {
                self.to_string()
            }
        }
    }
}
