use crate::session::SessionPhase;

/// Failures of the streaming channel itself. Each one ends the session in
/// `failed`; none is retried.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("receive failed: {0}")]
    Receive(String),
    #[error("close failed: {0}")]
    Close(String),
}

impl TransportError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Send(_) => "send",
            Self::Receive(_) => "receive",
            Self::Close(_) => "close",
        }
    }
}

/// A controller call made out of order, e.g. transmitting the case twice.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("cannot {action} while the session is {phase}")]
    IllegalPhase {
        action: &'static str,
        phase: SessionPhase,
    },
}
