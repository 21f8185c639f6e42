use nyaya_core::CaseError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("request to {endpoint} failed: {message}")]
    Request {
        endpoint: &'static str,
        message: String,
    },

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("unreadable response from {endpoint}: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },

    #[error("nothing to extract: the pasted text is empty")]
    EmptyText,

    #[error("extracted case is not reviewable: {0}")]
    InvalidCase(#[from] CaseError),
}

impl ServiceError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Client(_) => "client",
            Self::Request { .. } => "request",
            Self::Status { .. } => "status",
            Self::Decode { .. } => "decode",
            Self::EmptyText => "empty_text",
            Self::InvalidCase(_) => "invalid_case",
        }
    }
}
