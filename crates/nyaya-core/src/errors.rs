/// A case record that cannot seed a review. Raised by intake before any
/// session exists; the session controller never sees these.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CaseError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("case has no bids")]
    NoBids,
    #[error("estimated value must be non-negative, got {0}")]
    NegativeValue(f64),
    #[error("bid from {vendor} has negative amount {amount}")]
    NegativeBid { vendor: String, amount: f64 },
    #[error("bid opening {opening} precedes publication {publication}")]
    DatesOutOfOrder { publication: String, opening: String },
    #[error("case payload is not valid: {0}")]
    Malformed(String),
}

impl CaseError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::NoBids => "no_bids",
            Self::NegativeValue(_) => "negative_value",
            Self::NegativeBid { .. } => "negative_bid",
            Self::DatesOutOfOrder { .. } => "dates_out_of_order",
            Self::Malformed(_) => "malformed",
        }
    }
}

/// A verdict payload whose values fall outside their allowed ranges.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum VerdictError {
    #[error("constitutional score {0} is outside [0, 100]")]
    ScoreOutOfRange(f64),
}
