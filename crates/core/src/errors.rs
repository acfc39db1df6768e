use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown {kind} status `{value}`")]
    UnknownStatus { kind: &'static str, value: String },
    #[error("unsupported currency `{0}` (expected USD, EUR, GBP, INR, AED or CAD)")]
    UnknownCurrency(String),
    #[error("invalid date `{0}` (expected YYYY-MM-DD or an RFC 3339 timestamp)")]
    InvalidDate(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
