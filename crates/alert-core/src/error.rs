use thiserror::Error;

/// Failure fetching a quote.
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request error: {0}")]
    Request(String),
}

impl QuoteError {
    /// Connection and timeout failures are worth another attempt; everything
    /// else is returned to the caller as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, QuoteError::Connect(_) | QuoteError::Timeout(_))
    }
}

/// The analysis service call could not be completed.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Analysis service unreachable: {0}")]
    Unreachable(String),

    #[error("Analysis service timed out")]
    Timeout,

    #[error("Analysis service rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    #[error("Analysis service error: HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Could not build analysis request: {0}")]
    InvalidRequest(String),
}

/// The analysis content did not match the decision schema. Absorbed by the
/// analyzer into an empty decision list.
#[derive(Error, Debug)]
pub enum DecisionParseError {
    #[error("Malformed response envelope: {0}")]
    Envelope(String),

    #[error("Response contained no choices")]
    NoChoices,

    #[error("Decision list does not match schema: {0}")]
    Schema(#[from] serde_json::Error),
}

/// The notification channel failed to deliver a message.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Delivery rejected (HTTP {status}): {description}")]
    Rejected { status: u16, description: String },
}
