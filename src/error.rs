use thiserror::Error;

/// Bad external input. Never retried; surfaced to the submitting caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("malformed request body: {0}")]
    Malformed(String),
}

/// A message body that cannot be turned back into a job.
///
/// Reprocessing the same bytes will fail the same way, so consumers log and
/// skip the message instead of retrying.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed job record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid job record field: {0}")]
    InvalidField(String),
}

/// A publish that was not confirmed by the broker in time.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("publish to {topic} not confirmed within {timeout_ms}ms")]
    Timeout { topic: String, timeout_ms: u64 },

    #[error("publish to {topic} rejected: {source}")]
    Rejected {
        topic: String,
        #[source]
        source: BrokerError,
    },
}

/// Broker-side conditions. Treated as transient by every run-loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("unknown topic or partition: {0}")]
    UnknownTopicOrPartition(String),

    #[error("invalid broker response: {0}")]
    Protocol(String),
}

/// Why the ingestion gateway refused a submission.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Failure talking to an ingestion gateway over HTTP.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("gateway returned {status}: {error}")]
    Rejected { status: u16, error: String },

    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Submit error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RouterError>;
