use thiserror::Error;

/// Errors that stop a conversation turn from completing.
///
/// Normalization problems are not in here: they are recovered inside the
/// controller by asking the question again.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid conversation state: {0}")]
    InvalidState(String),

    #[error("Claim is missing answers for: {0:?}")]
    IncompleteClaim(Vec<String>),
}

pub type Result<T> = std::result::Result<T, FlowError>;

/// Why a raw answer could not be turned into a value for the pending question.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationFailure {
    #[error("empty answer")]
    Empty,

    #[error("answer could not be understood")]
    Unintelligible,

    #[error("answer does not match any option")]
    NotAnOption,

    #[error("normalizer timed out")]
    TimedOut,

    #[error("normalizer unavailable: {0}")]
    Upstream(String),
}

/// Policy service could not answer. Intake carries on without a match.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("policy service unavailable: {0}")]
    Unavailable(String),

    #[error("policy lookup timed out")]
    TimedOut,
}

/// A completed claim could not be written.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record store rejected claim: {0}")]
    Rejected(String),
}
