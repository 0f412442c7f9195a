use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DgenError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field too long: {field} ({len} > {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Unknown media type: {0}")]
    UnknownMediaType(String),

    #[error("Unknown difficulty: {0}")]
    UnknownDifficulty(String),

    #[error("Invalid challenge id: {0}")]
    InvalidChallengeId(String),
}
