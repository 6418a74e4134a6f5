use thiserror::Error;

/// Input rejected before anything touches the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("end time is before start time")]
    EndBeforeStart,

    #[error("duration must not be negative")]
    NegativeDuration,

    #[error("tolerance must not be negative")]
    NegativeTolerance,
}

impl ValidationError {
    /// Stable code used in API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyTitle => "empty_title",
            ValidationError::EndBeforeStart => "end_before_start",
            ValidationError::NegativeDuration => "negative_duration",
            ValidationError::NegativeTolerance => "negative_tolerance",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("activity {0} not found")]
    NotFound(i64),

    #[error("activity {0} is already running")]
    AlreadyRunning(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
