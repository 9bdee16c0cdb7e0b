use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Case '{case_id}' is {actual}; operation requires pending_review")]
    InvalidState { case_id: String, actual: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type GuardResult<T> = Result<T, GuardError>;
