//! Error types for the store, the HTTP handlers and the client.

use thiserror::Error;

/// Failures of a single-row hero operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("hero {0} not found")]
    NotFound(i64),

    #[error("hero {id} was modified concurrently")]
    Conflict { id: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Failures surfaced by the API handlers, each mapped to one HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("hero {0} not found")]
    NotFound(i64),

    #[error("hero {id} was modified concurrently")]
    Conflict { id: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict { .. } => 409,
            ApiError::Database(_) => 500,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::NotFound(id),
            StoreError::Conflict { id } => ApiError::Conflict { id },
            StoreError::Database(e) => ApiError::Database(e),
        }
    }
}

/// Failures seen by [`crate::client::HeroClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request")]
    BadRequest,

    #[error("Conflict")]
    Conflict,

    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ClientError::BadRequest,
            404 => ClientError::NotFound,
            409 => ClientError::Conflict,
            other => ClientError::UnexpectedStatus(other),
        }
    }
}
