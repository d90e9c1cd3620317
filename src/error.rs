use crate::model::common::ListKind;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Remote source unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("Page structure not recognised ({kind} list): {message}")]
    ParseError { kind: ListKind, message: String },
    #[error("Fetch of {kind} page {page} failed: {message}")]
    FetchError {
        kind: ListKind,
        page: u32,
        message: String,
    },
    #[error("Catalog store error: {0}")]
    StoreError(String),
    #[error("Filesystem I/O error: {0}")]
    Io(String),
    #[error("JSON serialization error: {0}")]
    Serde(String),
    #[error("Invalid argument provided: {0}")]
    Argument(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Tokio task join error: {0}")]
    JoinError(String),
    #[error("Semaphore acquisition error: {0}")]
    SemaphoreAcquire(String),
    #[error("Unexpected internal error: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::RemoteUnavailable(e.to_string())
    }
}
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::StoreError(e.to_string())
    }
}
impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}
impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serde(e.to_string())
    }
}
impl From<JoinError> for AppError {
    fn from(e: JoinError) -> Self {
        AppError::JoinError(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn parse<S: Into<String>>(kind: ListKind, message: S) -> AppError {
        AppError::ParseError {
            kind,
            message: message.into(),
        }
    }

    /// Re-labels any failure that happened while loading a single page, so the
    /// caller can degrade it to an empty page.
    pub fn into_fetch(self, kind: ListKind, page: u32) -> AppError {
        match self {
            AppError::FetchError { .. } => self,
            other => AppError::FetchError {
                kind,
                page,
                message: other.to_string(),
            },
        }
    }

    pub fn is_argument(&self) -> bool {
        matches!(self, AppError::Argument(_))
    }
}
