pub mod dictation;
pub mod import;
pub mod learning;
pub mod mastery;
pub mod progress;
pub mod selection;
pub mod skip_queue;
pub mod tts;
pub mod word_store;

use thiserror::Error;

use crate::response::AppError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Provider(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

impl From<tts::TtsError> for ServiceError {
    fn from(err: tts::TtsError) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(message) => AppError::not_found(message),
            ServiceError::Forbidden(message) => AppError::forbidden(message),
            ServiceError::Validation(message) => AppError::validation(message),
            ServiceError::Conflict(message) => AppError::conflict(message),
            ServiceError::Provider(message) => AppError::provider(message),
            ServiceError::Database(err) => {
                tracing::error!(error = %err, "database error");
                AppError::internal(err.to_string())
            }
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
