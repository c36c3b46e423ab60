use std::time::Duration;

use thiserror::Error;

use crate::models::AiProvider;

#[derive(Error, Debug)]
pub enum ConsultError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Too many requests for session {0}")]
    RateLimited(String),

    #[error("AI provider {0} is not configured")]
    ProviderNotConfigured(AiProvider),

    #[error("AI provider rate limit exceeded: {0}")]
    ProviderRateLimited(String),

    #[error("AI provider error: {0}")]
    Provider(String),

    #[error("AI provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for ConsultError {
    fn from(err: sqlx::Error) -> Self {
        ConsultError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConsultError>;
