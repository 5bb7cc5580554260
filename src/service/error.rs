use crate::route::ValidationError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Invalid route: {0}")]
    Validation(#[from] ValidationError),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Unauthorized")]
    Unauthorized,
}

pub type ServiceResult<T> = Result<T, ServiceError>;
