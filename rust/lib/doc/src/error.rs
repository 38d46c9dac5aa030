use linetrack_core::ServiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<DocError> for ServiceError {
    fn from(e: DocError) -> Self {
        match e {
            DocError::Storage(msg) => ServiceError::Storage(msg),
            DocError::Serialization(msg) => ServiceError::Internal(msg),
        }
    }
}
