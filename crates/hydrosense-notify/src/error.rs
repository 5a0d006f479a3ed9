use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("smtp transport error: {0}")]
    Transport(String),
    #[error("failed to build message: {0}")]
    Build(String),
}

pub type NotifyResult<T> = Result<T, NotifyError>;
