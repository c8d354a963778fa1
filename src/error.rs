use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuorumError {
    #[error("Failed to join peer directory: {0}")]
    JoinFailed(String),

    #[error("Election coordinator is not running")]
    CoordinatorStopped,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, QuorumError>;
