//! Shared error type

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
