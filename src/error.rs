use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Log already open: {}", .0.display())]
    LogAlreadyOpen(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt log: {0}")]
    CorruptLog(String),
}

pub type Result<T> = std::result::Result<T, Error>;
