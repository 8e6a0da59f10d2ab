use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read or write HAR file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse HAR document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid HAR structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid HAR capture type: {0}")]
    InvalidCaptureType(String),

    #[error("Unknown control operation: {0}")]
    UnknownOperation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
