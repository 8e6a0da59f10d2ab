use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Could not determine the home directory for the default CA location")]
    NoHomeDir,

    #[error("Failed to read or write CA files: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
