use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    IoError(io::Error),
    Validation(String),
    OutOfBounds { index: usize, size: usize },
    ReadError(&'static str, io::Error),
    WriteError(&'static str, io::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::Validation(msg) => write!(f, "Validation error: {}", msg),
            Error::OutOfBounds { index, size } => {
                write!(f, "Index {} out of bounds for column of size {}", index, size)
            }
            Error::ReadError(context, err) => write!(f, "Failed to read {}: {}", context, err),
            Error::WriteError(context, err) => write!(f, "Failed to write {}: {}", context, err),
        }
    }
}

impl std::error::Error for Error {}
