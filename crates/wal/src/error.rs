use flintdb_types::buffer::DecodeError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("log is closed")]
    Closed,
    #[error("log corrupted: {0}")]
    Corrupted(String),
    #[error("entry frame of {size} bytes exceeds the {max} byte file limit")]
    Full { size: u64, max: u64 },
    #[error("invalid log entry: {0}")]
    InvalidEntry(#[from] DecodeError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
