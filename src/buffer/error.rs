use std::io;
use thiserror::Error;

use super::config::ReplacementStrategy;
use crate::file::{FileError, PageNum};

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Page file not found: {0}")]
    NotFound(String),

    #[error("Buffer pool exhausted: every frame is pinned")]
    PoolExhausted,

    #[error("Unsupported replacement strategy: {0:?}")]
    UnsupportedStrategy(ReplacementStrategy),

    #[error("Unknown replacement strategy code: {0}")]
    UnknownStrategyCode(u8),

    #[error("Page not resident in buffer pool: {0}")]
    PageNotResident(PageNum),

    #[error("Page not pinned: {0}")]
    PageNotPinned(PageNum),

    #[error("Cannot shut down: {0} frame(s) still pinned")]
    PinnedPages(usize),

    #[error("Buffer pool needs at least one frame")]
    InvalidFrameCount,

    #[error("Buffer pool is shut down")]
    PoolClosed,
}

pub type BufferResult<T> = Result<T, BufferError>;
