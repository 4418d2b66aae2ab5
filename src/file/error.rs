use std::io;
use thiserror::Error;

use super::PageNum;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Page file not found: {0}")]
    NotFound(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Non-existing page: page={page}, total_num_pages={total}")]
    NonExistingPage { page: i64, total: usize },

    #[error("Seek failed at offset {0}")]
    SeekFailed(u64),

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },
}

impl FileError {
    pub(crate) fn non_existing(page: PageNum, total: usize) -> Self {
        FileError::NonExistingPage {
            page: i64::try_from(page).unwrap_or(i64::MAX),
            total,
        }
    }
}

pub type FileResult<T> = Result<T, FileError>;
