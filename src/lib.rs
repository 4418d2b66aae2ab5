pub mod buffer;
pub mod file;

pub use buffer::{
    BufferError, BufferPool, BufferPoolConfig, BufferResult, FrameId, PageHandle,
    ReplacementStrategy,
};
pub use file::{FileError, FileResult, PAGE_SIZE, PageFile, PageNum};
