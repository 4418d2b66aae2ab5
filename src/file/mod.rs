mod error;
mod page_file;

pub use error::{FileError, FileResult};
pub use page_file::PageFile;

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Logical page number, counted from the first page after the metadata page
pub type PageNum = usize;
