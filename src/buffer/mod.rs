mod config;
mod error;
mod frame;
mod pool;
mod replacer;

pub use config::{BufferPoolConfig, DEFAULT_NUM_FRAMES, ReplacementStrategy};
pub use error::{BufferError, BufferResult};
pub use frame::FrameId;
pub use pool::{BufferPool, PageHandle};
