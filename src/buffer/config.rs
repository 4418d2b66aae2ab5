use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::error::{BufferError, BufferResult};

/// Number of frames used when no configuration is given
pub const DEFAULT_NUM_FRAMES: usize = 16;

/// Page replacement strategies a pool can be configured with.
///
/// Only FIFO and LRU are implemented; the rest are accepted in configuration
/// but every pin on such a pool fails with `UnsupportedStrategy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplacementStrategy {
    Fifo,
    Lru,
    Clock,
    Lfu,
    LruK,
}

impl ReplacementStrategy {
    /// Stable numeric code of the strategy
    pub fn as_code(self) -> u8 {
        match self {
            ReplacementStrategy::Fifo => 0,
            ReplacementStrategy::Lru => 1,
            ReplacementStrategy::Clock => 2,
            ReplacementStrategy::Lfu => 3,
            ReplacementStrategy::LruK => 4,
        }
    }

    pub fn is_supported(self) -> bool {
        matches!(self, ReplacementStrategy::Fifo | ReplacementStrategy::Lru)
    }
}

impl TryFrom<u8> for ReplacementStrategy {
    type Error = BufferError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ReplacementStrategy::Fifo),
            1 => Ok(ReplacementStrategy::Lru),
            2 => Ok(ReplacementStrategy::Clock),
            3 => Ok(ReplacementStrategy::Lfu),
            4 => Ok(ReplacementStrategy::LruK),
            other => Err(BufferError::UnknownStrategyCode(other)),
        }
    }
}

/// Settings for a buffer pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferPoolConfig {
    pub num_frames: usize,
    pub strategy: ReplacementStrategy,
    /// Strategy specific parameters, ignored by FIFO and LRU
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_data: Option<serde_json::Value>,
}

impl BufferPoolConfig {
    pub fn new(num_frames: usize, strategy: ReplacementStrategy) -> Self {
        Self {
            num_frames,
            strategy,
            strategy_data: None,
        }
    }

    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> BufferResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> BufferResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> BufferResult<()> {
        if self.num_frames == 0 {
            return Err(BufferError::InvalidFrameCount);
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_FRAMES, ReplacementStrategy::Lru)
    }
}
