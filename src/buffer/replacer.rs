//! Page replacement policies for the buffer pool.

use lru::LruCache;
use std::num::NonZeroUsize;

use super::config::ReplacementStrategy;
use super::error::{BufferError, BufferResult};
use super::frame::{Frame, FrameId};

/// Victim selection policy.
///
/// The pool reports every install and every pin hit; `victim` is only asked
/// once the frame table is full and must never pick a frame with a non-zero
/// fix count. Selecting a victim does not change the policy's state, so a
/// failed miss leaves the policy untouched.
pub(crate) trait Replacer: Send {
    /// A page was placed into `frame_id`
    fn record_install(&mut self, frame_id: FrameId);

    /// A resident page in `frame_id` was pinned again
    fn record_access(&mut self, frame_id: FrameId);

    /// Forget everything about `frame_id`
    fn remove(&mut self, frame_id: FrameId);

    /// Pick the frame to evict, or `None` if every resident frame is pinned
    fn victim(&self, frames: &[Frame]) -> Option<FrameId>;
}

/// Build the policy for `strategy`
pub(crate) fn replacer_for(
    strategy: ReplacementStrategy,
    capacity: usize,
) -> BufferResult<Box<dyn Replacer>> {
    match strategy {
        ReplacementStrategy::Fifo => Ok(Box::new(FifoReplacer::new())),
        ReplacementStrategy::Lru => Ok(Box::new(LruReplacer::new(capacity))),
        unsupported => Err(BufferError::UnsupportedStrategy(unsupported)),
    }
}

fn is_evictable(frame: &Frame) -> bool {
    !frame.is_empty() && !frame.is_pinned()
}

/// First-in first-out replacement.
///
/// Scans circularly from the slot after the most recently installed one and
/// takes the first unpinned frame. Pin hits do not move the scan origin, so
/// a page that is hit often is still evicted in its installation turn.
pub(crate) struct FifoReplacer {
    last_installed: Option<FrameId>,
}

impl FifoReplacer {
    pub(crate) fn new() -> Self {
        Self {
            last_installed: None,
        }
    }
}

impl Replacer for FifoReplacer {
    fn record_install(&mut self, frame_id: FrameId) {
        self.last_installed = Some(frame_id);
    }

    fn record_access(&mut self, _frame_id: FrameId) {}

    fn remove(&mut self, frame_id: FrameId) {
        if self.last_installed == Some(frame_id) {
            self.last_installed = None;
        }
    }

    fn victim(&self, frames: &[Frame]) -> Option<FrameId> {
        let n = frames.len();
        let start = self.last_installed.map_or(0, |pos| pos + 1);
        (0..n)
            .map(|i| (start + i) % n)
            .find(|&pos| is_evictable(&frames[pos]))
    }
}

/// Least-recently-used replacement.
///
/// Installs and pin hits move a frame to the most recently used end; the
/// victim is the least recently used frame that is not pinned.
pub(crate) struct LruReplacer {
    order: LruCache<FrameId, ()>,
}

impl LruReplacer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            order: NonZeroUsize::new(capacity).map_or_else(LruCache::unbounded, LruCache::new),
        }
    }
}

impl Replacer for LruReplacer {
    fn record_install(&mut self, frame_id: FrameId) {
        self.order.put(frame_id, ());
    }

    fn record_access(&mut self, frame_id: FrameId) {
        self.order.promote(&frame_id);
    }

    fn remove(&mut self, frame_id: FrameId) {
        self.order.pop(&frame_id);
    }

    fn victim(&self, frames: &[Frame]) -> Option<FrameId> {
        // iter() runs from most to least recently used
        self.order
            .iter()
            .rev()
            .map(|(&frame_id, _)| frame_id)
            .find(|&frame_id| is_evictable(&frames[frame_id]))
    }
}
