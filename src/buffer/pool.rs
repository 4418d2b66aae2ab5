use ahash::AHashMap;
use log::{debug, info, trace, warn};
use std::fmt;
use std::path::{Path, PathBuf};

use super::config::{BufferPoolConfig, ReplacementStrategy};
use super::error::{BufferError, BufferResult};
use super::frame::{Frame, FrameId};
use super::replacer::{Replacer, replacer_for};
use crate::file::{FileError, PAGE_SIZE, PageFile, PageNum};

/// A pinned page, as handed out by [`BufferPool::pin`].
///
/// The page bytes are reached through [`BufferPool::page_data`] and
/// [`BufferPool::page_data_mut`] for as long as the page stays pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle {
    page_num: PageNum,
}

impl PageHandle {
    pub fn new(page_num: PageNum) -> Self {
        Self { page_num }
    }

    pub fn page_num(&self) -> PageNum {
        self.page_num
    }
}

/// Fixed-size cache of pages from a single page file
pub struct BufferPool {
    /// Backing page file, `None` once the pool has been shut down
    page_file: Option<PageFile>,
    path: PathBuf,
    strategy: ReplacementStrategy,
    strategy_data: Option<serde_json::Value>,
    frames: Vec<Frame>,
    /// Page number to frame index for every resident page
    page_table: AHashMap<PageNum, FrameId>,
    /// `None` when the configured strategy is not implemented
    replacer: Option<Box<dyn Replacer>>,
    num_read_io: usize,
    num_write_io: usize,
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("path", &self.path)
            .field("strategy", &self.strategy)
            .field("num_frames", &self.frames.len())
            .field("page_table", &self.page_table)
            .field("num_read_io", &self.num_read_io)
            .field("num_write_io", &self.num_write_io)
            .field("open", &self.page_file.is_some())
            .finish()
    }
}

impl BufferPool {
    /// Create a buffer pool with `num_frames` frames over an existing page file
    pub fn new<P: AsRef<Path>>(
        path: P,
        num_frames: usize,
        strategy: ReplacementStrategy,
    ) -> BufferResult<Self> {
        Self::with_config(path, &BufferPoolConfig::new(num_frames, strategy))
    }

    /// Create a buffer pool from a configuration
    pub fn with_config<P: AsRef<Path>>(path: P, config: &BufferPoolConfig) -> BufferResult<Self> {
        config.validate()?;
        let path = path.as_ref();

        let page_file = PageFile::open(path).map_err(|e| match e {
            FileError::NotFound(name) => BufferError::NotFound(name),
            other => BufferError::File(other),
        })?;

        let replacer = replacer_for(config.strategy, config.num_frames).ok();
        if replacer.is_none() {
            warn!(
                "buffer pool for {} uses unsupported strategy {:?}; pins will fail",
                path.display(),
                config.strategy
            );
        }

        info!(
            "buffer pool initialized for {} with {} frames ({:?})",
            path.display(),
            config.num_frames,
            config.strategy
        );

        Ok(Self {
            page_file: Some(page_file),
            path: path.to_path_buf(),
            strategy: config.strategy,
            strategy_data: config.strategy_data.clone(),
            frames: (0..config.num_frames).map(Frame::empty).collect(),
            page_table: AHashMap::with_capacity(config.num_frames),
            replacer,
            num_read_io: 0,
            num_write_io: 0,
        })
    }

    /// Pin page `page_num`, reading it from disk if it is not cached.
    ///
    /// Pinning a page past the end of the file grows the file with zero pages.
    pub fn pin(&mut self, page_num: PageNum) -> BufferResult<PageHandle> {
        self.ensure_open()?;
        if self.replacer.is_none() {
            warn!("refusing to pin page {}: {:?} is not implemented", page_num, self.strategy);
            return Err(BufferError::UnsupportedStrategy(self.strategy));
        }

        if let Some(&frame_id) = self.page_table.get(&page_num) {
            self.frames[frame_id].pin();
            self.replacer_mut()?.record_access(frame_id);
            trace!(
                "pin hit: page {} in frame {} (fix count {})",
                page_num,
                frame_id,
                self.frames[frame_id].fix_count()
            );
            return Ok(PageHandle { page_num });
        }

        // Frames stay untouched until the incoming page has been read
        let frame_id = self.choose_frame()?;
        let data = self.read_page(page_num)?;
        self.evict(frame_id)?;

        self.frames[frame_id].install(page_num, data);
        self.page_table.insert(page_num, frame_id);
        self.replacer_mut()?.record_install(frame_id);
        debug!("pin miss: page {} loaded into frame {}", page_num, frame_id);

        Ok(PageHandle { page_num })
    }

    /// Release one pin on the page
    pub fn unpin(&mut self, page: &PageHandle) -> BufferResult<()> {
        self.ensure_open()?;
        let frame_id = self.frame_of(page.page_num)?;
        if !self.frames[frame_id].unpin() {
            warn!("unpin of page {} which is not pinned", page.page_num);
            return Err(BufferError::PageNotPinned(page.page_num));
        }
        trace!(
            "unpin: page {} (fix count {})",
            page.page_num,
            self.frames[frame_id].fix_count()
        );
        Ok(())
    }

    /// Flag the page as modified so it is written back before eviction
    pub fn mark_dirty(&mut self, page: &PageHandle) -> BufferResult<()> {
        self.ensure_open()?;
        let frame_id = self.frame_of(page.page_num)?;
        self.frames[frame_id].mark_dirty();
        Ok(())
    }

    /// Write the page to disk now, whether or not it is dirty
    pub fn force_page(&mut self, page: &PageHandle) -> BufferResult<()> {
        self.ensure_open()?;
        let frame_id = self.frame_of(page.page_num)?;
        let file = self.page_file.as_mut().ok_or(BufferError::PoolClosed)?;
        write_back(file, &mut self.frames[frame_id], &mut self.num_write_io)
    }

    /// Write every dirty resident page to disk, pinned or not
    pub fn force_flush_pool(&mut self) -> BufferResult<()> {
        let file = self.page_file.as_mut().ok_or(BufferError::PoolClosed)?;
        for frame in self.frames.iter_mut().filter(|f| f.is_dirty()) {
            write_back(file, frame, &mut self.num_write_io)?;
        }
        file.sync()?;
        Ok(())
    }

    /// Flush and release every frame, then close the page file.
    ///
    /// Fails without touching any frame while a page is still pinned.
    pub fn shutdown(&mut self) -> BufferResult<()> {
        self.ensure_open()?;
        let pinned = self.frames.iter().filter(|f| f.is_pinned()).count();
        if pinned > 0 {
            warn!(
                "cannot shut down buffer pool for {}: {} frame(s) pinned",
                self.path.display(),
                pinned
            );
            return Err(BufferError::PinnedPages(pinned));
        }

        self.force_flush_pool()?;

        for frame in self.frames.iter_mut() {
            if let Some(replacer) = self.replacer.as_deref_mut() {
                replacer.remove(frame.id());
            }
            frame.clear();
        }
        self.page_table.clear();

        if let Some(file) = self.page_file.take() {
            file.close()?;
        }
        info!(
            "buffer pool for {} shut down ({} reads, {} writes)",
            self.path.display(),
            self.num_read_io,
            self.num_write_io
        );
        Ok(())
    }

    /// Bytes of a pinned page
    pub fn page_data(&self, page: &PageHandle) -> BufferResult<&[u8]> {
        let frame_id = self.pinned_frame_of(page.page_num)?;
        Ok(self.frames[frame_id].data())
    }

    /// Mutable bytes of a pinned page; call [`mark_dirty`](Self::mark_dirty)
    /// after changing them
    pub fn page_data_mut(&mut self, page: &PageHandle) -> BufferResult<&mut [u8]> {
        let frame_id = self.pinned_frame_of(page.page_num)?;
        Ok(self.frames[frame_id].data_mut())
    }

    /// Page held by each frame, `None` for empty frames
    pub fn frame_contents(&self) -> Vec<Option<PageNum>> {
        self.frames.iter().map(Frame::page).collect()
    }

    pub fn dirty_flags(&self) -> Vec<bool> {
        self.frames.iter().map(Frame::is_dirty).collect()
    }

    pub fn fix_counts(&self) -> Vec<usize> {
        self.frames.iter().map(Frame::fix_count).collect()
    }

    /// Pages read from disk since the pool was created
    pub fn num_read_io(&self) -> usize {
        self.num_read_io
    }

    /// Pages written to disk since the pool was created
    pub fn num_write_io(&self) -> usize {
        self.num_write_io
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of frames holding a page
    pub fn used_frames(&self) -> usize {
        self.page_table.len()
    }

    pub fn is_page_cached(&self, page_num: PageNum) -> bool {
        self.page_table.contains_key(&page_num)
    }

    pub fn dirty_page_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_dirty()).count()
    }

    pub fn strategy(&self) -> ReplacementStrategy {
        self.strategy
    }

    pub fn strategy_data(&self) -> Option<&serde_json::Value> {
        self.strategy_data.as_ref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.page_file.is_some()
    }

    fn ensure_open(&self) -> BufferResult<()> {
        if self.page_file.is_none() {
            return Err(BufferError::PoolClosed);
        }
        Ok(())
    }

    fn replacer_mut(&mut self) -> BufferResult<&mut Box<dyn Replacer>> {
        let strategy = self.strategy;
        self.replacer
            .as_mut()
            .ok_or(BufferError::UnsupportedStrategy(strategy))
    }

    fn frame_of(&self, page_num: PageNum) -> BufferResult<FrameId> {
        self.page_table
            .get(&page_num)
            .copied()
            .ok_or(BufferError::PageNotResident(page_num))
    }

    fn pinned_frame_of(&self, page_num: PageNum) -> BufferResult<FrameId> {
        self.ensure_open()?;
        let frame_id = self.frame_of(page_num)?;
        if !self.frames[frame_id].is_pinned() {
            return Err(BufferError::PageNotPinned(page_num));
        }
        Ok(frame_id)
    }

    /// Destination for an incoming page: an empty frame, else a victim
    fn choose_frame(&self) -> BufferResult<FrameId> {
        if let Some(frame) = self.frames.iter().find(|f| f.is_empty()) {
            return Ok(frame.id());
        }

        let replacer = self
            .replacer
            .as_deref()
            .ok_or(BufferError::UnsupportedStrategy(self.strategy))?;
        replacer.victim(&self.frames).ok_or_else(|| {
            warn!(
                "buffer pool for {} exhausted: all {} frames pinned",
                self.path.display(),
                self.frames.len()
            );
            BufferError::PoolExhausted
        })
    }

    /// Read a page into a fresh buffer, growing the file if needed
    fn read_page(&mut self, page_num: PageNum) -> BufferResult<Box<[u8]>> {
        let file = self.page_file.as_mut().ok_or(BufferError::PoolClosed)?;
        let needed = page_num
            .checked_add(1)
            .ok_or_else(|| FileError::non_existing(page_num, file.total_num_pages()))?;
        if needed > file.total_num_pages() {
            debug!(
                "growing {} from {} to {} pages",
                self.path.display(),
                file.total_num_pages(),
                needed
            );
        }
        file.ensure_capacity(needed)?;

        let mut data = vec![0u8; PAGE_SIZE].into_boxed_slice();
        file.read_block(page_num, &mut data)?;
        self.num_read_io += 1;
        Ok(data)
    }

    /// Make `frame_id` free for reuse, writing its page back if dirty
    fn evict(&mut self, frame_id: FrameId) -> BufferResult<()> {
        let frame = &mut self.frames[frame_id];
        let Some(old_page) = frame.page() else {
            return Ok(());
        };
        debug_assert!(!frame.is_pinned(), "evicting a pinned frame");

        if frame.is_dirty() {
            let file = self.page_file.as_mut().ok_or(BufferError::PoolClosed)?;
            write_back(file, frame, &mut self.num_write_io)?;
        }
        self.page_table.remove(&old_page);
        debug!("evicted page {} from frame {}", old_page, frame_id);
        Ok(())
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        // Flush dirty pages of a pool that was never shut down
        if self.page_file.is_some()
            && let Err(e) = self.force_flush_pool()
        {
            warn!(
                "failed to flush buffer pool for {} on drop: {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Write a resident frame to its page and clear the dirty flag
fn write_back(file: &mut PageFile, frame: &mut Frame, num_write_io: &mut usize) -> BufferResult<()> {
    let Some(page_num) = frame.page() else {
        return Ok(());
    };
    file.write_block(page_num, frame.data())?;
    frame.mark_clean();
    *num_write_io += 1;
    debug!("wrote page {} from frame {}", page_num, frame.id());
    Ok(())
}
