use crate::file::{PAGE_SIZE, PageNum};

/// Index of a frame in the pool's frame table
pub type FrameId = usize;

/// One cache slot of the buffer pool
#[derive(Debug)]
pub(crate) struct Frame {
    id: FrameId,
    /// Page held by this frame, `None` while the frame is empty
    page: Option<PageNum>,
    data: Box<[u8]>,
    fix_count: usize,
    dirty: bool,
}

impl Frame {
    pub(crate) fn empty(id: FrameId) -> Self {
        Self {
            id,
            page: None,
            data: Box::default(),
            fix_count: 0,
            dirty: false,
        }
    }

    pub(crate) fn id(&self) -> FrameId {
        self.id
    }

    pub(crate) fn page(&self) -> Option<PageNum> {
        self.page
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.page.is_none()
    }

    pub(crate) fn fix_count(&self) -> usize {
        self.fix_count
    }

    pub(crate) fn is_pinned(&self) -> bool {
        self.fix_count > 0
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Replace the frame's contents with a freshly read page, pinned once
    pub(crate) fn install(&mut self, page: PageNum, data: Box<[u8]>) {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        debug_assert!(!self.is_pinned(), "installing over a pinned frame");
        self.page = Some(page);
        self.data = data;
        self.fix_count = 1;
        self.dirty = false;
    }

    pub(crate) fn pin(&mut self) {
        self.fix_count += 1;
    }

    /// Drop one pin, returning false if the frame was not pinned
    pub(crate) fn unpin(&mut self) -> bool {
        if self.fix_count == 0 {
            return false;
        }
        self.fix_count -= 1;
        true
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Release the page and its buffer
    pub(crate) fn clear(&mut self) {
        self.page = None;
        self.data = Box::default();
        self.fix_count = 0;
        self.dirty = false;
    }
}
