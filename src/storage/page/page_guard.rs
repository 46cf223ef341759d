use std::sync::Arc;

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::config::{PageId, INVALID_PAGE_ID};
use crate::error::KvResult;
use crate::storage::page::page::{MutRefPageData, Page, RefPageData};

/// Scoped handle over a pinned page.
///
/// The page stays pinned for the guard's lifetime, so its frame cannot be
/// reclaimed underneath the caller. Mutating through `get_data_mut` marks the
/// guard dirty; dropping the guard unpins the page with the accumulated dirty
/// flag. Because the unpin happens in `Drop`, a caller cannot leak a pin on
/// any exit path.
pub struct PageGuard {
    bpm: Arc<BufferPoolManager>,
    page: Page,
    is_dirty: bool,
}

impl PageGuard {
    /// Wrap a page that the buffer pool has already pinned for us.
    pub fn new(bpm: Arc<BufferPoolManager>, page: Page) -> PageGuard {
        Self {
            bpm,
            page,
            is_dirty: false,
        }
    }

    /// Fetch `page_id` through `bpm`, guarded.
    pub fn fetch(bpm: &Arc<BufferPoolManager>, page_id: PageId) -> KvResult<PageGuard> {
        let page = bpm.fetch_page(page_id)?;
        Ok(PageGuard::new(Arc::clone(bpm), page))
    }

    /// Allocate a new page through `bpm`, guarded. The page is born pinned
    /// and dirty.
    pub fn alloc(bpm: &Arc<BufferPoolManager>) -> KvResult<PageGuard> {
        let page = bpm.new_page()?;
        Ok(PageGuard::new(Arc::clone(bpm), page))
    }

    pub fn page_id(&self) -> PageId {
        self.page.get_page_id().unwrap_or(INVALID_PAGE_ID)
    }

    pub fn get_data(&self) -> RefPageData<'_> {
        self.page.get_data()
    }

    pub fn get_data_mut(&mut self) -> MutRefPageData<'_> {
        self.is_dirty = true;
        self.page.get_data_mut()
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page_id) = self.page.get_page_id() {
            // An error here means the page was already gone; nothing useful
            // to do with it during unwinding.
            let _ = self.bpm.unpin_page(page_id, self.is_dirty);
        }
    }
}
