use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::common::config::{PageId, PAGE_SIZE};

pub type RefPageData<'a> = MappedRwLockReadGuard<'a, [u8; PAGE_SIZE]>;
pub type MutRefPageData<'a> = MappedRwLockWriteGuard<'a, [u8; PAGE_SIZE]>;

/// Page is the basic unit of storage within the store. Page wraps the actual
/// data bytes held in a buffer pool frame together with the book-keeping the
/// buffer pool manager needs: pin count, dirty flag, and page id.
///
/// Cloning a `Page` clones the handle, not the bytes; every clone refers to
/// the same frame.
#[derive(Debug, Clone)]
pub struct Page(Arc<RwLock<PageInner>>);

#[derive(Debug)]
struct PageInner {
    // The actual data that is stored within a page.
    data: [u8; PAGE_SIZE],

    // The id of the page this frame currently holds, if any.
    page_id: Option<PageId>,

    // Number of callers currently holding this page pinned.
    pin_count: u32,

    // True if the page differs from its corresponding page on disk.
    is_dirty: bool,
}

impl Page {
    /// Constructor. Zeros out the page data.
    pub fn new() -> Page {
        let inner = PageInner {
            data: [0; PAGE_SIZE],
            page_id: None,
            pin_count: 0,
            is_dirty: false,
        };
        Page(Arc::new(RwLock::new(inner)))
    }

    pub fn reset(&self) {
        let mut p = self.0.write();
        p.data.fill(0);
        p.page_id = None;
        p.pin_count = 0;
        p.is_dirty = false;
    }

    /// @return the actual data contained within this page
    pub fn get_data(&self) -> RefPageData<'_> {
        RwLockReadGuard::map(self.0.read(), |i| &i.data)
    }

    pub fn get_data_mut(&self) -> MutRefPageData<'_> {
        RwLockWriteGuard::map(self.0.write(), |i| &mut i.data)
    }

    pub fn set_page_id(&self, page_id: PageId) {
        self.0.write().page_id = Some(page_id);
    }

    /// @return the page id of this page
    pub fn get_page_id(&self) -> Option<PageId> {
        self.0.read().page_id
    }

    /// @return the pin count of this page
    pub fn get_pin_count(&self) -> u32 {
        self.0.read().pin_count
    }

    pub fn pin(&self) {
        self.0.write().pin_count += 1;
    }

    /// Decrement the pin count; it never goes below zero.
    pub fn unpin(&self) {
        let mut p = self.0.write();
        if p.pin_count > 0 {
            p.pin_count -= 1;
        }
    }

    /// @return true if the page in memory has been modified from the page on
    /// disk, false otherwise
    pub fn is_dirty(&self) -> bool {
        self.0.read().is_dirty
    }

    pub fn set_dirty(&self, is_dirty: bool) {
        self.0.write().is_dirty = is_dirty;
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
