use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use super::clock_replacer::ClockReplacer;
use crate::common::config::{FrameId, PageId};
use crate::error::{KvError, KvResult};
use crate::storage::disk::{DiskManager, DiskScheduler};
use crate::storage::page::Page;

/// BufferPoolManager reads disk pages to and from its internal buffer pool.
///
/// A page resides in at most one frame at a time. Pinned pages are never
/// evicted; once a page's pin count drops to zero its frame becomes a clock
/// replacer candidate. Dirty pages are written back through the disk
/// scheduler before their frame is reused.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool.
    pool_size: usize,
    /// Array of buffer pool frames.
    pages: Vec<Page>,
    /// Executes reads and writes against the disk manager.
    disk_scheduler: DiskScheduler,
    /// Page table for keeping track of buffer pool pages.
    page_table: Mutex<HashMap<PageId, FrameId>>,
    /// Replacer to find unpinned frames for replacement.
    replacer: Mutex<ClockReplacer>,
    /// List of free frames that don't have any pages on them.
    free_list: Mutex<Vec<FrameId>>,
}

impl BufferPoolManager {
    /// @param pool_size the size of the buffer pool
    /// @param disk_manager the disk manager backing this pool
    pub fn new(pool_size: usize, disk_manager: Box<dyn DiskManager>) -> BufferPoolManager {
        let mut free_list = Vec::with_capacity(pool_size);
        for i in (0..pool_size).rev() {
            free_list.push(i as FrameId);
        }
        Self {
            pool_size,
            pages: (0..pool_size).map(|_| Page::new()).collect(),
            disk_scheduler: DiskScheduler::new(disk_manager),
            page_table: Mutex::new(HashMap::new()),
            replacer: Mutex::new(ClockReplacer::new(pool_size)),
            free_list: Mutex::new(free_list),
        }
    }

    /// @brief Return the size (number of frames) of the buffer pool.
    pub fn get_pool_size(&self) -> usize {
        self.pool_size
    }

    /// @brief Return all the frames in the buffer pool, for inspection.
    pub fn get_pages(&self) -> &Vec<Page> {
        &self.pages
    }

    /// @brief Fetch the requested page from the buffer pool, pinned.
    ///
    /// A resident page is pinned and returned directly. Otherwise a frame is
    /// claimed from the free list or, failing that, from the replacer (the
    /// victim is written back first when dirty), and the page is read from
    /// disk into it. Saturation (every frame pinned) reports `Internal`.
    pub fn fetch_page(&self, page_id: PageId) -> KvResult<Page> {
        if let Some(frame_id) = self.page_table.lock().unwrap().get(&page_id) {
            let page = &self.pages[*frame_id];
            page.pin();
            self.replacer.lock().unwrap().pin(*frame_id);
            return Ok(page.clone());
        }

        let frame_id = self.available_frame()?;
        let page = &self.pages[frame_id];
        page.reset();
        page.set_page_id(page_id);
        if let Err(e) = self.disk_scheduler.read_page(page.clone()) {
            // hand the claimed frame back before surfacing the error
            page.reset();
            self.free_list.lock().unwrap().push(frame_id);
            return Err(e);
        }
        page.pin();
        self.page_table.lock().unwrap().insert(page_id, frame_id);
        Ok(page.clone())
    }

    /// @brief Create a new page in the buffer pool, pinned and dirty.
    ///
    /// The id comes from the disk manager's allocator; the frame is
    /// zero-initialised. Fails with `Internal` when no frame can be claimed
    /// or the disk capacity ceiling is reached.
    pub fn new_page(&self) -> KvResult<Page> {
        let frame_id = self.available_frame()?;
        let page_id = match self.disk_scheduler.allocate_page() {
            Ok(Some(page_id)) => page_id,
            Ok(None) => {
                self.free_list.lock().unwrap().push(frame_id);
                return Err(KvError::Internal(
                    "disk capacity ceiling reached".to_string(),
                ));
            }
            Err(e) => {
                self.free_list.lock().unwrap().push(frame_id);
                return Err(e);
            }
        };

        let page = &self.pages[frame_id];
        page.reset();
        page.set_page_id(page_id);
        page.pin();
        page.set_dirty(true);
        self.page_table.lock().unwrap().insert(page_id, frame_id);
        Ok(page.clone())
    }

    /// @brief Unpin the target page from the buffer pool.
    ///
    /// Decrements the pin count (it never drops below zero); at zero the
    /// frame becomes evictable. The page's dirty bit becomes the OR of its
    /// previous value and `is_dirty`. NotFound if the page is not resident.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> KvResult<()> {
        let frame_id = match self.page_table.lock().unwrap().get(&page_id) {
            Some(frame_id) => *frame_id,
            None => return Err(KvError::NotFound),
        };
        let page = &self.pages[frame_id];
        if is_dirty {
            page.set_dirty(true);
        }
        page.unpin();
        if page.get_pin_count() == 0 {
            self.replacer.lock().unwrap().unpin(frame_id);
        }
        Ok(())
    }

    /// @brief Flush the target page to disk, regardless of the dirty flag,
    /// and clear the flag. Pin counts are untouched: flushing is read-only
    /// with respect to pin semantics. NotFound if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> KvResult<()> {
        let frame_id = match self.page_table.lock().unwrap().get(&page_id) {
            Some(frame_id) => *frame_id,
            None => return Err(KvError::NotFound),
        };
        let page = &self.pages[frame_id];
        self.disk_scheduler.write_page(page.clone())?;
        page.set_dirty(false);
        Ok(())
    }

    /// @brief Flush every resident page to disk.
    pub fn flush_all_pages(&self) -> KvResult<()> {
        let page_ids: Vec<PageId> = self.page_table.lock().unwrap().keys().copied().collect();
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// @brief Delete a page from the buffer pool and the disk.
    ///
    /// A page that is not resident succeeds silently. A pinned page cannot be
    /// deleted. Otherwise the mapping is dropped, the frame returns to the
    /// free list (and leaves the replacer's candidate set), and the disk
    /// manager deallocates the id.
    pub fn delete_page(&self, page_id: PageId) -> KvResult<()> {
        let frame_id = match self.page_table.lock().unwrap().get(&page_id) {
            Some(frame_id) => *frame_id,
            None => return Ok(()),
        };
        let page = &self.pages[frame_id];
        if page.get_pin_count() > 0 {
            return Err(KvError::Internal(format!(
                "page {page_id} is pinned, cannot delete"
            )));
        }
        self.page_table.lock().unwrap().remove(&page_id);
        self.replacer.lock().unwrap().pin(frame_id);
        self.free_list.lock().unwrap().push(frame_id);
        page.reset();
        self.disk_scheduler.deallocate_page(page_id)?;
        Ok(())
    }

    /// Claim a frame: free list first, then the replacer. Evicting writes a
    /// dirty victim back through the disk manager and drops its mapping.
    fn available_frame(&self) -> KvResult<FrameId> {
        if let Some(frame_id) = self.free_list.lock().unwrap().pop() {
            return Ok(frame_id);
        }
        let victim = self.replacer.lock().unwrap().evict();
        if let Some(frame_id) = victim {
            let page = &self.pages[frame_id];
            if page.is_dirty() {
                if let Err(e) = self.disk_scheduler.write_page(page.clone()) {
                    // the victim stays resident; let it be chosen again later
                    self.replacer.lock().unwrap().unpin(frame_id);
                    return Err(e);
                }
                page.set_dirty(false);
            }
            if let Some(victim_id) = page.get_page_id() {
                debug!("evicted page {} from frame {}", victim_id, frame_id);
                self.page_table.lock().unwrap().remove(&victim_id);
            }
            return Ok(frame_id);
        }
        Err(KvError::Internal(
            "buffer pool exhausted: all frames pinned".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use rand::distributions::{Distribution, Uniform};
    use tempdir::TempDir;

    use super::*;
    use crate::common::config::{DISK_MAX_PAGES, PAGE_SIZE};
    use crate::storage::disk::{FileDiskManager, MemDiskManager};

    fn mem_bpm(pool_size: usize) -> BufferPoolManager {
        BufferPoolManager::new(pool_size, Box::new(MemDiskManager::new(DISK_MAX_PAGES)))
    }

    #[test]
    fn test_buffer_pool_manager_binary_data() {
        let dir = TempDir::new("pagekv").unwrap();
        let buffer_pool_size = 10;

        let mut rng = rand::thread_rng();
        let uniform_dist = Uniform::from(u8::MIN..=u8::MAX);

        let disk_manager = FileDiskManager::create(dir.path()).unwrap();
        let bpm = BufferPoolManager::new(buffer_pool_size, Box::new(disk_manager));

        // Scenario: the buffer pool is empty; we should be able to create a
        // new page.
        let page0 = bpm.new_page().unwrap();
        let page0_id = page0.get_page_id().unwrap();

        let mut random_binary_data: Vec<u8> =
            (0..PAGE_SIZE).map(|_| uniform_dist.sample(&mut rng)).collect();
        // Terminal characters both in the middle and at the end.
        random_binary_data[PAGE_SIZE / 2] = 0;
        random_binary_data[PAGE_SIZE - 1] = 0;

        // Scenario: once we have a page, we should be able to read and write
        // content.
        page0.get_data_mut().copy_from_slice(&random_binary_data);
        assert_eq!(random_binary_data[..], page0.get_data()[..]);

        // Scenario: we should be able to create new pages until we fill up
        // the buffer pool, and no further.
        for _ in 1..buffer_pool_size {
            assert!(bpm.new_page().is_ok());
        }
        for _ in buffer_pool_size..buffer_pool_size * 2 {
            assert!(bpm.new_page().is_err());
        }

        // Scenario: after unpinning pages {1..=5} we should be able to create
        // 5 new pages.
        for page_id in 1..=5 {
            assert!(bpm.unpin_page(page_id, true).is_ok());
            bpm.flush_page(page_id).unwrap();
        }
        for _ in 0..5 {
            let page = bpm.new_page().unwrap();
            // Unpin here to allow future fetching.
            bpm.unpin_page(page.get_page_id().unwrap(), false).unwrap();
        }

        // Scenario: we should be able to fetch the data we wrote a while ago.
        let page0 = bpm.fetch_page(page0_id).unwrap();
        assert_eq!(random_binary_data[..], page0.get_data()[..]);
        assert!(bpm.unpin_page(page0_id, true).is_ok());
    }

    #[test]
    fn test_buffer_pool_manager_sample() {
        let buffer_pool_size = 10;
        let bpm = mem_bpm(buffer_pool_size);

        // Scenario: the buffer pool is empty; we should be able to create a
        // new page, and ids start at 1.
        let page0 = bpm.new_page().unwrap();
        assert_eq!(Some(1), page0.get_page_id());

        // Scenario: once we have a page, we should be able to read and write
        // content.
        let data = "Hello".as_bytes();
        page0.get_data_mut()[..data.len()].copy_from_slice(data);
        assert_eq!(data, &page0.get_data()[..data.len()]);

        // Scenario: we should be able to create new pages until we fill up
        // the buffer pool.
        for _ in 1..buffer_pool_size {
            assert!(bpm.new_page().is_ok());
        }

        // Scenario: once the buffer pool is full, we should not be able to
        // create any new pages.
        for _ in buffer_pool_size..buffer_pool_size * 2 {
            assert!(bpm.new_page().is_err());
        }

        // Scenario: after unpinning pages {1..=5} and pinning another 4 new
        // pages, there is still one buffer frame left for reading page 1.
        for page_id in 1..=5 {
            assert!(bpm.unpin_page(page_id, true).is_ok());
        }
        for _ in 0..4 {
            assert!(bpm.new_page().is_ok());
        }

        // Scenario: we should be able to fetch the data we wrote a while ago.
        let page0 = bpm.fetch_page(1).unwrap();
        assert_eq!(data, &page0.get_data()[..data.len()]);

        // Scenario: if we unpin page 1 and then make a new page, all the
        // buffer pages should be pinned; fetching page 1 again must fail.
        assert!(bpm.unpin_page(1, true).is_ok());
        assert!(bpm.new_page().is_ok());
        assert!(bpm.fetch_page(1).is_err());
    }

    #[test]
    fn test_unpin_or_semantics_for_dirty_bit() {
        let bpm = mem_bpm(2);
        let page = bpm.new_page().unwrap();
        let page_id = page.get_page_id().unwrap();

        // A clean unpin must not wash out an earlier dirty one.
        page.pin();
        bpm.unpin_page(page_id, true).unwrap();
        bpm.unpin_page(page_id, false).unwrap();
        assert!(page.is_dirty());
    }

    #[test]
    fn test_flush_page_keeps_pin_count() {
        let bpm = mem_bpm(2);
        let page = bpm.new_page().unwrap();
        let page_id = page.get_page_id().unwrap();

        assert_eq!(1, page.get_pin_count());
        bpm.flush_page(page_id).unwrap();
        assert_eq!(1, page.get_pin_count());
        assert!(!page.is_dirty());
    }

    #[test]
    fn test_fetch_missing_page_restores_frame() {
        let bpm = mem_bpm(2);

        // Page 99 was never allocated or written.
        assert!(bpm.fetch_page(99).is_err());

        // The claimed frame must have been handed back: the pool still fits
        // two pinned pages.
        assert!(bpm.new_page().is_ok());
        assert!(bpm.new_page().is_ok());
    }

    #[test]
    fn test_delete_page() {
        let bpm = mem_bpm(2);
        let page = bpm.new_page().unwrap();
        let page_id = page.get_page_id().unwrap();

        // Pinned pages cannot be deleted.
        assert!(bpm.delete_page(page_id).is_err());

        bpm.unpin_page(page_id, true).unwrap();
        bpm.delete_page(page_id).unwrap();

        // Deleting a non-resident page succeeds silently.
        bpm.delete_page(page_id).unwrap();

        // The page is gone from disk as well.
        assert!(matches!(bpm.fetch_page(page_id), Err(KvError::NotFound)));
    }

    #[test]
    fn test_flush_all_pages() {
        let bpm = mem_bpm(4);
        let mut page_ids = Vec::new();
        for i in 0..3u8 {
            let page = bpm.new_page().unwrap();
            page.get_data_mut()[0] = i;
            page_ids.push(page.get_page_id().unwrap());
        }
        bpm.flush_all_pages().unwrap();
        for &page_id in &page_ids {
            bpm.unpin_page(page_id, false).unwrap();
        }

        // Evict everything, then read back what the flush persisted.
        for _ in 0..4 {
            let page = bpm.new_page().unwrap();
            bpm.unpin_page(page.get_page_id().unwrap(), false).unwrap();
        }
        for (i, &page_id) in page_ids.iter().enumerate() {
            let page = bpm.fetch_page(page_id).unwrap();
            assert_eq!(i as u8, page.get_data()[0]);
            bpm.unpin_page(page_id, false).unwrap();
        }
    }
}
