use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::common::config::{PageId, DISK_MAX_PAGES, PAGE_SIZE};
use crate::error::{KvError, KvResult};

/// Directory under the store path holding one file per page.
pub const PAGE_DIR: &str = "KVSTOREPAGES";

/// DiskManager takes care of the allocation and deallocation of pages within
/// a store. It performs the reading and writing of pages to and from disk,
/// providing a logical page layer to the buffer pool. I/O is synchronous and
/// blocking. The manager knows nothing about pin counts or dirty bits.
pub trait DiskManager: Send {
    /// Hand out a fresh page id, or `None` once the capacity ceiling has been
    /// reached. Ids are monotonic and start at 1; 0 stays reserved.
    fn allocate_page(&mut self) -> Option<PageId>;

    /// Drop the page; subsequent reads of `page_id` report NotFound.
    fn deallocate_page(&mut self, page_id: PageId);

    /// Read `page_id` into `page_data`. NotFound if the page was never
    /// written.
    fn read_page(&mut self, page_id: PageId, page_data: &mut [u8]) -> KvResult<()>;

    /// Persist `page_data` under `page_id`, creating the backing object if it
    /// does not exist yet.
    fn write_page(&mut self, page_id: PageId, page_data: &[u8]) -> KvResult<()>;
}

/// Production disk manager: one file per page, named by its decimal id,
/// under `<path>/KVSTOREPAGES/`.
pub struct FileDiskManager {
    page_dir: PathBuf,
    next_page_id: PageId,
    max_pages: usize,
}

impl FileDiskManager {
    /// Start a fresh store at `path`, clearing any page files left behind by
    /// a previous store at the same location.
    pub fn create(path: &Path) -> KvResult<FileDiskManager> {
        let page_dir = path.join(PAGE_DIR);
        if page_dir.exists() {
            fs::remove_dir_all(&page_dir)?;
        }
        fs::create_dir_all(&page_dir)?;
        Ok(Self {
            page_dir,
            next_page_id: 1,
            max_pages: DISK_MAX_PAGES,
        })
    }

    /// Re-attach to an existing store, recovering the allocation cursor from
    /// the page file names.
    pub fn open(path: &Path) -> KvResult<FileDiskManager> {
        let page_dir = path.join(PAGE_DIR);
        if !page_dir.is_dir() {
            return Err(KvError::NotFound);
        }
        let mut next_page_id: PageId = 1;
        for entry in fs::read_dir(&page_dir)? {
            let entry = entry?;
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<PageId>().ok())
            {
                next_page_id = next_page_id.max(id + 1);
            }
        }
        Ok(Self {
            page_dir,
            next_page_id,
            max_pages: DISK_MAX_PAGES,
        })
    }

    fn page_file(&self, page_id: PageId) -> PathBuf {
        self.page_dir.join(page_id.to_string())
    }
}

impl DiskManager for FileDiskManager {
    fn allocate_page(&mut self) -> Option<PageId> {
        if self.next_page_id as usize > self.max_pages {
            return None;
        }
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        Some(page_id)
    }

    fn deallocate_page(&mut self, page_id: PageId) {
        // Removing an already-gone file is fine.
        let _ = fs::remove_file(self.page_file(page_id));
    }

    fn read_page(&mut self, page_id: PageId, page_data: &mut [u8]) -> KvResult<()> {
        assert_eq!(page_data.len(), PAGE_SIZE);
        let mut file = match File::open(self.page_file(page_id)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(KvError::NotFound),
            Err(e) => return Err(e.into()),
        };
        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = file.read(&mut page_data[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < PAGE_SIZE {
            debug!("read less than a page from {}, zero-filling", page_id);
            page_data[filled..].fill(0);
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page_data: &[u8]) -> KvResult<()> {
        assert_eq!(page_data.len(), PAGE_SIZE);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.page_file(page_id))?;
        file.write_all(page_data)?;
        // needs to flush to keep disk file in sync
        file.flush()?;
        Ok(())
    }
}

/// In-memory disk manager for tests; keeps page bytes in a map.
pub struct MemDiskManager {
    pages: HashMap<PageId, Box<[u8; PAGE_SIZE]>>,
    next_page_id: PageId,
    max_pages: usize,
}

impl MemDiskManager {
    pub fn new(max_pages: usize) -> MemDiskManager {
        Self {
            pages: HashMap::new(),
            next_page_id: 1,
            max_pages,
        }
    }
}

impl DiskManager for MemDiskManager {
    fn allocate_page(&mut self) -> Option<PageId> {
        if self.next_page_id as usize > self.max_pages {
            return None;
        }
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        Some(page_id)
    }

    fn deallocate_page(&mut self, page_id: PageId) {
        self.pages.remove(&page_id);
    }

    fn read_page(&mut self, page_id: PageId, page_data: &mut [u8]) -> KvResult<()> {
        assert_eq!(page_data.len(), PAGE_SIZE);
        match self.pages.get(&page_id) {
            Some(bytes) => {
                page_data.copy_from_slice(&bytes[..]);
                Ok(())
            }
            None => Err(KvError::NotFound),
        }
    }

    fn write_page(&mut self, page_id: PageId, page_data: &[u8]) -> KvResult<()> {
        assert_eq!(page_data.len(), PAGE_SIZE);
        let mut bytes = Box::new([0u8; PAGE_SIZE]);
        bytes.copy_from_slice(page_data);
        self.pages.insert(page_id, bytes);
        Ok(())
    }
}
