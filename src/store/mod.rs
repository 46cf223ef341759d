mod catalog;

pub use catalog::{Catalog, CATALOG_FILE};

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::buffer::BufferPoolManager;
use crate::common::config::{MAX_MEM, POOL_SIZE};
use crate::error::{KvError, KvResult};
use crate::storage::disk::{FileDiskManager, PAGE_DIR};
use crate::storage::index::{BPlusTree, Value};

/// Disk-backed ordered key-value store.
///
/// Wires a file-per-page disk manager, a clock-replaced buffer pool, and a
/// B+ tree index together, and persists the tree's root page id in a catalog
/// file next to the page directory. A handle is single-writer and not safe
/// for concurrent use.
pub struct KeyValueStore {
    dir: PathBuf,
    catalog: Catalog,
    buffer_pool: Arc<BufferPoolManager>,
    index: BPlusTree,
}

impl KeyValueStore {
    /// Create a fresh store at `path` with a configured size of `size`
    /// bytes. Any previous store at the same path is cleared.
    pub fn create(path: &str, size: usize) -> KvResult<KeyValueStore> {
        if size == 0 || size > MAX_MEM {
            return Err(KvError::OutOfRange);
        }
        let dir = Self::validate_path(path)?;
        fs::create_dir_all(&dir).map_err(|_| KvError::InvalidPath)?;

        let disk_manager = FileDiskManager::create(&dir)?;
        let buffer_pool = Arc::new(BufferPoolManager::new(POOL_SIZE, Box::new(disk_manager)));
        let index = BPlusTree::bootstrap(Arc::clone(&buffer_pool))?;

        let catalog = Catalog::new(path.to_string(), size as u64, index.root_page_id());
        catalog.save(&dir)?;
        buffer_pool.flush_all_pages()?;
        debug!("created store at {}", path);
        Ok(KeyValueStore {
            dir,
            catalog,
            buffer_pool,
            index,
        })
    }

    /// Open the store previously created at `path`. NotFound when nothing
    /// lives there.
    pub fn open(path: &str) -> KvResult<KeyValueStore> {
        let dir = Self::validate_path(path)?;
        let catalog = Catalog::load(&dir)?;
        let disk_manager = FileDiskManager::open(&dir)?;
        let buffer_pool = Arc::new(BufferPoolManager::new(POOL_SIZE, Box::new(disk_manager)));
        let index = BPlusTree::new(Arc::clone(&buffer_pool), catalog.root_page_id);
        debug!("opened store at {}", path);
        Ok(KeyValueStore {
            dir,
            catalog,
            buffer_pool,
            index,
        })
    }

    /// Persist the current root and flush every resident page.
    pub fn close(&mut self) -> KvResult<()> {
        self.sync_catalog()?;
        self.buffer_pool.flush_all_pages()
    }

    /// Remove the store at `path`: its page directory and its catalog.
    /// NotFound when there is no store there.
    pub fn delete_store(path: &str) -> KvResult<()> {
        let dir = Self::validate_path(path)?;
        if !Catalog::exists(&dir) {
            return Err(KvError::NotFound);
        }
        let _ = fs::remove_dir_all(dir.join(PAGE_DIR));
        fs::remove_file(dir.join(CATALOG_FILE))?;
        debug!("deleted store at {}", path);
        Ok(())
    }

    /// Insert a pair; inserting an existing key fails with DuplicateKey.
    pub fn put(&mut self, key: u64, value: Value) -> KvResult<()> {
        self.index.insert(key, value)?;
        self.sync_catalog()
    }

    /// Point lookup.
    pub fn get(&self, key: u64) -> KvResult<Value> {
        self.index.get(key)
    }

    /// Remove a key; removing an absent key fails with NotFound.
    pub fn delete(&mut self, key: u64) -> KvResult<()> {
        self.index.delete(key)?;
        self.sync_catalog()
    }

    /// Values of all present keys in `[begin, end)`, in key order.
    pub fn scan_range(&self, begin: u64, end: u64) -> KvResult<Vec<Value>> {
        self.index.scan_range(begin, end)
    }

    /// Re-persist the catalog whenever the tree root moved.
    fn sync_catalog(&mut self) -> KvResult<()> {
        if self.catalog.root_page_id != self.index.root_page_id() {
            self.catalog.root_page_id = self.index.root_page_id();
            self.catalog.save(&self.dir)?;
        }
        Ok(())
    }

    fn validate_path(path: &str) -> KvResult<PathBuf> {
        if path.is_empty() {
            return Err(KvError::InvalidPath);
        }
        Ok(PathBuf::from(path))
    }
}
