pub type PageId = u64;
pub type FrameId = usize;

/// Page id 0 is the "no child" sentinel; the disk manager hands out ids
/// starting at 1.
pub const INVALID_PAGE_ID: PageId = 0;

/// Size of a disk page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Number of frames in the buffer pool. Deliberately tiny so eviction is
/// exercised constantly.
pub const POOL_SIZE: usize = 4;

/// Maximum number of keys a tree node may hold.
pub const ORDER: usize = 10;

/// Width of a stored value in bytes.
pub const VALUE_SIZE: usize = 10;

/// Capacity ceiling of the backing store, in pages.
pub const DISK_MAX_PAGES: usize = 1000;

/// Upper bound for the store size accepted by `create`.
pub const MAX_MEM: usize = 1 << 30;
