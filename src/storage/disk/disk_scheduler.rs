use std::sync::mpsc;
use std::thread;

use tokio::sync::oneshot;

use crate::common::config::PageId;
use crate::error::{KvError, KvResult};
use crate::storage::disk::DiskManager;
use crate::storage::page::Page;

/// Represents a request for the DiskManager to execute.
pub enum DiskRequest {
    /// Read the page's current id from disk into its frame.
    Read {
        page: Page,
        /// Callback used to signal to the request issuer when the request has
        /// been completed.
        callback: oneshot::Sender<KvResult<()>>,
    },
    /// Write the page's frame content out to disk.
    Write {
        page: Page,
        callback: oneshot::Sender<KvResult<()>>,
    },
    /// Reserve a fresh page id; `None` means the capacity ceiling is reached.
    Allocate {
        callback: oneshot::Sender<Option<PageId>>,
    },
    /// Drop a page id and its backing bytes.
    Deallocate {
        page_id: PageId,
        callback: oneshot::Sender<()>,
    },
}

/// The DiskScheduler schedules disk operations.
///
/// A request is scheduled by queueing a `DiskRequest`; a background worker
/// thread owns the disk manager and processes requests in order, signalling
/// completion through the request's callback. Callers block on the callback,
/// so from their point of view I/O stays synchronous. The worker is created
/// in the constructor and joined when the scheduler drops.
pub struct DiskScheduler {
    /// A shared queue to schedule and process requests. `None` is put into
    /// the queue to signal the background thread to stop.
    request_queue: mpsc::Sender<Option<DiskRequest>>,

    /// The background thread responsible for issuing scheduled requests to
    /// the disk manager.
    background_thread: Option<thread::JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Box<dyn DiskManager>) -> DiskScheduler {
        let (tx, rx) = mpsc::channel();
        Self {
            request_queue: tx,
            background_thread: Some(thread::spawn(move || {
                Self::start_worker_thread(rx, disk_manager)
            })),
        }
    }

    /// Schedule a request for the disk manager to execute.
    pub fn schedule(&self, r: DiskRequest) {
        // A send failure means the worker is gone, which only happens during
        // shutdown; the caller then sees a hung-up callback instead.
        let _ = self.request_queue.send(Some(r));
    }

    /// Read the page's id from disk into its frame, blocking until done.
    pub fn read_page(&self, page: Page) -> KvResult<()> {
        let (tx, rx) = oneshot::channel();
        self.schedule(DiskRequest::Read { page, callback: tx });
        Self::wait(rx)?
    }

    /// Write the page's frame out to disk, blocking until done.
    pub fn write_page(&self, page: Page) -> KvResult<()> {
        let (tx, rx) = oneshot::channel();
        self.schedule(DiskRequest::Write { page, callback: tx });
        Self::wait(rx)?
    }

    /// Reserve a fresh page id, blocking until done.
    pub fn allocate_page(&self) -> KvResult<Option<PageId>> {
        let (tx, rx) = oneshot::channel();
        self.schedule(DiskRequest::Allocate { callback: tx });
        Self::wait(rx)
    }

    /// Drop a page id, blocking until done.
    pub fn deallocate_page(&self, page_id: PageId) -> KvResult<()> {
        let (tx, rx) = oneshot::channel();
        self.schedule(DiskRequest::Deallocate { page_id, callback: tx });
        Self::wait(rx)
    }

    fn wait<T>(rx: oneshot::Receiver<T>) -> KvResult<T> {
        rx.blocking_recv()
            .map_err(|_| KvError::Internal("disk worker hung up".to_string()))
    }

    /// Background worker thread function that processes scheduled requests
    /// until the shutdown sentinel arrives.
    fn start_worker_thread(
        rx: mpsc::Receiver<Option<DiskRequest>>,
        mut disk_manager: Box<dyn DiskManager>,
    ) {
        while let Ok(r) = rx.recv() {
            match r {
                Some(DiskRequest::Read { page, callback }) => {
                    let result = match page.get_page_id() {
                        Some(page_id) => disk_manager.read_page(page_id, &mut *page.get_data_mut()),
                        None => Err(KvError::Internal(
                            "read scheduled for a frame with no page id".to_string(),
                        )),
                    };
                    let _ = callback.send(result);
                }
                Some(DiskRequest::Write { page, callback }) => {
                    let result = match page.get_page_id() {
                        Some(page_id) => disk_manager.write_page(page_id, &*page.get_data()),
                        None => Err(KvError::Internal(
                            "write scheduled for a frame with no page id".to_string(),
                        )),
                    };
                    let _ = callback.send(result);
                }
                Some(DiskRequest::Allocate { callback }) => {
                    let _ = callback.send(disk_manager.allocate_page());
                }
                Some(DiskRequest::Deallocate { page_id, callback }) => {
                    disk_manager.deallocate_page(page_id);
                    let _ = callback.send(());
                }
                None => break,
            }
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        let _ = self.request_queue.send(None);
        if let Some(handle) = self.background_thread.take() {
            let _ = handle.join();
        }
    }
}
