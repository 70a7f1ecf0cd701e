use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};

use crate::cache::{ImageRecord, Outcome};
use crate::loader::Decoder;

/// Queue capacity and scan depth of one top-up.
pub const PRELOAD_QUEUE_SIZE: usize = 32;

/// Something that warms load cells ahead of navigation.
pub trait Prefetch {
    /// Schedule decodes for images at and after `from`. Never blocks.
    fn top_up(&self, images: &[Arc<ImageRecord>], from: usize);

    /// Stop accepting work and let idle workers exit.
    fn shutdown(&self);
}

impl<T: Prefetch + ?Sized> Prefetch for Arc<T> {
    fn top_up(&self, images: &[Arc<ImageRecord>], from: usize) {
        (**self).top_up(images, from)
    }

    fn shutdown(&self) {
        (**self).shutdown()
    }
}

// ---------------------------------------------------------------------------
// Work queue (shared between the navigator and worker threads via Mutex + Condvar)
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Queue {
    items: VecDeque<Arc<ImageRecord>>,
    closed: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
    decoder: Arc<dyn Decoder>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until there is a record to decode. `None` once closed.
    fn next(&self) -> Option<Arc<ImageRecord>> {
        let mut queue = self.lock();
        loop {
            if queue.closed {
                return None;
            }
            if let Some(record) = queue.items.pop_front() {
                return Some(record);
            }
            queue = self.ready.wait(queue).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

// ---------------------------------------------------------------------------
// Preloader
// ---------------------------------------------------------------------------

/// Bounded FIFO feeding a fixed pool of decode workers.
///
/// Scheduling is forward-only and never wraps: images before `from` are
/// left alone, and nothing predicts backward navigation.
pub struct Preloader {
    shared: Arc<Shared>,
    num_threads: usize,
    workers: OnceLock<Vec<JoinHandle<()>>>,
    budget_bytes: u64,
}

/// One worker per available core.
pub fn default_worker_count() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Resident bitmap bytes plus decodes already dispatched, used to predict
/// whether one more preload still fits the memory budget.
struct Usage {
    resident: u64,
    resident_count: u64,
    pending: u64,
}

impl Usage {
    fn measure(images: &[Arc<ImageRecord>]) -> Self {
        let mut usage = Usage {
            resident: 0,
            resident_count: 0,
            pending: 0,
        };
        for record in images {
            let bytes = record.resident_bytes();
            if bytes > 0 {
                usage.resident += bytes;
                usage.resident_count += 1;
            } else if record.is_loading() && !record.is_resolved() {
                usage.pending += 1;
            }
        }
        usage
    }

    fn avg_image_size(&self) -> u64 {
        self.resident.checked_div(self.resident_count).unwrap_or(0)
    }

    /// Without anything resident there is no size estimate yet, so it fits.
    fn fits_one_more(&self, budget_bytes: u64) -> bool {
        let predicted = self
            .avg_image_size()
            .saturating_mul(self.pending + 1)
            .saturating_add(self.resident);
        predicted <= budget_bytes
    }
}

impl Preloader {
    /// Workers are not started until the first `top_up`.
    pub fn new(decoder: Arc<dyn Decoder>, num_threads: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue::default()),
                ready: Condvar::new(),
                decoder,
            }),
            num_threads,
            workers: OnceLock::new(),
            budget_bytes: u64::MAX,
        }
    }

    /// Stop scheduling once resident plus pending bitmaps would exceed
    /// `budget_bytes`. Otherwise the navigator evicts for the budget and the
    /// next top-up decodes the same images again.
    pub fn with_budget(mut self, budget_bytes: u64) -> Self {
        self.budget_bytes = budget_bytes;
        self
    }

    fn start_workers(&self) -> &[JoinHandle<()>] {
        self.workers.get_or_init(|| {
            log::debug!("Starting {} preload workers", self.num_threads);
            (0..self.num_threads)
                .filter_map(|i| {
                    let shared = Arc::clone(&self.shared);
                    let spawned = thread::Builder::new()
                        .name(format!("preload-{}", i))
                        .spawn(move || worker_loop(&shared));
                    match spawned {
                        Ok(handle) => Some(handle),
                        Err(e) => {
                            log::error!("Failed to spawn preload worker: {}", e);
                            None
                        }
                    }
                })
                .collect()
        })
    }

    #[cfg(test)]
    fn queued(&self) -> usize {
        self.shared.lock().items.len()
    }
}

fn worker_loop(shared: &Shared) {
    while let Some(record) = shared.next() {
        match record.get_or_load(&*shared.decoder) {
            Outcome::Ready(img) => log::trace!(
                "Preloaded '{}' ({}x{})",
                record.name().display(),
                img.width,
                img.height
            ),
            Outcome::Failed(_) => {
                log::trace!("Preload of '{}' failed", record.name().display())
            }
        }
        thread::yield_now();
    }
    log::trace!("Preload worker exiting");
}

impl Prefetch for Preloader {
    fn top_up(&self, images: &[Arc<ImageRecord>], from: usize) {
        self.start_workers();
        let mut usage = Usage::measure(images);

        let mut queue = self.shared.lock();
        if queue.closed {
            return;
        }

        let mut queued = 0;
        for record in images.iter().skip(from).take(PRELOAD_QUEUE_SIZE) {
            if record.is_resolved() {
                continue;
            }
            if queue.items.len() >= PRELOAD_QUEUE_SIZE {
                log::trace!("Preload queue full, deferring the rest");
                break;
            }
            if !usage.fits_one_more(self.budget_bytes) {
                log::trace!(
                    "Preload stopped at the memory budget ({} bytes resident, {} pending)",
                    usage.resident,
                    usage.pending
                );
                break;
            }
            if !record.try_mark_loading() {
                continue;
            }
            queue.items.push_back(Arc::clone(record));
            usage.pending += 1;
            queued += 1;
        }
        drop(queue);

        if queued > 0 {
            log::debug!("Queued {} images for preload from index {}", queued, from);
            self.shared.ready.notify_all();
        }
    }

    fn shutdown(&self) {
        let mut queue = self.shared.lock();
        queue.closed = true;
        queue.items.clear();
        drop(queue);
        self.shared.ready.notify_all();
    }
}

impl Drop for Preloader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::FakeDecoder;
    use std::time::{Duration, Instant};

    fn records(n: usize) -> Vec<Arc<ImageRecord>> {
        (0..n)
            .map(|i| Arc::new(ImageRecord::new(format!("img{}.png", i))))
            .collect()
    }

    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn never_queues_more_than_capacity() {
        let preloader = Preloader::new(Arc::new(FakeDecoder::new(1, 1)), 0);
        let images = records(100);

        preloader.top_up(&images, 0);
        assert_eq!(preloader.queued(), PRELOAD_QUEUE_SIZE);

        // queue full: nothing else goes in
        preloader.top_up(&images, 40);
        assert_eq!(preloader.queued(), PRELOAD_QUEUE_SIZE);
        assert!(!images[40].is_loading());
        assert!(images[..PRELOAD_QUEUE_SIZE].iter().all(|r| r.is_loading()));
    }

    #[test]
    fn skips_loading_and_resolved_records() {
        let decoder = FakeDecoder::new(1, 1);
        let preloader = Preloader::new(Arc::new(FakeDecoder::new(1, 1)), 0);
        let images = records(5);
        images[1].try_mark_loading();
        images[2].get_or_load(&decoder);

        preloader.top_up(&images, 0);
        assert_eq!(preloader.queued(), 3);

        preloader.top_up(&images, 0);
        assert_eq!(preloader.queued(), 3);
    }

    #[test]
    fn scans_forward_only() {
        let preloader = Preloader::new(Arc::new(FakeDecoder::new(1, 1)), 0);
        let images = records(10);
        preloader.top_up(&images, 7);
        assert_eq!(preloader.queued(), 3);
        assert!(images[..7].iter().all(|r| !r.is_loading()));
    }

    #[test]
    fn scan_depth_is_bounded() {
        let preloader = Preloader::new(Arc::new(FakeDecoder::new(1, 1)), 0);
        let images = records(100);
        // the first 32 candidates are all resolved; nothing past them is considered
        let decoder = FakeDecoder::new(1, 1);
        for r in &images[..PRELOAD_QUEUE_SIZE] {
            r.get_or_load(&decoder);
        }
        preloader.top_up(&images, 0);
        assert_eq!(preloader.queued(), 0);
    }

    #[test]
    fn stops_at_memory_budget() {
        // 10x10 bitmaps are 400 bytes; one resident leaves room for one more
        let decoder = FakeDecoder::new(10, 10);
        let preloader = Preloader::new(Arc::new(FakeDecoder::new(10, 10)), 0).with_budget(1000);
        let images = records(10);
        images[0].get_or_load(&decoder);

        preloader.top_up(&images, 1);
        assert_eq!(preloader.queued(), 1);
        assert!(images[1].is_loading());
        assert!(!images[2].is_loading());

        // the queued decode counts as pending on the next scan
        preloader.top_up(&images, 2);
        assert_eq!(preloader.queued(), 1);
    }

    #[test]
    fn budget_needs_a_size_estimate() {
        let preloader = Preloader::new(Arc::new(FakeDecoder::new(10, 10)), 0).with_budget(1);
        let images = records(5);
        preloader.top_up(&images, 0);
        assert_eq!(preloader.queued(), 5);
    }

    #[test]
    fn worker_count_follows_available_parallelism() {
        let expected = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        assert_eq!(default_worker_count(), expected);
    }

    #[test]
    fn workers_resolve_queued_images() {
        let decoder = Arc::new(FakeDecoder::new(2, 2));
        let preloader = Preloader::new(decoder.clone(), 3);
        let images = records(10);

        preloader.top_up(&images, 0);
        assert!(wait_until(|| images.iter().all(|r| r.is_resolved())));
        assert_eq!(decoder.calls(), 10);
    }

    #[test]
    fn shutdown_stops_idle_workers() {
        let preloader = Preloader::new(Arc::new(FakeDecoder::new(1, 1)), 2);
        let images = records(3);
        preloader.top_up(&images, 0);
        assert!(wait_until(|| images.iter().all(|r| r.is_resolved())));

        preloader.shutdown();
        let workers = preloader.start_workers();
        assert_eq!(workers.len(), 2);
        assert!(wait_until(|| workers.iter().all(|h| h.is_finished())));

        // closed: nothing is queued any more
        let more = records(3);
        preloader.top_up(&more, 0);
        assert_eq!(preloader.queued(), 0);
        assert!(more.iter().all(|r| !r.is_loading()));
    }
}
