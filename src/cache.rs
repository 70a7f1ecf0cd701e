use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::loader::{DecodedImage, Decoder, LoadError};

/// The resolved state of a load cell. There is no "pending" variant: a caller
/// either reads a value or waits for the decode that produces one.
#[derive(Clone)]
pub enum Outcome {
    Ready(Arc<DecodedImage>),
    Failed(Arc<LoadError>),
}

impl From<Result<DecodedImage, LoadError>> for Outcome {
    fn from(result: Result<DecodedImage, LoadError>) -> Self {
        match result {
            Ok(img) => Outcome::Ready(Arc::new(img)),
            Err(e) => Outcome::Failed(Arc::new(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Load cell
// ---------------------------------------------------------------------------

/// Single-slot memo for one decode.
///
/// Single-flight: the first caller runs the decoder and every concurrent
/// caller blocks on the same slot until that decode finishes, so a cell never
/// decodes twice. Once filled, the slot is never written again and reads take
/// no lock.
#[derive(Default)]
pub struct LoadCell {
    slot: OnceLock<Outcome>,
}

impl LoadCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&Outcome> {
        self.slot.get()
    }

    pub fn get_or_load(&self, path: &Path, decoder: &dyn Decoder) -> Outcome {
        self.slot
            .get_or_init(|| {
                let outcome = Outcome::from(decoder.decode(path));
                if let Outcome::Failed(ref e) = outcome {
                    log::error!("{}", e);
                }
                outcome
            })
            .clone()
    }
}

// ---------------------------------------------------------------------------
// Image record
// ---------------------------------------------------------------------------

/// One browsable file and whatever we know about its pixels.
pub struct ImageRecord {
    name: PathBuf,
    cell: Mutex<Arc<LoadCell>>,
    loading: AtomicBool,
}

impl ImageRecord {
    pub fn new(name: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            cell: Mutex::new(Arc::new(LoadCell::new())),
            loading: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &Path {
        &self.name
    }

    fn cell(&self) -> Arc<LoadCell> {
        Arc::clone(&self.cell.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Return the memoized outcome, decoding (or waiting for a decode already
    /// in flight) if the record has not been resolved yet.
    pub fn get_or_load(&self, decoder: &dyn Decoder) -> Outcome {
        self.loading.store(true, Ordering::Release);
        self.cell().get_or_load(&self.name, decoder)
    }

    pub fn resolved(&self) -> Option<Outcome> {
        self.cell().get().cloned()
    }

    pub fn is_resolved(&self) -> bool {
        self.cell().get().is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Claim the record for a background decode. Returns false if somebody
    /// already dispatched one.
    pub fn try_mark_loading(&self) -> bool {
        !self.loading.swap(true, Ordering::AcqRel)
    }

    /// Bytes held by a successfully decoded bitmap, zero otherwise.
    pub fn resident_bytes(&self) -> u64 {
        match self.cell().get() {
            Some(Outcome::Ready(img)) => img.mem_size(),
            _ => 0,
        }
    }

    /// Drop a decoded bitmap, keeping the record. A fresh empty cell is
    /// installed; the old one is left untouched for anyone still holding it.
    /// Failures and unresolved cells are kept.
    pub fn evict(&self) -> bool {
        let mut cell = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(cell.get(), Some(Outcome::Ready(_))) {
            return false;
        }
        *cell = Arc::new(LoadCell::new());
        self.loading.store(false, Ordering::Release);
        true
    }
}

impl std::fmt::Debug for ImageRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRecord")
            .field("name", &self.name)
            .field("loading", &self.is_loading())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Retention
// ---------------------------------------------------------------------------

/// How many decoded bitmaps the navigator keeps around the current one.
#[derive(Debug, Clone, Copy)]
pub struct Retention {
    /// Bitmaps farther than this many positions from `current` are dropped.
    pub window: usize,
    /// Upper bound on resident bitmap bytes; the farthest go first.
    pub budget_bytes: u64,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            window: usize::MAX,
            budget_bytes: u64::MAX,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    /// Decoder that counts calls. Names containing "bad" fail to decode and
    /// names containing "huge" fail to allocate.
    pub(crate) struct FakeDecoder {
        pub calls: AtomicUsize,
        pub delay: Duration,
        pub size: (u32, u32),
    }

    impl FakeDecoder {
        pub(crate) fn new(width: u32, height: u32) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                size: (width, height),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Decoder for FakeDecoder {
        fn decode(&self, path: &Path) -> Result<DecodedImage, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            let name = path.to_string_lossy();
            if name.contains("huge") {
                return Err(LoadError::Resource {
                    path: path.to_path_buf(),
                    bytes: usize::MAX,
                });
            }
            if name.contains("bad") {
                return Err(LoadError::Access {
                    path: path.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::InvalidData, "corrupt"),
                });
            }
            let (width, height) = self.size;
            Ok(DecodedImage {
                pixels: vec![0; (width * height) as usize],
                width,
                height,
                file_size: 0,
                format_name: "FAKE".into(),
            })
        }
    }

    #[test]
    fn resolved_value_never_changes() {
        let decoder = FakeDecoder::new(2, 2);
        let record = ImageRecord::new("a.png");
        assert!(record.resolved().is_none());

        let first = record.get_or_load(&decoder);
        let second = record.get_or_load(&decoder);
        match (first, second, record.resolved().unwrap()) {
            (Outcome::Ready(a), Outcome::Ready(b), Outcome::Ready(c)) => {
                assert!(Arc::ptr_eq(&a, &b));
                assert!(Arc::ptr_eq(&a, &c));
            }
            _ => panic!("expected ready outcomes"),
        }
        assert_eq!(decoder.calls(), 1);
    }

    #[test]
    fn failures_are_memoized_too() {
        let decoder = FakeDecoder::new(2, 2);
        let record = ImageRecord::new("bad.png");
        assert!(matches!(record.get_or_load(&decoder), Outcome::Failed(_)));
        assert!(matches!(record.get_or_load(&decoder), Outcome::Failed(_)));
        assert_eq!(decoder.calls(), 1);
    }

    #[test]
    fn concurrent_callers_share_one_decode() {
        let mut decoder = FakeDecoder::new(4, 4);
        decoder.delay = Duration::from_millis(50);
        let decoder = Arc::new(decoder);
        let record = Arc::new(ImageRecord::new("shared.png"));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let decoder = Arc::clone(&decoder);
                let record = Arc::clone(&record);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    match record.get_or_load(&*decoder) {
                        Outcome::Ready(img) => img,
                        Outcome::Failed(e) => panic!("{e}"),
                    }
                })
            })
            .collect();

        let images: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(decoder.calls(), 1);
        assert!(images.iter().all(|img| Arc::ptr_eq(img, &images[0])));
    }

    #[test]
    fn try_mark_loading_claims_once() {
        let record = ImageRecord::new("a.png");
        assert!(!record.is_loading());
        assert!(record.try_mark_loading());
        assert!(!record.try_mark_loading());
        assert!(record.is_loading());
    }

    #[test]
    fn evict_drops_bitmap_but_keeps_record() {
        let decoder = FakeDecoder::new(10, 10);
        let record = ImageRecord::new("a.png");
        record.get_or_load(&decoder);
        assert_eq!(record.resident_bytes(), 400);

        assert!(record.evict());
        assert!(!record.is_resolved());
        assert!(!record.is_loading());
        assert_eq!(record.resident_bytes(), 0);
        assert_eq!(record.name(), Path::new("a.png"));

        // loads again on demand
        assert!(matches!(record.get_or_load(&decoder), Outcome::Ready(_)));
        assert_eq!(decoder.calls(), 2);
    }

    #[test]
    fn failures_and_unresolved_are_not_evicted() {
        let decoder = FakeDecoder::new(1, 1);
        let pending = ImageRecord::new("a.png");
        assert!(!pending.evict());

        let failed = ImageRecord::new("bad.png");
        failed.get_or_load(&decoder);
        assert!(!failed.evict());
        assert!(failed.is_resolved());
    }
}
