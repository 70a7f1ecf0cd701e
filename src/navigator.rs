use std::cmp::Reverse;
use std::sync::Arc;

use crate::cache::{ImageRecord, Outcome, Retention};
use crate::command::Command;
use crate::external::{self, Launcher, Shell};
use crate::loader::{DecodedImage, Decoder, LoadError};
use crate::preload::Prefetch;
use crate::viewport::{self, Point};

/// The surface the navigator paints on.
pub trait Screen {
    /// Canvas size in pixels.
    fn size(&self) -> (u32, u32);
    /// Paint the part of `image` whose top-left corner is `origin`.
    fn paint(&mut self, image: &DecodedImage, origin: Point);
    fn set_title(&mut self, title: &str);
    fn resize_to(&mut self, width: u32, height: u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("no displayable images left")]
    NoImages,
    #[error("{0}")]
    Resource(Arc<LoadError>),
}

#[derive(Debug, Clone, Copy)]
pub struct NavOptions {
    /// Pixels moved by one pan command.
    pub step: i32,
    pub retention: Retention,
}

impl Default for NavOptions {
    fn default() -> Self {
        Self {
            step: 20,
            retention: Retention::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// Owns the browsing state. Every mutation of `images`, `current` and
/// `origin` goes through `handle`, one command at a time, so none of it
/// needs a lock.
pub struct Navigator<S, P> {
    images: Vec<Arc<ImageRecord>>,
    current: usize,
    origin: Point,
    options: NavOptions,
    decoder: Arc<dyn Decoder>,
    prefetch: P,
    screen: S,
    launcher: Box<dyn Launcher>,
}

impl<S: Screen, P: Prefetch> Navigator<S, P> {
    pub fn new(
        images: Vec<Arc<ImageRecord>>,
        decoder: Arc<dyn Decoder>,
        prefetch: P,
        screen: S,
        options: NavOptions,
    ) -> Self {
        Self {
            images,
            current: 0,
            origin: Point::ZERO,
            options,
            decoder,
            prefetch,
            screen,
            launcher: Box::new(Shell),
        }
    }

    #[cfg(test)]
    fn with_launcher(mut self, launcher: impl Launcher + 'static) -> Self {
        self.launcher = Box::new(launcher);
        self
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn screen(&self) -> &S {
        &self.screen
    }

    /// Display the first image.
    pub fn start(&mut self) -> Result<(), ViewerError> {
        self.show()
    }

    pub fn handle(&mut self, cmd: Command) -> Result<Flow, ViewerError> {
        log::trace!("[nav] {} at {} origin {:?}", cmd, self.current, self.origin);
        match cmd {
            Command::Next => self.step_by(1)?,
            Command::Prev => self.step_by(-1)?,
            Command::Pan(dir) => {
                self.origin = self.origin + dir.offset(self.options.step);
                self.paint()?;
            }
            Command::PanOrigin => self.paint()?,
            Command::PanTo(pt) => {
                self.origin = pt;
                self.paint()?;
            }
            Command::Fit => {
                if let Some(Outcome::Ready(img)) = self.current_record()?.resolved() {
                    self.screen.resize_to(img.width, img.height);
                }
            }
            Command::Quit => {
                self.prefetch.shutdown();
                return Ok(Flow::Quit);
            }
            Command::RunExternal(argv) => self.run_external(&argv)?,
        }
        Ok(Flow::Continue)
    }

    fn current_record(&self) -> Result<Arc<ImageRecord>, ViewerError> {
        self.images
            .get(self.current)
            .cloned()
            .ok_or(ViewerError::NoImages)
    }

    fn step_by(&mut self, delta: isize) -> Result<(), ViewerError> {
        let len = self.images.len();
        if len == 0 {
            return Err(ViewerError::NoImages);
        }
        let next = (self.current as isize + delta).rem_euclid(len as isize) as usize;
        log::debug!(
            "[nav] move {} -> {} (cache_hit={})",
            self.current,
            next,
            self.images[next].is_resolved()
        );
        self.current = next;
        self.origin = Point::ZERO;
        self.show()
    }

    /// Resolve the current image (waiting for it if needed), paint it and
    /// schedule the ones after it. Images that fail to load are dropped and
    /// the next survivor at the same index is tried instead.
    fn show(&mut self) -> Result<(), ViewerError> {
        loop {
            if self.images.is_empty() {
                return Err(ViewerError::NoImages);
            }
            if self.current >= self.images.len() {
                self.current = 0;
            }

            let record = Arc::clone(&self.images[self.current]);
            if !record.is_resolved() {
                self.screen
                    .set_title(&format!("vimg :: {} - Loading...", record.name().display()));
            }

            match record.get_or_load(&*self.decoder) {
                Outcome::Failed(e) if e.is_fatal() => return Err(ViewerError::Resource(e)),
                Outcome::Failed(e) => {
                    self.screen
                        .set_title(&format!("vimg :: {} - {}", record.name().display(), e));
                    log::warn!("Dropping '{}' from the list", record.name().display());
                    self.images.remove(self.current);
                    self.origin = Point::ZERO;
                }
                Outcome::Ready(img) => {
                    log::debug!(
                        "Showing '{}' ({} {}x{}, {:.1} KB on disk)",
                        record.name().display(),
                        img.format_name,
                        img.width,
                        img.height,
                        img.file_size as f64 / 1024.0
                    );
                    self.paint_image(&record, &img);
                    self.evict_distant();
                    self.prefetch.top_up(&self.images, self.current + 1);
                    return Ok(());
                }
            }
        }
    }

    /// Repaint the current image at the (re-clamped) origin.
    fn paint(&mut self) -> Result<(), ViewerError> {
        let record = self.current_record()?;
        match record.resolved() {
            Some(Outcome::Ready(img)) => {
                self.paint_image(&record, &img);
                Ok(())
            }
            _ => self.show(),
        }
    }

    fn paint_image(&mut self, record: &ImageRecord, img: &DecodedImage) {
        let (cw, ch) = self.screen.size();
        self.origin = viewport::clamp(self.origin, cw, ch, img.width, img.height);
        self.screen.paint(img, self.origin);
        self.screen.set_title(&format!(
            "vimg :: {} ({}/{}, {}x{})",
            record.name().display(),
            self.current + 1,
            self.images.len(),
            img.width,
            img.height
        ));
    }

    fn run_external(&mut self, argv: &[String]) -> Result<(), ViewerError> {
        let record = self.current_record()?;
        let argv = external::substitute(argv, record.name());
        log::info!("Running: {}", argv.join(" "));
        if let Err(e) = self.launcher.run(&argv) {
            log::error!("Failed to run '{}': {}", argv.join(" "), e);
        }

        if !record.name().exists() {
            log::info!("'{}' no longer exists, dropping it", record.name().display());
            self.images.remove(self.current);
            self.origin = Point::ZERO;
            self.show()?;
        }
        Ok(())
    }

    /// Drop decoded bitmaps outside the retention window, then the farthest
    /// ones while over budget. The current image is never evicted.
    fn evict_distant(&self) {
        let Retention {
            window,
            budget_bytes,
        } = self.options.retention;
        let mut resident = 0u64;
        let mut candidates = Vec::new();

        for (idx, record) in self.images.iter().enumerate() {
            let bytes = record.resident_bytes();
            if bytes == 0 {
                continue;
            }
            let dist = idx.abs_diff(self.current);
            if dist > window && record.evict() {
                log::debug!("[evict] '{}' (distance {})", record.name().display(), dist);
                continue;
            }
            resident += bytes;
            if dist > 0 {
                candidates.push((dist, bytes, record));
            }
        }

        if resident <= budget_bytes {
            return;
        }
        candidates.sort_by_key(|&(dist, _, _)| Reverse(dist));
        for (dist, bytes, record) in candidates {
            if resident <= budget_bytes {
                break;
            }
            if record.evict() {
                resident = resident.saturating_sub(bytes);
                log::debug!(
                    "[evict] '{}' (distance {}, over budget)",
                    record.name().display(),
                    dist
                );
            }
        }
    }
}
