use std::num::NonZeroU32;
use std::sync::Arc;
use softbuffer::{Context, Surface};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::loader::DecodedImage;
use crate::navigator::Screen;
use crate::ui::render::{self, BG_COLOR};
use crate::viewport::Point;

/// A winit window with a softbuffer surface behind it.
pub struct WindowDisplay {
    window: Arc<Window>,
    _context: Context<Arc<Window>>,
    surface: Surface<Arc<Window>, Arc<Window>>,
}

impl WindowDisplay {
    pub fn new(window: Arc<Window>) -> Result<Self, softbuffer::SoftBufferError> {
        let context = Context::new(Arc::clone(&window))?;
        let surface = Surface::new(&context, Arc::clone(&window))?;
        Ok(Self {
            window,
            _context: context,
            surface,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl Screen for WindowDisplay {
    fn size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width.max(1), size.height.max(1))
    }

    fn paint(&mut self, image: &DecodedImage, origin: Point) {
        let (w, h) = self.size();
        let (Some(nw), Some(nh)) = (NonZeroU32::new(w), NonZeroU32::new(h)) else {
            return;
        };
        if let Err(e) = self.surface.resize(nw, nh) {
            log::warn!("Failed to resize surface: {}", e);
            return;
        }
        let mut buffer = match self.surface.buffer_mut() {
            Ok(buffer) => buffer,
            Err(e) => {
                log::warn!("Failed to get frame buffer: {}", e);
                return;
            }
        };
        render::fill(&mut buffer, BG_COLOR);
        render::blit_region(&mut buffer, w, h, image, origin);
        if let Err(e) = buffer.present() {
            log::warn!("Failed to present frame: {}", e);
        }
    }

    fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    fn resize_to(&mut self, width: u32, height: u32) {
        log::debug!("Resizing window to {}x{}", width, height);
        let applied = self
            .window
            .request_inner_size(PhysicalSize::new(width.max(1), height.max(1)));
        if applied.is_none() {
            log::trace!("Resize to {}x{} deferred to the window system", width, height);
        }
    }
}
