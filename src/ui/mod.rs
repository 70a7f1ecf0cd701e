use std::sync::Arc;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::window::{Fullscreen, Window, WindowId};

use crate::cache::ImageRecord;
use crate::command::Command;
use crate::keys::Bindings;
use crate::loader::Decoder;
use crate::navigator::{Flow, NavOptions, Navigator};
use crate::preload::Preloader;
use crate::viewport::Point;

use self::display::WindowDisplay;

pub mod display;
pub mod render;

#[derive(Debug, Clone, Copy)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

/// Everything needed to build the navigator once a window exists.
pub struct Session {
    pub images: Vec<Arc<ImageRecord>>,
    pub decoder: Arc<dyn Decoder>,
    pub preloader: Arc<Preloader>,
    pub options: NavOptions,
}

struct Drag {
    origin: Point,
    start: Point,
}

// ---------------------------------------------------------------------------
// Application handler (winit 0.30 style)
// ---------------------------------------------------------------------------

pub struct App {
    config: WindowConfig,
    bindings: Bindings,
    session: Option<Session>,
    nav: Option<Navigator<WindowDisplay, Arc<Preloader>>>,
    cursor: Point,
    drag: Option<Drag>,
    failed: bool,
}

impl App {
    pub fn new(config: WindowConfig, bindings: Bindings, session: Session) -> Self {
        Self {
            config,
            bindings,
            session: Some(session),
            nav: None,
            cursor: Point::ZERO,
            drag: None,
            failed: false,
        }
    }

    /// True if the loop stopped because of an error rather than a quit.
    pub fn failed(&self) -> bool {
        self.failed
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, msg: impl std::fmt::Display) {
        log::error!("{}", msg);
        self.failed = true;
        event_loop.exit();
    }

    fn dispatch(&mut self, event_loop: &ActiveEventLoop, cmd: Command) {
        let Some(nav) = self.nav.as_mut() else {
            return;
        };
        match nav.handle(cmd) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => event_loop.exit(),
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn create_window(&self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>, String> {
        let mut attrs = Window::default_attributes()
            .with_title("vimg")
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        if self.config.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = event_loop
            .create_window(attrs)
            .map_err(|e| format!("Failed to create window: {}", e))?;
        Ok(Arc::new(window))
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.nav.is_some() {
            return;
        }
        let Some(session) = self.session.take() else {
            return;
        };
        let window = match self.create_window(event_loop) {
            Ok(window) => window,
            Err(e) => return self.fail(event_loop, e),
        };
        let display = match WindowDisplay::new(window) {
            Ok(display) => display,
            Err(e) => return self.fail(event_loop, format!("Failed to create surface: {}", e)),
        };

        let mut nav = Navigator::new(
            session.images,
            session.decoder,
            session.preloader,
            display,
            session.options,
        );
        if let Err(e) = nav.start() {
            return self.fail(event_loop, e);
        }
        self.nav = Some(nav);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.dispatch(event_loop, Command::Quit),

            WindowEvent::Resized(_) => {
                if let Some(nav) = self.nav.as_ref() {
                    nav.screen().window().request_redraw();
                }
            }

            WindowEvent::RedrawRequested => self.dispatch(event_loop, Command::PanOrigin),

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                match self.bindings.lookup(&event.logical_key) {
                    Some(cmd) => {
                        let cmd = cmd.clone();
                        self.dispatch(event_loop, cmd);
                    }
                    None => log::trace!("Unbound key {:?}", event.logical_key),
                }
            }

            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                if state == ElementState::Pressed {
                    self.dispatch(event_loop, Command::PanOrigin);
                    if let Some(nav) = self.nav.as_ref() {
                        self.drag = Some(Drag {
                            origin: nav.origin(),
                            start: self.cursor,
                        });
                    }
                } else {
                    self.drag = None;
                }
            }

            WindowEvent::CursorMoved {
                position: PhysicalPosition { x, y },
                ..
            } => {
                self.cursor = Point::new(x as i32, y as i32);
                if let Some(drag) = &self.drag {
                    // dragging right reveals the left side of the image
                    let target = drag.origin + (drag.start - self.cursor);
                    self.dispatch(event_loop, Command::PanTo(target));
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
    }
}
