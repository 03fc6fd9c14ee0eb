use std::sync::Arc;

use anyhow::{Context, Result};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use tracing::{info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use switchex_core::Phase;
use switchex_experiment::{Experiment, ExperimentConfig, Flow, InputEvent};
use switchex_render::SkiaRenderer;
use switchex_render::layout::{self, HEIGHT, WIDTH};
use switchex_timing::MonotonicClock;

/// Desktop shell: owns the window, the surface, and the redraw-driven tick
/// loop, and maps raw winit events onto the experiment's input boundary.
pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    experiment: Experiment<MonotonicClock, ThreadRng>,
    cursor: (f32, f32),
    fatal: Option<anyhow::Error>,
    should_exit: bool,
}

impl App {
    pub fn new() -> Result<Self> {
        let config = ExperimentConfig::default();
        let experiment = Experiment::new(config, MonotonicClock::new(), rand::rng());

        Ok(Self {
            window: None,
            pixels: None,
            renderer: None,
            experiment,
            cursor: (0.0, 0.0),
            fatal: None,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.run_app(&mut self)?;

        match self.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title("Task Switching Experiment")
            .with_inner_size(LogicalSize::new(WIDTH as f64, HEIGHT as f64))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();

        // The canvas stays at its fixed logical size; the surface scales it.
        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(WIDTH, HEIGHT, surface_texture)?);
        self.renderer = Some(SkiaRenderer::new()?);

        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let pixels = self.pixels.as_mut().context("surface not ready")?;
        let renderer = self.renderer.as_mut().context("renderer not ready")?;

        let snapshot = self.experiment.snapshot();
        renderer.render_frame(&snapshot, pixels.frame_mut())?;
        pixels.render().context("surface present failed")?;
        Ok(())
    }

    /// Route one mapped input event; persistence failures are fatal.
    fn dispatch(&mut self, event: InputEvent, event_loop: &ActiveEventLoop) {
        match self.experiment.handle_input(event) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => self.cleanup_and_exit(event_loop),
            Err(err) => {
                self.fatal = Some(err.into());
                event_loop.exit();
            }
        }
    }

    fn handle_click(&mut self, event_loop: &ActiveEventLoop) {
        // The start/tutorial controls only exist on the start screen.
        if self.experiment.phase() != Phase::Start {
            return;
        }
        let Some(pixels) = &self.pixels else {
            return;
        };
        let Ok((px, py)) = pixels.window_pos_to_pixel(self.cursor) else {
            return;
        };
        let (x, y) = (px as f32, py as f32);

        if layout::hit(layout::start_button(), x, y) {
            self.dispatch(InputEvent::StartExperiment, event_loop);
        } else if layout::hit(layout::tutorial_button(), x, y) {
            self.dispatch(InputEvent::OpenTutorial, event_loop);
        }
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        info!(
            trials = self.experiment.trials_completed(),
            "session ended"
        );
        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(err) = self.create_window_and_surface(event_loop) {
                self.fatal = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                self.experiment.tick();
                if let Err(err) = self.render() {
                    self.fatal = Some(err);
                    event_loop.exit();
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed() && !event.repeat =>
            {
                if let Some(input) = map_key(&event.logical_key) {
                    self.dispatch(input, event_loop);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.handle_click(event_loop),
            WindowEvent::Resized(new_size) => {
                if let Some(pixels) = &mut self.pixels {
                    if let Err(err) = pixels.resize_surface(new_size.width, new_size.height) {
                        warn!(%err, "failed to resize surface");
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}

fn map_key(key: &Key) -> Option<InputEvent> {
    match key {
        Key::Named(NamedKey::Enter) => Some(InputEvent::Submit),
        Key::Named(NamedKey::Backspace) => Some(InputEvent::Backspace),
        Key::Named(NamedKey::Space) => Some(InputEvent::Continue),
        Key::Named(NamedKey::Escape) => Some(InputEvent::Quit),
        Key::Character(text) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_digit() => Some(InputEvent::Digit(c as u8 - b'0')),
                _ => None,
            }
        }
        _ => None,
    }
}
