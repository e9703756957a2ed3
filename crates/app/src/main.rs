//! Orrery: an interactive solar system.
//!
//! Planets orbit the sun, a keyboard-flown spaceship roams between them and
//! the camera switches between overview, orbit, chase and cockpit views.
//! Hovering a planet highlights it; clicking it spins it faster for a while.

mod assets;
mod controls;
mod world;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use orrery_core::{Config, Timer};
use orrery_platform::{InputState, MouseButton, Window};
use orrery_renderer::Renderer;
use orrery_scene::SystemDescriptor;

use crate::world::World;

const CONFIG_ENV: &str = "ORRERY_CONFIG";
const DEFAULT_CONFIG: &str = "orrery.json";
/// Pixel scroll distance treated as one wheel line.
const PIXELS_PER_LINE: f32 = 40.0;

struct App {
    config: Config,
    descriptor: SystemDescriptor,
    // Dropped before the window whose surface it renders to.
    renderer: Option<Renderer>,
    world: Option<World>,
    window: Option<Window>,
    input: InputState,
    timer: Timer,
}

impl App {
    fn new(config: Config, descriptor: SystemDescriptor) -> Self {
        Self {
            config,
            descriptor,
            renderer: None,
            world: None,
            window: None,
            input: InputState::new(),
            timer: Timer::new(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window =
            Window::new(event_loop, &self.config.window).context("creating window")?;
        let mut renderer =
            Renderer::new(&window, &self.config).context("creating renderer")?;
        let assets = assets::upload(&mut renderer, &self.config, &self.descriptor)?;
        let world = World::new(
            &self.config,
            &self.descriptor,
            &assets,
            window.aspect_ratio(),
        )
        .context("building scene")?;

        self.renderer = Some(renderer);
        self.world = Some(world);
        self.window = Some(window);
        self.timer.reset();
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let dt = self.timer.delta_secs();
        let (Some(window), Some(world)) = (&self.window, &mut self.world) else {
            return;
        };

        if self.config.window.escape_closes && controls::quit_requested(&self.input) {
            info!("Escape pressed, shutting down");
            event_loop.exit();
            return;
        }

        if let Err(e) = world.update(&self.input, window.viewport_size(), dt) {
            error!("Scene update failed: {e}");
            event_loop.exit();
            return;
        }

        if !window.is_minimized()
            && let Some(renderer) = self.renderer.as_mut()
            && let Err(e) = renderer.render_frame(&world.frame_scene())
        {
            error!("Render error: {:?}", e);
        }

        self.input.begin_frame();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(()) => info!("Initialization complete, entering main loop"),
            Err(e) => {
                error!("Startup failed: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                info!("Window resized to {}x{}", size.width, size.height);
                if let Some(ref mut window) = self.window {
                    window.resize(size.width, size.height);
                    if let Some(ref mut world) = self.world
                        && !window.is_minimized()
                    {
                        world.set_aspect(window.aspect_ratio());
                    }
                }
                if let Some(ref mut renderer) = self.renderer {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .on_mouse_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::CursorEntered { .. } => self.input.on_cursor_entered(),
            WindowEvent::CursorLeft { .. } => self.input.on_cursor_left(),
            WindowEvent::MouseInput { state, button, .. } => {
                let button = MouseButton::from(button);
                match state {
                    ElementState::Pressed => self.input.on_mouse_pressed(button),
                    ElementState::Released => self.input.on_mouse_released(button),
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let (dx, dy) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (x, y),
                    MouseScrollDelta::PixelDelta(p) => (
                        p.x as f32 / PIXELS_PER_LINE,
                        p.y as f32 / PIXELS_PER_LINE,
                    ),
                };
                self.input.on_scroll(dx, dy);
            }
            WindowEvent::Focused(false) => self.input.release_all(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

fn load_descriptor(config: &Config) -> SystemDescriptor {
    let Some(path) = &config.system.descriptor else {
        return SystemDescriptor::default();
    };
    match SystemDescriptor::load(path) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            warn!("Ignoring system file {}: {e}", path.display());
            SystemDescriptor::default()
        }
    }
}

fn main() -> Result<()> {
    orrery_core::init_logging();
    info!("Starting Orrery");

    let config = Config::load_or_default(config_path());
    let descriptor = load_descriptor(&config);
    info!(
        "System: {} with {} planets",
        descriptor.sun.name,
        descriptor.planets.len()
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, descriptor);
    event_loop.run_app(&mut app)?;

    Ok(())
}
