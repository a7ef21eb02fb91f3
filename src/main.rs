// =============================================================================
// DISC RENDERER - Frames in flight with streamed instance data
// =============================================================================
//
// Draws a bouncing disc with Vulkan. The disc mesh is uploaded once; the
// ball's {x, y, radius} record is streamed through a staging buffer every
// frame while up to N earlier frames are still executing on the GPU.
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  winit event loop (App)                                         │
// │    └── BouncingBall: one InstanceRecord per frame               │
// │          └── FrameRing: slot cycling, upload protocol           │
// │                └── VulkanFrames: swapchain, pipeline, buffers   │
// │                      └── VulkanDevice: instance, queue, memory  │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW (slot s):
// 1. Wait for slot s's fence, reset it
// 2. Acquire swapchain image
// 3. Stage the ball record, record copy + barrier
// 4. Record render pass and instanced draw
// 5. Submit, then present
// 6. Advance the ball, s = (s + 1) % N
//
// =============================================================================

mod backend;
mod ball;
mod config;
mod frame;
mod geometry;

use anyhow::{Context, Result};
use backend::{SwapchainOutOfDate, VulkanDevice, VulkanFrames};
use ball::BouncingBall;
use config::Config;
use frame::FrameRing;
use geometry::GeometryAsset;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml; the outcome is logged below
    let (config, source) = Config::load();

    init_logging(&config);
    log::info!("Starting disc renderer");
    source.log();
    log::debug!("Config: {:?}", config);
    log::info!(
        "Window: {}x{}, {} frames in flight",
        config.window.width,
        config.window.height,
        config.graphics.frames_in_flight
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.fatal_error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// RUST_LOG overrides the level from config.toml
fn init_logging(config: &Config) {
    env_logger::Builder::new()
        .filter_level(config.log_level())
        .parse_default_env()
        .init();
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: Field order matters for Drop! The frame ring (and with it
/// every Vulkan object) must go before the window its surface belongs to.
struct App {
    config: Config,

    // ─────────────────────────────────────────────────────────────────────────
    // RENDERING
    // ─────────────────────────────────────────────────────────────────────────
    engine: Option<FrameRing<VulkanFrames>>,
    gpu_name: String,
    window: Option<Window>,

    // ─────────────────────────────────────────────────────────────────────────
    // SIMULATION
    // ─────────────────────────────────────────────────────────────────────────
    ball: BouncingBall,
    last_update: Instant,

    // ─────────────────────────────────────────────────────────────────────────
    // PERFORMANCE TRACKING
    // ─────────────────────────────────────────────────────────────────────────
    frame_count: u32,
    last_fps_update: Instant,

    /// First unrecoverable error, returned from main
    fatal_error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        let ball = BouncingBall::new(&config.ball);
        let now = Instant::now();

        Self {
            config,
            engine: None,
            gpu_name: String::new(),
            window: None,
            ball,
            last_update: now,
            frame_count: 0,
            last_fps_update: now,
            fatal_error: None,
        }
    }

    // =========================================================================
    // VULKAN INITIALIZATION
    // =========================================================================

    fn init_vulkan(&mut self, window: &Window) -> Result<()> {
        // Validation only in debug builds
        let validation = self.config.debug.validation_layers && cfg!(debug_assertions);
        let device = VulkanDevice::new(
            &self.config.window.title,
            validation,
            window.raw_display_handle(),
            window.raw_window_handle(),
        )?;
        self.gpu_name = device.name();

        let frames = VulkanFrames::new(device, &self.config)?;
        let ring = FrameRing::new(frames, &GeometryAsset::disc())
            .context("Failed to upload disc geometry")?;

        self.engine = Some(ring);
        Ok(())
    }

    // =========================================================================
    // MAIN RENDER LOOP
    // =========================================================================

    /// Draw the ball where it is now, then move it
    fn render_frame(&mut self) -> Result<()> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };

        engine.render_one_cycle(&[self.ball.record()])?;

        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        self.ball.update(dt);

        Ok(())
    }

    /// Wait for in-flight frames, then stop the loop
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(engine) = self.engine.as_mut() {
            if let Err(e) = engine.drain() {
                log::error!("Failed to drain frames: {:?}", e);
            }
        }
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        if error.downcast_ref::<SwapchainOutOfDate>().is_some() {
            log::error!("Surface no longer matches the swapchain; rebuilding it is not supported");
        }
        log::error!("{:?}", error);
        if self.fatal_error.is_none() {
            self.fatal_error = Some(error);
        }
        self.shutdown(event_loop);
    }

    // =========================================================================
    // FPS TRACKING
    // =========================================================================

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        self.frame_count += 1;
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();

        // Update title every second
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;

            if let Some(ref window) = self.window {
                window.set_title(&format!(
                    "{} - {:.0} FPS [{}]",
                    self.config.window.title, fps, self.gpu_name
                ));
            }

            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        // Fixed size: the swapchain is never rebuilt
        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(false);

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => w,
            Err(e) => {
                self.fail(event_loop, anyhow::Error::new(e).context("Failed to create window"));
                return;
            }
        };

        if let Err(e) = self.init_vulkan(&window) {
            self.window = Some(window);
            self.fail(event_loop, e.context("Failed to initialize Vulkan"));
            return;
        }

        self.last_update = Instant::now();
        self.window = Some(window);
    }

    /// Handle window events.
    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown(event_loop);
            }

            WindowEvent::RedrawRequested => match self.render_frame() {
                Ok(()) => self.update_fps(),
                Err(e) => self.fail(event_loop, e.context("Render error")),
            },

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    self.shutdown(event_loop);
                }
            }

            _ => {}
        }
    }

    /// Request continuous redraws; present mode paces the loop.
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if event_loop.exiting() {
            return;
        }
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    /// Release GPU resources while the window still exists
    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(engine) = self.engine.take() {
            let frames = engine.cycles();
            drop(engine);
            log::info!("Released Vulkan resources after {} frames", frames);
        }
    }
}
