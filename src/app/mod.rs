use crate::camera::FlyCamera;
use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::environment::{self, EnvironmentMaps};
use crate::frame::{FrameInputs, FrameRenderer, FrameTargets};
use crate::input::{Input, InputEvent, DEFAULT_INPUT_CONFIG_PATH};
use crate::renderer::{RenderContext, WindowSurface};
use crate::scene::Scene;
use crate::textures::ResidentTextureSet;
use crate::time::FrameClock;

use anyhow::{Context, Result};
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};

pub async fn run() -> Result<()> {
    let config = AppConfig::load_or_default(DEFAULT_CONFIG_PATH);
    run_with_config(config)
}

pub fn run_with_config(config: AppConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create winit event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = App::new(config);
    event_loop.run_app(&mut app).context("Event loop execution failed")?;
    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Everything that only exists once the window and device are up.
struct Viewer {
    ctx: RenderContext,
    maps: EnvironmentMaps,
    textures: ResidentTextureSet,
    scene: Scene,
    frame: FrameRenderer,
}

impl Viewer {
    fn build(surface: &WindowSurface, config: &AppConfig) -> Result<Self> {
        let ctx = surface.create_render_context(config.scene.sphere_segments)?;
        let started = Instant::now();
        let maps = environment::bake(&ctx, &config.environment).context("Environment bake failed")?;
        if maps.is_degraded() {
            log::warn!(target: "app", "Environment source missing; lighting falls back to black");
        }
        let mut textures = ResidentTextureSet::new(&ctx).context("Material textures unavailable")?;
        let scene = Scene::load(&ctx, &mut textures, &config.scene);
        let frame = FrameRenderer::new(
            &ctx,
            &maps,
            &textures,
            &config.scene,
            surface.surface_format()?,
            surface.sample_count(),
        );
        log::info!(
            target: "app",
            "Setup finished in {:.2?}: {} objects, {} resident textures",
            started.elapsed(),
            scene.objects().len(),
            textures.len()
        );
        Ok(Self { ctx, maps, textures, scene, frame })
    }
}

pub struct App {
    config: AppConfig,
    surface: WindowSurface,
    viewer: Option<Viewer>,
    camera: FlyCamera,
    input: Input,
    clock: FrameClock,
    should_close: bool,
    fatal: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let surface = WindowSurface::new(&config.window);
        let camera = FlyCamera::from_config(&config.camera);
        Self {
            config,
            surface,
            viewer: None,
            camera,
            input: Input::from_config(DEFAULT_INPUT_CONFIG_PATH),
            clock: FrameClock::new(),
            should_close: false,
            fatal: None,
        }
    }

    fn initialize(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        self.surface.ensure_window(event_loop)?;
        if self.viewer.is_none() {
            self.viewer = Some(Viewer::build(&self.surface, &self.config)?);
            self.clock = FrameClock::new();
        }
        Ok(())
    }

    fn render_frame(&mut self) -> Result<()> {
        let Some(viewer) = self.viewer.as_mut() else {
            return Ok(());
        };
        let size = self.surface.size();
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        let dt = self.clock.tick();
        self.camera.update(&mut self.input, dt);

        let frame = self.surface.acquire_surface_frame()?;
        let depth = self.surface.depth_view()?;
        let targets = match self.surface.msaa_view() {
            Some(msaa) => FrameTargets { color: msaa, resolve: Some(frame.view()), depth },
            None => FrameTargets { color: frame.view(), resolve: None, depth },
        };
        let inputs = FrameInputs {
            camera: &self.camera,
            aspect_ratio: self.surface.aspect_ratio(),
            elapsed: self.clock.elapsed_seconds(),
        };
        let stats = viewer.frame.render(&viewer.ctx, &targets, &viewer.scene, &viewer.textures, &inputs);
        if self.clock.frame_count() == 1 {
            log::debug!(
                target: "app",
                "First frame: {} draws over {} submissions, prefilter levels {}",
                stats.draws,
                stats.submissions,
                viewer.maps.prefilter_mip_levels()
            );
        }
        if let Some(window) = self.surface.window() {
            window.pre_present_notify();
        }
        frame.present();
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.initialize(event_loop) {
            log::error!(target: "app", "Initialization failed: {err:?}");
            self.fatal = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: winit::window::WindowId, event: WindowEvent) {
        self.input.push(InputEvent::from_window_event(&event));
        match event {
            WindowEvent::CloseRequested => self.should_close = true,
            WindowEvent::Resized(size) => self.surface.resize(size),
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.render_frame() {
                    log::warn!(target: "app", "Frame skipped: {err:?}");
                }
            }
            _ => {}
        }
        if self.should_close || self.input.quit_requested() {
            event_loop.exit();
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: winit::event::DeviceId, event: DeviceEvent) {
        self.input.push(InputEvent::from_device_event(&event));
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_close || self.input.quit_requested() {
            event_loop.exit();
            return;
        }
        if let Some(window) = self.surface.window() {
            window.request_redraw();
        }
    }
}
