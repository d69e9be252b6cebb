use anyhow::{Context, Result, anyhow};
use clap::Parser;
use egui::Context as EguiContext;
use glam::Vec3;
use pixelgrid_common::Viewport;
use pixelgrid_input::{Action, OrbitControls};
use pixelgrid_kernel::MonotonicClock;
use pixelgrid_render::{
    AlignOutcome, BLOCK_SIZE_RANGE, DEPTH_EDGE_RANGE, EDGE_STRENGTH_STEP, FrameContext,
    FrameOrchestrator, NORMAL_EDGE_RANGE, PixelPipeline, PixelationConfig, RenderError,
    TickReport,
};
use pixelgrid_render_wgpu::PixelRenderer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "pixelgrid-desktop", about = "Pixel-art diorama viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Pixelation settings (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the pixel block size
    #[arg(long)]
    block_size: Option<u32>,

    /// Initial window width
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Initial window height
    #[arg(long, default_value_t = 720)]
    height: u32,
}

/// Scroll pixels per wheel line on touchpads.
const PIXELS_PER_LINE: f32 = 50.0;

/// Pointer drag state.
#[derive(Default)]
struct Pointer {
    orbiting: bool,
    panning: bool,
    last: Option<PhysicalPosition<f64>>,
}

impl Pointer {
    fn moved(&mut self, position: PhysicalPosition<f64>) -> Action {
        let last = self.last.replace(position);
        let Some(last) = last else {
            return Action::Noop;
        };
        let dx = (position.x - last.x) as f32;
        let dy = (position.y - last.y) as f32;
        if self.orbiting {
            Action::Orbit { dx, dy }
        } else if self.panning {
            Action::Pan { dx, dy }
        } else {
            Action::Noop
        }
    }
}

/// Application state.
struct AppState {
    orchestrator: FrameOrchestrator<MonotonicClock>,
    controls: OrbitControls,
    pointer: Pointer,
    show_panel: bool,
    last_report: Option<TickReport>,
}

impl AppState {
    fn new(config: PixelationConfig) -> Self {
        let orchestrator = FrameOrchestrator::showcase(MonotonicClock::new(), config);
        let controls = OrbitControls::new(orchestrator.camera(), Vec3::ZERO);
        Self {
            orchestrator,
            controls,
            pointer: Pointer::default(),
            show_panel: true,
            last_report: None,
        }
    }

    fn apply(&mut self, action: Action) {
        if action == Action::TogglePanel {
            self.show_panel = !self.show_panel;
            return;
        }
        if !action.moves_camera() {
            return;
        }
        let viewport = self.orchestrator.viewport();
        self.controls
            .apply(action, self.orchestrator.camera_mut(), viewport);
    }

    fn handle_key(&mut self, key: KeyCode, event_loop: &ActiveEventLoop) {
        match key {
            KeyCode::F1 => self.apply(Action::TogglePanel),
            KeyCode::KeyR => self.apply(Action::Reset),
            KeyCode::Escape => event_loop.exit(),
            _ => {}
        }
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        if !self.show_panel {
            return;
        }
        let report = self.last_report;
        let zoom = self.orchestrator.camera().zoom;
        egui::SidePanel::right("pixelation")
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.heading("Pixelation");
                ui.separator();
                let config = self.orchestrator.config_mut();
                ui.add(
                    egui::Slider::new(&mut config.pixel_block_size, BLOCK_SIZE_RANGE)
                        .text("Pixel size"),
                );
                ui.add(
                    egui::Slider::new(&mut config.normal_edge_strength, NORMAL_EDGE_RANGE)
                        .step_by(EDGE_STRENGTH_STEP)
                        .text("Normal edge"),
                );
                ui.add(
                    egui::Slider::new(&mut config.depth_edge_strength, DEPTH_EDGE_RANGE)
                        .step_by(EDGE_STRENGTH_STEP)
                        .text("Depth edge"),
                );
                ui.checkbox(&mut config.pixel_aligned_panning, "Pixel-aligned panning");

                ui.separator();
                if let Some(report) = report {
                    ui.label(format!(
                        "Grid: {} x {} blocks",
                        report.grid.columns, report.grid.rows
                    ));
                    ui.label(format!("Frame: {}", report.frame));
                    let alignment = match report.alignment {
                        AlignOutcome::Aligned { fract_x, fract_y } => {
                            format!("aligned ({fract_x:+.2}, {fract_y:+.2})")
                        }
                        AlignOutcome::Reset => "reset".into(),
                        AlignOutcome::Unchanged => "unaligned".into(),
                        AlignOutcome::Skipped => "skipped (viewport too small)".into(),
                    };
                    ui.label(format!("Alignment: {alignment}"));
                }
                ui.label(format!("Zoom: {zoom:.2}"));
                ui.separator();
                ui.small("LMB: Orbit | RMB: Pan | Wheel: Zoom | R: Reset | F1: Panel");
            });
    }
}

/// egui output waiting to be drawn over the pixelated frame.
struct Overlay {
    paint_jobs: Vec<egui::ClippedPrimitive>,
    pixels_per_point: f32,
}

struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: PixelRenderer,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Gpu {
    fn new(
        event_loop: &ActiveEventLoop,
        egui_ctx: &EguiContext,
        size: PhysicalSize<u32>,
        block_size: u32,
    ) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("Pixelgrid")
            .with_inner_size(size);
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow!("no compatible GPU adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("pixelgrid_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("create device")?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = PixelRenderer::new(
            &device,
            surface_format,
            Viewport::new(config.width, config.height),
            block_size,
        )?;
        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        tracing::info!(
            format = ?surface_format,
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            renderer,
            egui_winit,
            egui_renderer,
        })
    }
}

/// One frame's view of the GPU: the pixel passes plus the egui overlay,
/// presented to the window surface.
struct SurfaceFrame<'a> {
    gpu: &'a mut Gpu,
    overlay: Overlay,
}

impl PixelPipeline for SurfaceFrame<'_> {
    fn resize(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        let gpu = &mut *self.gpu;
        gpu.renderer.resize(&gpu.device, viewport)?;
        gpu.config.width = viewport.width.max(1);
        gpu.config.height = viewport.height.max(1);
        gpu.surface.configure(&gpu.device, &gpu.config);
        Ok(())
    }

    fn render(&mut self, ctx: &FrameContext<'_>) -> Result<(), RenderError> {
        let gpu = &mut *self.gpu;
        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return Err(RenderError::Surface(e.to_string()));
            }
            Err(e) => return Err(RenderError::Surface(e.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        gpu.renderer
            .encode(&gpu.device, &gpu.queue, &mut encoder, &view, ctx)?;

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.config.width, gpu.config.height],
            pixels_per_point: self.overlay.pixels_per_point,
        };
        gpu.egui_renderer.update_buffers(
            &gpu.device,
            &gpu.queue,
            &mut encoder,
            &self.overlay.paint_jobs,
            &screen_descriptor,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            gpu.egui_renderer
                .render(&mut pass, &self.overlay.paint_jobs, &screen_descriptor);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

struct GpuApp {
    state: AppState,
    initial_size: PhysicalSize<u32>,
    gpu: Option<Gpu>,
    egui_ctx: EguiContext,
}

impl GpuApp {
    fn new(config: PixelationConfig, initial_size: PhysicalSize<u32>) -> Self {
        Self {
            state: AppState::new(config),
            initial_size,
            gpu: None,
            egui_ctx: EguiContext::default(),
        }
    }

    fn redraw(&mut self) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        let size = gpu.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return;
        }

        let raw_input = gpu.egui_winit.take_egui_input(&gpu.window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            self.state.draw_ui(ctx);
        });
        gpu.egui_winit
            .handle_platform_output(&gpu.window, full_output.platform_output);
        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        // Textures are updated outside the tick so a skipped frame cannot lose
        // a font atlas upload.
        for (id, image_delta) in &full_output.textures_delta.set {
            gpu.egui_renderer
                .update_texture(&gpu.device, &gpu.queue, *id, image_delta);
        }

        let mut frame = SurfaceFrame {
            gpu,
            overlay: Overlay {
                paint_jobs,
                pixels_per_point: full_output.pixels_per_point,
            },
        };
        match self.state.orchestrator.tick(&mut frame) {
            Ok(report) => self.state.last_report = Some(report),
            Err(e) => tracing::error!("frame not presented: {e}"),
        }

        for id in &full_output.textures_delta.free {
            frame.gpu.egui_renderer.free_texture(id);
        }
        frame.gpu.window.request_redraw();
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        let block_size = self.state.orchestrator.config().pixel_block_size;
        match Gpu::new(event_loop, &self.egui_ctx, self.initial_size, block_size) {
            Ok(gpu) => {
                let size = gpu.window.inner_size();
                self.state
                    .orchestrator
                    .surface_ready(Viewport::new(size.width, size.height));
                self.gpu = Some(gpu);
            }
            Err(e) => {
                tracing::error!("failed to initialize GPU: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(gpu) = &mut self.gpu {
            let response = gpu.egui_winit.on_window_event(&gpu.window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.state
                    .orchestrator
                    .request_resize(Viewport::new(new_size.width, new_size.height));
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                self.state.handle_key(key, event_loop);
            }
            WindowEvent::MouseInput {
                button,
                state: btn_state,
                ..
            } => {
                let pressed = btn_state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.state.pointer.orbiting = pressed,
                    MouseButton::Right => self.state.pointer.panning = pressed,
                    _ => {}
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let action = self.state.pointer.moved(position);
                self.state.apply(action);
            }
            WindowEvent::CursorLeft { .. } => {
                self.state.pointer.last = None;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_LINE,
                };
                self.state.apply(Action::Zoom(steps));
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn load_config(cli: &Cli) -> Result<PixelationConfig> {
    let mut config = match &cli.config {
        Some(path) => PixelationConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => PixelationConfig::default(),
    };
    if let Some(block_size) = cli.block_size {
        config.pixel_block_size = block_size;
    }
    for issue in config.validate() {
        tracing::warn!("{issue}; clamping");
    }
    Ok(config.sanitized())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("pixelgrid-desktop starting");

    let config = load_config(&cli)?;
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(config, PhysicalSize::new(cli.width, cli.height));
    event_loop.run_app(&mut app)?;

    Ok(())
}
