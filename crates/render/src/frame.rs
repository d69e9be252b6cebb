use crate::RenderError;
use crate::align::{AlignOutcome, PixelGridAligner};
use crate::camera::OrthoCamera;
use crate::config::PixelationConfig;
use crate::pipeline::{FrameContext, PixelPipeline};
use pixelgrid_common::{BlockGrid, ObjectId, Viewport};
use pixelgrid_kernel::{Animate, Clock, Scene, Showcase};

/// Frame loop state. The only transition is Idle -> Running, taken when the
/// presentation surface becomes ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub frame: u64,
    pub elapsed: f64,
    pub grid: BlockGrid,
    pub alignment: AlignOutcome,
}

/// Owns the camera, config, scene and animations, and sequences each frame:
/// resize, clock, animate, align, render.
pub struct FrameOrchestrator<C> {
    state: LoopState,
    clock: C,
    camera: OrthoCamera,
    config: PixelationConfig,
    scene: Scene,
    animations: Vec<(ObjectId, Box<dyn Animate>)>,
    aligner: PixelGridAligner,
    viewport: Viewport,
    pending_resize: Option<Viewport>,
    frame: u64,
}

impl<C: Clock> FrameOrchestrator<C> {
    pub fn new(clock: C, scene: Scene, camera: OrthoCamera, config: PixelationConfig) -> Self {
        Self {
            state: LoopState::Idle,
            clock,
            camera,
            config: config.sanitized(),
            scene,
            animations: Vec::new(),
            aligner: PixelGridAligner::new(),
            viewport: Viewport::default(),
            pending_resize: None,
            frame: 0,
        }
    }

    /// The demo scene with its animated crystal and the default camera.
    pub fn showcase(clock: C, config: PixelationConfig) -> Self {
        let Showcase {
            scene,
            crystal,
            motion,
        } = Showcase::build();
        let mut orchestrator = Self::new(clock, scene, OrthoCamera::showcase(1.0), config);
        orchestrator.animate(crystal, Box::new(motion));
        orchestrator
    }

    /// Drive an object with an animation each tick.
    pub fn animate(&mut self, id: ObjectId, animation: Box<dyn Animate>) {
        self.animations.push((id, animation));
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// The presentation surface is ready at the given size. Enters Running.
    pub fn surface_ready(&mut self, viewport: Viewport) {
        if self.state == LoopState::Idle {
            tracing::info!(
                width = viewport.width,
                height = viewport.height,
                "surface ready, frame loop running"
            );
        }
        self.state = LoopState::Running;
        self.pending_resize = Some(viewport);
    }

    /// Queue a resize. It is applied at the start of the next tick; later
    /// requests replace earlier ones.
    pub fn request_resize(&mut self, viewport: Viewport) {
        self.pending_resize = Some(viewport);
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// The block grid the next frame will use.
    pub fn grid(&self) -> BlockGrid {
        BlockGrid::for_viewport(self.viewport, self.config.pixel_block_size)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn camera(&self) -> &OrthoCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrthoCamera {
        &mut self.camera
    }

    pub fn config(&self) -> &PixelationConfig {
        &self.config
    }

    /// Live config. Edits are sampled at the next tick.
    pub fn config_mut(&mut self) -> &mut PixelationConfig {
        &mut self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Run one frame through `pipeline`.
    ///
    /// A failed frame is not presented. A failed resize stays queued so the
    /// next tick tries again.
    pub fn tick(&mut self, pipeline: &mut impl PixelPipeline) -> Result<TickReport, RenderError> {
        if self.state != LoopState::Running {
            return Err(RenderError::NotRunning);
        }
        let span = tracing::trace_span!("frame", frame = self.frame);
        let _enter = span.enter();

        if let Some(viewport) = self.pending_resize {
            pipeline.resize(viewport)?;
            self.viewport = viewport;
            self.camera.set_symmetric(viewport.aspect_ratio());
            self.pending_resize = None;
        }

        let elapsed = self.clock.elapsed_secs();
        for (id, animation) in &self.animations {
            if let Some(object) = self.scene.get_mut(*id) {
                animation.apply(elapsed, object);
            }
        }

        self.config.sanitize();
        let grid = self.grid();
        let alignment = self.aligner.update(
            &mut self.camera,
            self.viewport.aspect_ratio(),
            grid,
            self.config.pixel_aligned_panning,
        );

        let ctx = FrameContext {
            frame: self.frame,
            elapsed,
            viewport: self.viewport,
            grid,
            config: &self.config,
            scene: &self.scene,
            camera: &self.camera,
        };
        pipeline.render(&ctx)?;

        let report = TickReport {
            frame: self.frame,
            elapsed,
            grid,
            alignment,
        };
        self.frame += 1;
        Ok(report)
    }
}
