use crate::RenderError;
use crate::buffers::{FrameBuffers, PresentedImage};
use crate::camera::OrthoCamera;
use crate::config::PixelationConfig;
use crate::pixelate::PixelatePass;
use crate::software::SceneRasterizer;
use pixelgrid_common::{BlockGrid, Viewport};
use pixelgrid_kernel::Scene;

/// Everything one frame needs, passed down by reference from the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub frame: u64,
    pub elapsed: f64,
    pub viewport: Viewport,
    pub grid: BlockGrid,
    pub config: &'a PixelationConfig,
    pub scene: &'a Scene,
    pub camera: &'a OrthoCamera,
}

/// Accepts finished frames. Called at most once per tick.
pub trait Presenter {
    fn present(&mut self, image: &PresentedImage) -> Result<(), RenderError>;
}

/// Full render path: scene pass, pixelate pass, output resolve and present.
pub trait PixelPipeline {
    /// Resize intermediate targets. Runs between ticks, never during one.
    fn resize(&mut self, viewport: Viewport) -> Result<(), RenderError>;

    /// Render the frame described by `ctx` and hand it to the presentation
    /// surface.
    fn render(&mut self, ctx: &FrameContext<'_>) -> Result<(), RenderError>;
}

/// CPU implementation of [`PixelPipeline`].
pub struct CpuPipeline<R, P> {
    rasterizer: R,
    presenter: P,
    buffers: FrameBuffers,
    pixelate: PixelatePass,
    image: PresentedImage,
    block_size: u32,
}

impl<R: SceneRasterizer, P: Presenter> CpuPipeline<R, P> {
    pub fn new(rasterizer: R, presenter: P) -> Self {
        Self::with_pass(rasterizer, presenter, PixelatePass::default())
    }

    /// Use a pixelate pass with a custom size limit.
    pub fn with_pass(rasterizer: R, presenter: P, pixelate: PixelatePass) -> Self {
        Self {
            rasterizer,
            presenter,
            buffers: FrameBuffers::default(),
            pixelate,
            image: PresentedImage::default(),
            block_size: 1,
        }
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn pixelate(&self) -> &PixelatePass {
        &self.pixelate
    }

    /// The last resolved frame.
    pub fn image(&self) -> &PresentedImage {
        &self.image
    }
}

impl<R: SceneRasterizer, P: Presenter> PixelPipeline for CpuPipeline<R, P> {
    fn resize(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        self.pixelate.ensure_targets(viewport, self.block_size)?;
        self.buffers.resize(viewport);
        self.image.resize(viewport);
        Ok(())
    }

    fn render(&mut self, ctx: &FrameContext<'_>) -> Result<(), RenderError> {
        self.block_size = ctx.grid.block_size;
        self.pixelate.ensure_targets(ctx.viewport, ctx.grid.block_size)?;
        self.buffers.resize(ctx.viewport);

        self.rasterizer
            .rasterize(ctx.scene, ctx.camera, &mut self.buffers)?;
        self.pixelate.run(&self.buffers, ctx.config);
        self.pixelate.resolve(ctx.scene.background, &mut self.image);
        self.presenter.present(&self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    struct Fill(Vec3);

    impl SceneRasterizer for Fill {
        fn rasterize(
            &mut self,
            _scene: &Scene,
            camera: &OrthoCamera,
            targets: &mut FrameBuffers,
        ) -> Result<(), RenderError> {
            targets.clear(self.0, camera.far);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Count(usize);

    impl Presenter for Count {
        fn present(&mut self, _image: &PresentedImage) -> Result<(), RenderError> {
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn render_presents_once_and_keeps_allocations() {
        let mut pipeline = CpuPipeline::new(Fill(Vec3::ONE), Count::default());
        let viewport = Viewport::new(24, 12);
        pipeline.resize(viewport).unwrap();

        let scene = Scene::new();
        let camera = OrthoCamera::new(2.0);
        let config = PixelationConfig::default();
        let ctx = FrameContext {
            frame: 0,
            elapsed: 0.0,
            viewport,
            grid: BlockGrid::for_viewport(viewport, config.pixel_block_size),
            config: &config,
            scene: &scene,
            camera: &camera,
        };
        pipeline.render(&ctx).unwrap();
        let after_first = pipeline.pixelate().allocations();
        pipeline.render(&ctx).unwrap();
        pipeline.render(&ctx).unwrap();

        assert_eq!(pipeline.presenter().0, 3);
        assert_eq!(pipeline.pixelate().allocations(), after_first);
        assert_eq!(pipeline.image().pixel(5, 5), [255, 255, 255, 255]);
    }
}
