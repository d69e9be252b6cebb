//! Pixel Render Core: grid-aligned orthographic camera and pixelate pipeline.
//!
//! # Invariants
//! - Alignment changes only the frustum bounds, never the camera position.
//! - The frustum width stays `2 * aspect` whatever the sub-pixel shift.
//! - Intermediate targets are reallocated only when the viewport or the block
//!   size changes.
//! - Resizes are applied between ticks, never during a render.
//! - The renderer reads the scene; it never mutates it.

mod align;
mod buffers;
mod camera;
mod config;
mod error;
mod frame;
mod lighting;
mod mesh;
mod pipeline;
mod pixelate;
mod shadow;
mod software;

pub use align::{AlignOutcome, PixelGridAligner, pixel_fraction};
pub use buffers::{FrameBuffers, PresentedImage};
pub use camera::OrthoCamera;
pub use config::{
    BLOCK_SIZE_RANGE, DEPTH_EDGE_RANGE, EDGE_STRENGTH_STEP, NORMAL_EDGE_RANGE, PixelationConfig,
};
pub use error::RenderError;
pub use frame::{FrameOrchestrator, LoopState, TickReport};
pub use lighting::{Visibility, shade, smoothstep};
pub use mesh::{MeshData, MeshVertex};
pub use pipeline::{CpuPipeline, FrameContext, PixelPipeline, Presenter};
pub use pixelate::{DEFAULT_MAX_DIMENSION, PixelatePass, edge_factor};
pub use shadow::{
    LightViews, SHADOW_DEPTH_BIAS, SHADOW_NORMAL_OFFSET, SPOT_SHADOW_SIZE, SUN_SHADOW_SIZE,
    ShadowMap, ShadowMaps, light_space, spot_view_proj, sun_view_proj,
};
pub use software::{SceneRasterizer, SoftwareRasterizer};
