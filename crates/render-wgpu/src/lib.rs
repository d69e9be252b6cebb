//! wgpu backend for the pixel pipeline.
//!
//! Renders the scene into color, normal and linear-depth targets, collapses
//! them into one texel per pixel block with edge darkening, then upscales the
//! blocks into the surface.
//!
//! # Invariants
//! - Renderer never mutates the scene.
//! - Targets are rebuilt only when the viewport or block size changes.
//! - Targets larger than the device texture limit are refused, not clamped.

mod gpu;
mod shaders;
mod uniforms;

pub use gpu::PixelRenderer;
