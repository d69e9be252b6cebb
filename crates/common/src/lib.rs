//! Shared types for the pixelgrid renderer.

pub mod color;
mod types;

pub use types::{BlockGrid, ObjectId, Transform, Viewport};
