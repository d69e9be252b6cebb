use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an object in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

/// Spatial transform: position, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Local-to-world matrix.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Size of the presentation surface in device pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height. A zero height is treated as one pixel.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The low-resolution grid of pixel blocks covering a viewport.
///
/// Block counts round down, so a partial strip of fewer than `block_size`
/// pixels may remain on the right and bottom edges. That strip is not part
/// of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockGrid {
    pub columns: u32,
    pub rows: u32,
    pub block_size: u32,
}

impl BlockGrid {
    /// Compute the grid for a viewport. `block_size` is clamped to at least 1.
    pub fn for_viewport(viewport: Viewport, block_size: u32) -> Self {
        let block_size = block_size.max(1);
        Self {
            columns: viewport.width / block_size,
            rows: viewport.height / block_size,
            block_size,
        }
    }

    /// True when the viewport is smaller than one block along either axis.
    pub fn is_degenerate(&self) -> bool {
        self.columns == 0 || self.rows == 0
    }

    pub fn block_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Full-resolution width covered by whole blocks.
    pub fn covered_width(&self) -> u32 {
        self.columns * self.block_size
    }

    /// Full-resolution height covered by whole blocks.
    pub fn covered_height(&self) -> u32 {
        self.rows * self.block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_uniqueness() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn transform_default_is_identity() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn viewport_aspect_guards_zero_height() {
        assert_eq!(Viewport::new(1920, 1080).aspect_ratio(), 1920.0 / 1080.0);
        assert_eq!(Viewport::new(10, 0).aspect_ratio(), 10.0);
    }

    #[test]
    fn block_grid_rounds_down() {
        let grid = BlockGrid::for_viewport(Viewport::new(1920, 1080), 6);
        assert_eq!((grid.columns, grid.rows), (320, 180));

        let grid = BlockGrid::for_viewport(Viewport::new(1921, 1081), 6);
        assert_eq!((grid.columns, grid.rows), (320, 180));
        assert_eq!(grid.covered_width(), 1920);
        assert_eq!(grid.covered_height(), 1080);
    }

    #[test]
    fn block_grid_clamps_block_size() {
        let grid = BlockGrid::for_viewport(Viewport::new(64, 32), 0);
        assert_eq!(grid.block_size, 1);
        assert_eq!((grid.columns, grid.rows), (64, 32));
    }

    #[test]
    fn block_grid_degenerate_when_block_exceeds_viewport() {
        let grid = BlockGrid::for_viewport(Viewport::new(5, 100), 6);
        assert!(grid.is_degenerate());
        assert_eq!(grid.block_count(), 0);
    }
}
