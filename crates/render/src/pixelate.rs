use crate::RenderError;
use crate::buffers::{FrameBuffers, PresentedImage};
use crate::config::PixelationConfig;
use glam::Vec3;
use pixelgrid_common::{BlockGrid, Viewport};
use std::f32::consts::PI;

/// Largest target edge the CPU path accepts by default. Matches the common
/// 2D texture limit of desktop GPUs.
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

/// Darkening factor for one block, in [0, 1].
///
/// `depth_diff` is the largest absolute depth difference to a neighbor and
/// `angle` the largest angle in radians between the center normal and a
/// neighbor normal.
pub fn edge_factor(depth_diff: f32, angle: f32, config: &PixelationConfig) -> f32 {
    let depth = depth_diff * config.depth_edge_strength;
    let normal = angle / PI * config.normal_edge_strength;
    depth.max(normal).clamp(0.0, 1.0)
}

/// Angle between two normals. Identical normals give exactly zero.
fn normal_angle(a: Vec3, b: Vec3) -> f32 {
    if a == b {
        return 0.0;
    }
    let a = a.normalize_or_zero();
    let b = b.normalize_or_zero();
    a.dot(b).clamp(-1.0, 1.0).acos()
}

/// Stage two of the pixel pipeline: block downsample with edge darkening,
/// then the nearest-neighbor upscale and output encode.
#[derive(Debug)]
pub struct PixelatePass {
    viewport: Viewport,
    grid: BlockGrid,
    blocks: Vec<Vec3>,
    allocations: u64,
    max_dimension: u32,
}

impl Default for PixelatePass {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION)
    }
}

impl PixelatePass {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            viewport: Viewport::default(),
            grid: BlockGrid::for_viewport(Viewport::default(), 1),
            blocks: Vec::new(),
            allocations: 0,
            max_dimension,
        }
    }

    pub fn grid(&self) -> BlockGrid {
        self.grid
    }

    /// How many times the block buffer has been reallocated.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Low-resolution block colors from the last run, row-major.
    pub fn blocks(&self) -> &[Vec3] {
        &self.blocks
    }

    /// Size the intermediate buffer for a viewport and block size. Returns
    /// true if it was reallocated; an unchanged size costs nothing.
    pub fn ensure_targets(
        &mut self,
        viewport: Viewport,
        block_size: u32,
    ) -> Result<bool, RenderError> {
        if viewport.width > self.max_dimension || viewport.height > self.max_dimension {
            return Err(RenderError::TargetTooLarge {
                width: viewport.width,
                height: viewport.height,
                max: self.max_dimension,
            });
        }
        let grid = BlockGrid::for_viewport(viewport, block_size);
        if viewport == self.viewport && grid == self.grid && self.allocations > 0 {
            return Ok(false);
        }
        self.viewport = viewport;
        self.grid = grid;
        self.blocks = vec![Vec3::ZERO; grid.block_count()];
        self.allocations += 1;
        tracing::debug!(
            width = viewport.width,
            height = viewport.height,
            columns = grid.columns,
            rows = grid.rows,
            "pixelate targets reallocated"
        );
        Ok(true)
    }

    /// Compute every block color from the full-resolution targets.
    ///
    /// The targets must match the viewport given to `ensure_targets`.
    pub fn run(&mut self, source: &FrameBuffers, config: &PixelationConfig) {
        debug_assert_eq!(source.viewport(), self.viewport);
        let grid = self.grid;
        if grid.is_degenerate() {
            return;
        }
        let bs = grid.block_size;
        let half = bs / 2;
        let max_x = grid.covered_width() - 1;
        let max_y = grid.covered_height() - 1;

        for by in 0..grid.rows {
            for bx in 0..grid.columns {
                let cx = bx * bs + half;
                let cy = by * bs + half;
                let center = source.index(cx, cy);
                let depth = source.depth[center];
                let normal = source.normal[center];

                let neighbors = [
                    (cx, cy.saturating_sub(bs)),
                    (cx, (cy + bs).min(max_y)),
                    (cx.saturating_sub(bs), cy),
                    ((cx + bs).min(max_x), cy),
                ];
                let mut depth_diff = 0.0_f32;
                let mut angle = 0.0_f32;
                for (nx, ny) in neighbors {
                    let i = source.index(nx, ny);
                    depth_diff = depth_diff.max((source.depth[i] - depth).abs());
                    angle = angle.max(normal_angle(normal, source.normal[i]));
                }

                let darken = 1.0 - edge_factor(depth_diff, angle, config);
                self.blocks[(by * grid.columns + bx) as usize] = source.color[center] * darken;
            }
        }
    }

    /// Color of the block covering full-resolution pixel (x, y), or `None`
    /// for pixels in the partial right/bottom strip.
    pub fn block_at(&self, x: u32, y: u32) -> Option<Vec3> {
        let grid = self.grid;
        if x >= grid.covered_width() || y >= grid.covered_height() {
            return None;
        }
        let bx = x / grid.block_size;
        let by = y / grid.block_size;
        self.blocks.get((by * grid.columns + bx) as usize).copied()
    }

    /// Upscale the blocks to the full viewport and encode for display. The
    /// partial strip shows `background`.
    pub fn resolve(&self, background: Vec3, image: &mut PresentedImage) {
        image.resize(self.viewport);
        for y in 0..self.viewport.height {
            for x in 0..self.viewport.width {
                image.put(x, y, self.block_at(x, y).unwrap_or(background));
            }
        }
    }
}
