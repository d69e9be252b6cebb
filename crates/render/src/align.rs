//! Pixel-grid alignment for the orthographic camera.
//!
//! Moving an orthographic camera by a fraction of an output pixel makes every
//! block edge swim across the scene. Shifting the frustum bounds by that same
//! fraction keeps world-space pixel boundaries fixed on screen while the
//! camera itself moves freely.

use crate::RenderError;
use crate::camera::OrthoCamera;
use glam::Vec2;
use pixelgrid_common::BlockGrid;

/// What the aligner did to the camera this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlignOutcome {
    /// Bounds shifted by the given sub-pixel fractions, each in [-0.5, 0.5].
    Aligned { fract_x: f32, fract_y: f32 },
    /// Bounds had drifted and were restored to the symmetric frustum.
    Reset,
    /// Bounds were already symmetric; nothing recomputed.
    Unchanged,
    /// The grid was degenerate; alignment skipped and bounds made symmetric.
    Skipped,
}

/// Sub-pixel offset of the camera relative to the nearest grid line, in
/// output-pixel units along the camera's right and up axes.
///
/// Returns `None` when either pixel count is zero.
pub fn pixel_fraction(
    camera: &OrthoCamera,
    pixels_across_width: u32,
    pixels_across_height: u32,
) -> Option<(Vec2, Vec2)> {
    if pixels_across_width == 0 || pixels_across_height == 0 {
        return None;
    }
    let pixel_size = Vec2::new(
        camera.visible_width() / pixels_across_width as f32,
        camera.visible_height() / pixels_across_height as f32,
    );

    let along = Vec2::new(
        camera.position.dot(camera.right_axis()),
        camera.position.dot(camera.up_axis()),
    );
    let in_pixels = along / pixel_size;
    let fract = in_pixels - in_pixels.round();
    Some((fract, pixel_size))
}

/// Keeps the camera frustum snapped to the output pixel grid.
#[derive(Debug, Default)]
pub struct PixelGridAligner {
    degenerate_reported: bool,
}

impl PixelGridAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift the frustum so the camera sits on a pixel-grid line.
    ///
    /// Only the bounds change; position, rotation and zoom are untouched. With
    /// a zero pixel count the camera falls back to the symmetric frustum.
    pub fn align(
        &mut self,
        camera: &mut OrthoCamera,
        aspect: f32,
        pixels_across_width: u32,
        pixels_across_height: u32,
    ) -> AlignOutcome {
        let Some((fract, pixel_size)) =
            pixel_fraction(camera, pixels_across_width, pixels_across_height)
        else {
            self.report_degenerate(pixels_across_width, pixels_across_height);
            self.reset_if_drifted(camera, aspect);
            return AlignOutcome::Skipped;
        };
        self.degenerate_reported = false;

        let shift = fract * pixel_size;
        camera.left = -aspect - shift.x;
        camera.right = aspect - shift.x;
        camera.top = 1.0 - shift.y;
        camera.bottom = -1.0 - shift.y;

        AlignOutcome::Aligned {
            fract_x: fract.x,
            fract_y: fract.y,
        }
    }

    /// Restore the symmetric frustum, but only if the bounds have drifted.
    pub fn reset_if_drifted(&self, camera: &mut OrthoCamera, aspect: f32) -> AlignOutcome {
        if camera.is_symmetric(aspect) {
            return AlignOutcome::Unchanged;
        }
        camera.set_symmetric(aspect);
        AlignOutcome::Reset
    }

    /// Per-frame entry point: align when panning alignment is enabled,
    /// otherwise undo any leftover shift.
    pub fn update(
        &mut self,
        camera: &mut OrthoCamera,
        aspect: f32,
        grid: BlockGrid,
        pixel_aligned_panning: bool,
    ) -> AlignOutcome {
        if pixel_aligned_panning {
            self.align(camera, aspect, grid.columns, grid.rows)
        } else {
            self.reset_if_drifted(camera, aspect)
        }
    }

    /// Warn once per run of degenerate frames. Returns true when it warned.
    fn report_degenerate(&mut self, columns: u32, rows: u32) -> bool {
        if self.degenerate_reported {
            return false;
        }
        let err = RenderError::DegenerateFrustum { columns, rows };
        tracing::warn!("skipping pixel alignment: {err}");
        self.degenerate_reported = true;
        true
    }
}
