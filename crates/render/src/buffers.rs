use glam::Vec3;
use pixelgrid_common::Viewport;
use pixelgrid_common::color::to_srgb8;

/// Full-resolution render targets: linear color, view-space normal and
/// linear view depth. Row-major, top row first.
#[derive(Debug, Clone, Default)]
pub struct FrameBuffers {
    viewport: Viewport,
    pub color: Vec<Vec3>,
    pub normal: Vec<Vec3>,
    pub depth: Vec<f32>,
}

impl FrameBuffers {
    pub fn new(viewport: Viewport) -> Self {
        let mut buffers = Self::default();
        buffers.resize(viewport);
        buffers
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn width(&self) -> u32 {
        self.viewport.width
    }

    pub fn height(&self) -> u32 {
        self.viewport.height
    }

    /// Resize the targets. Returns false, without touching memory, when the
    /// size is unchanged.
    pub fn resize(&mut self, viewport: Viewport) -> bool {
        if viewport == self.viewport && self.color.len() == viewport.pixel_count() {
            return false;
        }
        let n = viewport.pixel_count();
        self.viewport = viewport;
        self.color = vec![Vec3::ZERO; n];
        self.normal = vec![Vec3::Z; n];
        self.depth = vec![f32::MAX; n];
        true
    }

    /// Overwrite every pixel: background color, camera-facing normal, depth at
    /// the far plane.
    pub fn clear(&mut self, background: Vec3, far: f32) {
        self.color.fill(background);
        self.normal.fill(Vec3::Z);
        self.depth.fill(far);
    }

    /// Index of pixel (x, y). Callers keep coordinates in bounds.
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.viewport.width as usize + x as usize
    }
}

/// A finished, display-encoded RGBA8 frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresentedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl PresentedImage {
    /// Reallocate only when the size changes.
    pub fn resize(&mut self, viewport: Viewport) {
        let len = viewport.pixel_count() * 4;
        if self.width != viewport.width || self.height != viewport.height || self.rgba.len() != len
        {
            self.width = viewport.width;
            self.height = viewport.height;
            self.rgba = vec![0; len];
        }
    }

    /// Encode a linear color into pixel (x, y) with the output resolve.
    pub fn put(&mut self, x: u32, y: u32, linear: Vec3) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let [r, g, b] = to_srgb8(linear);
        self.rgba[i..i + 4].copy_from_slice(&[r, g, b, 255]);
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.rgba[i],
            self.rgba[i + 1],
            self.rgba[i + 2],
            self.rgba[i + 3],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_is_noop_for_same_size() {
        let mut buffers = FrameBuffers::new(Viewport::new(8, 4));
        assert_eq!(buffers.color.len(), 32);
        assert!(!buffers.resize(Viewport::new(8, 4)));
        assert!(buffers.resize(Viewport::new(9, 4)));
        assert_eq!(buffers.depth.len(), 36);
    }

    #[test]
    fn clear_overwrites_everything() {
        let mut buffers = FrameBuffers::new(Viewport::new(3, 3));
        buffers.color[4] = Vec3::ONE;
        buffers.depth[4] = 0.5;
        buffers.clear(Vec3::new(0.1, 0.2, 0.3), 10.0);
        assert!(buffers.color.iter().all(|c| *c == Vec3::new(0.1, 0.2, 0.3)));
        assert!(buffers.depth.iter().all(|d| *d == 10.0));
        assert!(buffers.normal.iter().all(|n| *n == Vec3::Z));
    }

    #[test]
    fn row_major_indexing() {
        let buffers = FrameBuffers::new(Viewport::new(5, 2));
        assert_eq!(buffers.index(0, 1), 5);
        assert_eq!(buffers.index(4, 1), 9);
    }

    #[test]
    fn presented_image_encodes_srgb() {
        let mut image = PresentedImage::default();
        image.resize(Viewport::new(2, 2));
        image.put(1, 1, Vec3::ONE);
        assert_eq!(image.pixel(1, 1), [255, 255, 255, 255]);
        assert_eq!(image.pixel(0, 0), [0, 0, 0, 0]);
    }
}
