use glam::{Mat4, Quat, Vec3};

/// Orthographic camera with three.js-style frustum bounds and zoom.
///
/// The bounds are expressed before zoom; the projection divides the visible
/// extent by `zoom` around the bounds' center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoCamera {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
    pub zoom: f32,
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for OrthoCamera {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

impl OrthoCamera {
    /// Camera with the symmetric frustum `[-aspect, aspect] x [-1, 1]`,
    /// looking down -Z from the origin.
    pub fn new(aspect: f32) -> Self {
        Self {
            left: -aspect,
            right: aspect,
            top: 1.0,
            bottom: -1.0,
            near: 0.1,
            far: 10.0,
            zoom: 1.0,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    /// The showcase viewpoint: raised 30 degrees above the horizon, two units
    /// back, looking at the origin.
    pub fn showcase(aspect: f32) -> Self {
        let mut camera = Self::new(aspect);
        camera.position = Vec3::new(0.0, 2.0 * (std::f32::consts::PI / 6.0).tan(), 2.0);
        camera.look_at(Vec3::ZERO);
        camera
    }

    /// Orient the camera so -Z points at `target` with +Y as up.
    pub fn look_at(&mut self, target: Vec3) {
        let forward = target - self.position;
        if forward.length_squared() <= f32::EPSILON {
            return;
        }
        let view = Mat4::look_at_rh(self.position, target, Vec3::Y);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        self.rotation = rotation.normalize();
    }

    /// Camera-local +X in world space.
    pub fn right_axis(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Camera-local +Y in world space.
    pub fn up_axis(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Direction the camera looks along (camera-local -Z).
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Reset the bounds to the unshifted frustum for `aspect`.
    pub fn set_symmetric(&mut self, aspect: f32) {
        self.left = -aspect;
        self.right = aspect;
        self.top = 1.0;
        self.bottom = -1.0;
    }

    /// True when the bounds are exactly the unshifted frustum for `aspect`.
    pub fn is_symmetric(&self, aspect: f32) -> bool {
        self.left == -aspect && self.right == aspect && self.top == 1.0 && self.bottom == -1.0
    }

    /// World-space width of the visible area.
    pub fn visible_width(&self) -> f32 {
        (self.right - self.left) / self.zoom
    }

    /// World-space height of the visible area.
    pub fn visible_height(&self) -> f32 {
        (self.top - self.bottom) / self.zoom
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position).inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        let half_w = (self.right - self.left) / (2.0 * self.zoom);
        let half_h = (self.top - self.bottom) / (2.0 * self.zoom);
        let cx = (self.right + self.left) / 2.0;
        let cy = (self.top + self.bottom) / 2.0;
        Mat4::orthographic_rh(
            cx - half_w,
            cx + half_w,
            cy - half_h,
            cy + half_h,
            self.near,
            self.far,
        )
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_is_symmetric() {
        let cam = OrthoCamera::new(2.0);
        assert!(cam.is_symmetric(2.0));
        assert!(!cam.is_symmetric(1.5));
        assert_eq!(cam.visible_width(), 4.0);
        assert_eq!(cam.visible_height(), 2.0);
    }

    #[test]
    fn showcase_camera_looks_at_origin() {
        let cam = OrthoCamera::showcase(16.0 / 9.0);
        let to_origin = (-cam.position).normalize();
        assert!((cam.forward() - to_origin).length() < 1e-5);
        // Right axis stays horizontal.
        assert!(cam.right_axis().y.abs() < 1e-5);
        let vp = cam.view_projection();
        assert!(!vp.col(0).x.is_nan());
    }

    #[test]
    fn origin_projects_to_screen_center() {
        let cam = OrthoCamera::showcase(1.0);
        let ndc = cam.view_projection().project_point3(Vec3::ZERO);
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn zoom_shrinks_visible_area() {
        let mut cam = OrthoCamera::new(1.0);
        cam.zoom = 2.0;
        assert_eq!(cam.visible_width(), 1.0);
        let ndc = cam.projection_matrix().project_point3(Vec3::new(0.5, 0.5, -1.0));
        assert!((ndc.x - 1.0).abs() < 1e-6);
        assert!((ndc.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn shifted_bounds_shift_projection() {
        let mut cam = OrthoCamera::new(1.0);
        cam.left -= 0.25;
        cam.right -= 0.25;
        let ndc = cam.projection_matrix().project_point3(Vec3::new(-0.25, 0.0, -1.0));
        assert!(ndc.x.abs() < 1e-6);
    }

    #[test]
    fn look_at_own_position_keeps_rotation() {
        let mut cam = OrthoCamera::new(1.0);
        cam.look_at(cam.position);
        assert_eq!(cam.rotation, Quat::IDENTITY);
    }
}
