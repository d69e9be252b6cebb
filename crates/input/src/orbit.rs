use crate::action::Action;
use glam::Vec3;
use pixelgrid_common::Viewport;
use pixelgrid_render::OrthoCamera;
use std::f32::consts::{PI, TAU};

/// Keeps the polar angle off the poles so `look_at` always has a valid up.
const POLAR_MARGIN: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Viewpoint {
    position: Vec3,
    target: Vec3,
    zoom: f32,
}

/// Orbit, pan and zoom around a target point.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    pub target: Vec3,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
    home: Viewpoint,
}

impl OrbitControls {
    /// Controls orbiting `target`, with the camera's current pose as home.
    pub fn new(camera: &OrthoCamera, target: Vec3) -> Self {
        Self {
            target,
            min_zoom: 0.1,
            max_zoom: 2.0,
            rotate_speed: 1.0,
            pan_speed: 1.0,
            zoom_speed: 1.0,
            home: Viewpoint {
                position: camera.position,
                target,
                zoom: camera.zoom,
            },
        }
    }

    /// Apply an action. Returns true if the camera moved.
    pub fn apply(&mut self, action: Action, camera: &mut OrthoCamera, viewport: Viewport) -> bool {
        match action {
            Action::Orbit { dx, dy } => self.orbit(camera, viewport, dx, dy),
            Action::Pan { dx, dy } => self.pan(camera, viewport, dx, dy),
            Action::Zoom(steps) => self.zoom(camera, steps),
            Action::Reset => self.reset(camera),
            Action::TogglePanel | Action::Noop => return false,
        }
        camera.look_at(self.target);
        true
    }

    fn orbit(&mut self, camera: &mut OrthoCamera, viewport: Viewport, dx: f32, dy: f32) {
        let height = viewport.height.max(1) as f32;
        let offset = camera.position - self.target;
        let radius = offset.length();
        if radius <= f32::EPSILON {
            return;
        }
        let theta = offset.x.atan2(offset.z) - TAU * dx / height * self.rotate_speed;
        let phi = ((offset.y / radius).clamp(-1.0, 1.0).acos() - TAU * dy / height * self.rotate_speed)
            .clamp(POLAR_MARGIN, PI - POLAR_MARGIN);

        let offset = Vec3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        camera.position = self.target + offset;
    }

    /// Drag in screen space: the scene follows the pointer.
    fn pan(&mut self, camera: &mut OrthoCamera, viewport: Viewport, dx: f32, dy: f32) {
        let width = viewport.width.max(1) as f32;
        let height = viewport.height.max(1) as f32;
        let right = camera.right_axis() * (-dx * camera.visible_width() / width);
        let up = camera.up_axis() * (dy * camera.visible_height() / height);
        let delta = (right + up) * self.pan_speed;
        camera.position += delta;
        self.target += delta;
    }

    fn zoom(&mut self, camera: &mut OrthoCamera, steps: f32) {
        let scale = 0.95_f32.powf(-steps * self.zoom_speed);
        camera.zoom = (camera.zoom * scale).clamp(self.min_zoom, self.max_zoom);
        tracing::trace!(zoom = camera.zoom, "zoom");
    }

    fn reset(&mut self, camera: &mut OrthoCamera) {
        camera.position = self.home.position;
        camera.zoom = self.home.zoom;
        self.target = self.home.target;
    }
}
