//! Shadow mapping for the sun and the spot light.
//!
//! Both backends share the light-space matrices below. Casters are drawn
//! with their front faces culled, so a lit surface never compares against
//! its own depth.

use crate::lighting::Visibility;
use crate::mesh::MeshData;
use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};
use pixelgrid_kernel::{DirectionalLight, Scene, SpotLight};

/// Edge of the sun's shadow map, in texels.
pub const SUN_SHADOW_SIZE: u32 = 2048;
/// Edge of the spot light's shadow map, in texels.
pub const SPOT_SHADOW_SIZE: u32 = 512;
/// Subtracted from a receiver's light-space depth before the comparison.
pub const SHADOW_DEPTH_BIAS: f32 = 5e-4;
/// Receivers are pushed this far along their normal before the lookup.
pub const SHADOW_NORMAL_OFFSET: f32 = 0.01;

const SPOT_NEAR: f32 = 0.5;

fn up_for(direction: Vec3) -> Vec3 {
    if direction.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y }
}

/// Orthographic view-projection for a directional light covering the sphere
/// `(center, radius)`. `None` when the light has no direction or the sphere
/// is empty.
pub fn sun_view_proj(sun: &DirectionalLight, center: Vec3, radius: f32) -> Option<Mat4> {
    let toward_light = sun.direction.normalize_or_zero();
    if toward_light == Vec3::ZERO || radius <= 0.0 {
        return None;
    }
    let eye = center + toward_light * (2.0 * radius);
    let view = Mat4::look_at_rh(eye, center, up_for(toward_light));
    let proj = Mat4::orthographic_rh(-radius, radius, -radius, radius, radius, 3.0 * radius);
    Some(proj * view)
}

/// Perspective view-projection matching the spot light's cone.
pub fn spot_view_proj(spot: &SpotLight) -> Option<Mat4> {
    let axis = (spot.target - spot.position).normalize_or_zero();
    if axis == Vec3::ZERO || spot.range <= SPOT_NEAR {
        return None;
    }
    let view = Mat4::look_at_rh(spot.position, spot.target, up_for(axis));
    let fov = (2.0 * spot.angle).clamp(1e-3, 3.0);
    let proj = Mat4::perspective_rh(fov, 1.0, SPOT_NEAR, spot.range);
    Some(proj * view)
}

/// Light-space matrices for every light that casts shadows this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LightViews {
    pub sun: Option<Mat4>,
    pub spot: Option<Mat4>,
}

impl LightViews {
    pub fn for_scene(scene: &Scene) -> Self {
        let lighting = &scene.lighting;
        let sun = match scene.bounds() {
            Some((center, radius)) if lighting.sun.cast_shadow => {
                sun_view_proj(&lighting.sun, center, radius)
            }
            _ => None,
        };
        let spot = lighting
            .spot
            .filter(|spot| spot.cast_shadow)
            .and_then(|spot| spot_view_proj(&spot));
        Self { sun, spot }
    }
}

/// Map a world point into shadow-map space: `x`, `y` are texture
/// coordinates with `y` down, `z` the depth in [0, 1]. `None` behind a
/// perspective light.
pub fn light_space(view_proj: Mat4, world: Vec3) -> Option<Vec3> {
    let clip = view_proj * world.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.xyz() / clip.w;
    Some(Vec3::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5, ndc.z))
}

/// CPU depth map rendered from a light.
#[derive(Debug, Clone)]
pub struct ShadowMap {
    size: u32,
    view_proj: Option<Mat4>,
    depth: Vec<f32>,
}

impl ShadowMap {
    pub fn new(size: u32) -> Self {
        let size = size.max(1);
        Self {
            size,
            view_proj: None,
            depth: vec![1.0; (size * size) as usize],
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Start a frame from `view_proj`; `None` disables the map.
    pub fn reset(&mut self, view_proj: Option<Mat4>) {
        self.view_proj = view_proj;
        if view_proj.is_some() {
            self.depth.fill(1.0);
        }
    }

    /// Draw the back faces of a caster into the map.
    pub fn draw(&mut self, mesh: &MeshData, model: Mat4) {
        let Some(view_proj) = self.view_proj else {
            return;
        };
        let size = self.size as f32;
        for tri in mesh.indices.chunks_exact(3) {
            let mut corners = [Vec3::ZERO; 3];
            let mut visible = true;
            for (k, corner) in corners.iter_mut().enumerate() {
                let world = model.transform_point3(mesh.vertices[tri[k] as usize].position);
                match light_space(view_proj, world) {
                    Some(p) => *corner = Vec3::new(p.x * size, p.y * size, p.z),
                    None => visible = false,
                }
            }
            if visible {
                self.draw_back_face(corners);
            }
        }
    }

    fn draw_back_face(&mut self, [a, b, c]: [Vec3; 3]) {
        let edge = |p: Vec2, q: Vec2, r: Vec2| (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x);
        let (pa, pb, pc) = (a.truncate(), b.truncate(), c.truncate());
        let area = edge(pa, pb, pc);
        // Front faces have negative area in y-down map space.
        if area <= 0.0 || !area.is_finite() {
            return;
        }
        let max = (self.size - 1) as f32;
        let lo = pa.min(pb).min(pc);
        let hi = pa.max(pb).max(pc);
        if hi.x < 0.0 || hi.y < 0.0 || lo.x > max + 1.0 || lo.y > max + 1.0 {
            return;
        }
        let x0 = lo.x.floor().clamp(0.0, max) as u32;
        let x1 = hi.x.ceil().clamp(0.0, max) as u32;
        let y0 = lo.y.floor().clamp(0.0, max) as u32;
        let y1 = hi.y.ceil().clamp(0.0, max) as u32;

        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(pb, pc, p) / area;
                let w1 = edge(pc, pa, p) / area;
                let w2 = edge(pa, pb, p) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                // Depth divided by w stays affine in map space.
                let depth = w0 * a.z + w1 * b.z + w2 * c.z;
                let i = (y * self.size + x) as usize;
                if depth < self.depth[i] {
                    self.depth[i] = depth;
                }
            }
        }
    }

    /// 1.0 when `world` sees the light, 0.0 when a caster is in the way.
    /// Points outside the map are lit.
    pub fn visibility(&self, world: Vec3, normal: Vec3) -> f32 {
        let Some(view_proj) = self.view_proj else {
            return 1.0;
        };
        let offset = world + normal.normalize_or_zero() * SHADOW_NORMAL_OFFSET;
        let Some(p) = light_space(view_proj, offset) else {
            return 1.0;
        };
        if !(0.0..1.0).contains(&p.x) || !(0.0..1.0).contains(&p.y) || p.z > 1.0 {
            return 1.0;
        }
        let x = ((p.x * self.size as f32) as u32).min(self.size - 1);
        let y = ((p.y * self.size as f32) as u32).min(self.size - 1);
        let stored = self.depth[(y * self.size + x) as usize];
        if p.z - SHADOW_DEPTH_BIAS <= stored { 1.0 } else { 0.0 }
    }
}

/// The sun and spot maps together.
#[derive(Debug, Clone)]
pub struct ShadowMaps {
    pub sun: ShadowMap,
    pub spot: ShadowMap,
}

impl Default for ShadowMaps {
    fn default() -> Self {
        Self::new(SUN_SHADOW_SIZE, SPOT_SHADOW_SIZE)
    }
}

impl ShadowMaps {
    pub fn new(sun_size: u32, spot_size: u32) -> Self {
        Self {
            sun: ShadowMap::new(sun_size),
            spot: ShadowMap::new(spot_size),
        }
    }

    pub fn reset(&mut self, views: &LightViews) {
        self.sun.reset(views.sun);
        self.spot.reset(views.spot);
    }

    pub fn draw(&mut self, mesh: &MeshData, model: Mat4) {
        self.sun.draw(mesh, model);
        self.spot.draw(mesh, model);
    }

    pub fn visibility(&self, world: Vec3, normal: Vec3) -> Visibility {
        Visibility {
            sun: self.sun.visibility(world, normal),
            spot: self.spot.visibility(world, normal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelgrid_kernel::Showcase;

    fn overhead_sun() -> DirectionalLight {
        DirectionalLight {
            direction: Vec3::Y,
            color: Vec3::ONE,
            intensity: 1.0,
            cast_shadow: true,
        }
    }

    #[test]
    fn sun_view_keeps_bounds_inside_the_map() {
        let view = sun_view_proj(&overhead_sun(), Vec3::ZERO, 2.0).unwrap();
        for corner in [Vec3::new(1.4, 1.4, 0.0), Vec3::new(-1.4, -1.4, 0.0), Vec3::ZERO] {
            let p = light_space(view, corner).unwrap();
            assert!((0.0..=1.0).contains(&p.x));
            assert!((0.0..=1.0).contains(&p.y));
            assert!((0.0..=1.0).contains(&p.z));
        }
        // Higher points are nearer the sun.
        let high = light_space(view, Vec3::Y).unwrap();
        let low = light_space(view, Vec3::NEG_Y).unwrap();
        assert!(high.z < low.z);
    }

    #[test]
    fn light_views_follow_cast_flags() {
        let mut scene = Showcase::build().scene;
        let views = LightViews::for_scene(&scene);
        assert!(views.sun.is_some());
        assert!(views.spot.is_some());

        scene.lighting.sun.cast_shadow = false;
        if let Some(spot) = scene.lighting.spot.as_mut() {
            spot.cast_shadow = false;
        }
        assert_eq!(LightViews::for_scene(&scene), LightViews::default());
    }

    #[test]
    fn box_shadows_the_point_beneath_it() {
        let mut map = ShadowMap::new(256);
        map.reset(sun_view_proj(&overhead_sun(), Vec3::ZERO, 3.0));
        map.draw(&MeshData::cuboid(0.5, 0.5, 0.5), Mat4::from_translation(Vec3::Y));

        assert_eq!(map.visibility(Vec3::new(0.0, 0.0, 0.0), Vec3::Y), 0.0);
        assert_eq!(map.visibility(Vec3::new(0.6, 0.0, 0.0), Vec3::Y), 1.0);
        // The top of the box itself stays lit.
        assert_eq!(map.visibility(Vec3::new(0.0, 1.25, 0.0), Vec3::Y), 1.0);
    }

    #[test]
    fn disabled_map_is_always_lit() {
        let mut map = ShadowMap::new(16);
        map.reset(None);
        map.draw(&MeshData::cuboid(1.0, 1.0, 1.0), Mat4::IDENTITY);
        assert_eq!(map.visibility(Vec3::ZERO, Vec3::Y), 1.0);
    }
}
