use crate::buffers::FrameBuffers;
use crate::camera::OrthoCamera;
use crate::lighting::{Visibility, shade};
use crate::mesh::MeshData;
use crate::shadow::{LightViews, ShadowMaps};
use crate::RenderError;
use glam::{Mat3, Vec2, Vec3, Vec4Swizzles};
use pixelgrid_common::ObjectId;
use pixelgrid_kernel::{Scene, Shape};
use std::collections::BTreeMap;

/// Stage one of the pixel pipeline: draw the scene from a camera into the
/// full-resolution color, normal and depth targets.
///
/// The rasterizer reads the scene; it never mutates it.
pub trait SceneRasterizer {
    fn rasterize(
        &mut self,
        scene: &Scene,
        camera: &OrthoCamera,
        targets: &mut FrameBuffers,
    ) -> Result<(), RenderError>;
}

/// A clip-space vertex ready for scan conversion.
#[derive(Clone, Copy)]
struct ScreenVertex {
    screen: Vec2,
    depth: f32,
    world: Vec3,
}

/// CPU scan-line rasterizer with a depth buffer, back-face culling,
/// shadow maps and per-pixel Lambert plus Blinn-Phong shading.
#[derive(Debug, Default)]
pub struct SoftwareRasterizer {
    meshes: BTreeMap<ObjectId, (Shape, MeshData)>,
    shadows: ShadowMaps,
}

impl SoftwareRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rasterizer with custom shadow map sizes.
    pub fn with_shadow_sizes(sun: u32, spot: u32) -> Self {
        Self {
            meshes: BTreeMap::new(),
            shadows: ShadowMaps::new(sun, spot),
        }
    }

    fn sync_meshes(&mut self, scene: &Scene) {
        self.meshes.retain(|id, _| scene.objects().contains_key(id));
        for (id, object) in scene.objects() {
            let shape = object.shape;
            let entry = self
                .meshes
                .entry(*id)
                .or_insert_with(|| (shape, MeshData::for_shape(&shape)));
            if entry.0 != shape {
                *entry = (shape, MeshData::for_shape(&shape));
            }
        }
    }

    fn draw_shadow_casters(&mut self, scene: &Scene) {
        let views = LightViews::for_scene(scene);
        self.shadows.reset(&views);
        if views == LightViews::default() {
            return;
        }
        for (id, object) in scene.objects() {
            if !object.shadows.cast {
                continue;
            }
            if let Some((_, mesh)) = self.meshes.get(id) {
                self.shadows.draw(mesh, object.transform.matrix());
            }
        }
    }
}

impl SceneRasterizer for SoftwareRasterizer {
    fn rasterize(
        &mut self,
        scene: &Scene,
        camera: &OrthoCamera,
        targets: &mut FrameBuffers,
    ) -> Result<(), RenderError> {
        targets.clear(scene.background, camera.far);
        let (width, height) = (targets.width(), targets.height());
        if width == 0 || height == 0 {
            return Ok(());
        }

        let view = camera.view_matrix();
        let view_proj = camera.projection_matrix() * view;
        let view_rotation = Mat3::from_quat(camera.rotation.inverse());
        let size = Vec2::new(width as f32, height as f32);
        let view_dir = -camera.forward();

        self.sync_meshes(scene);
        self.draw_shadow_casters(scene);

        for (id, object) in scene.objects() {
            let Some((_, mesh)) = self.meshes.get(id) else {
                continue;
            };
            let model = object.transform.matrix();
            let normal_matrix = Mat3::from_mat4(model).inverse().transpose();
            let shadows = &self.shadows;

            for tri in mesh.indices.chunks_exact(3) {
                let corners = [0, 1, 2].map(|k| {
                    let world = model.transform_point3(mesh.vertices[tri[k] as usize].position);
                    let clip = view_proj * world.extend(1.0);
                    let ndc = clip.xy() / clip.w;
                    ScreenVertex {
                        screen: Vec2::new((ndc.x * 0.5 + 0.5) * size.x, (0.5 - ndc.y * 0.5) * size.y),
                        depth: -view.transform_point3(world).z,
                        world,
                    }
                });
                let world_normal =
                    (normal_matrix * mesh.vertices[tri[0] as usize].normal).normalize_or_zero();
                let view_normal = view_rotation * world_normal;

                draw_triangle(targets, camera, corners, |world_pos| {
                    let visibility = if object.shadows.receive {
                        shadows.visibility(world_pos, world_normal)
                    } else {
                        Visibility::LIT
                    };
                    let color = shade(
                        &object.material,
                        &scene.lighting,
                        world_pos,
                        world_normal,
                        view_dir,
                        visibility,
                    );
                    (color, view_normal)
                });
            }
        }
        Ok(())
    }
}

/// Twice the signed area of (a, b, p). Negative when p lies to the right of
/// a->b in y-down screen space, i.e. inside a front-facing triangle.
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn draw_triangle(
    targets: &mut FrameBuffers,
    camera: &OrthoCamera,
    [a, b, c]: [ScreenVertex; 3],
    mut fragment: impl FnMut(Vec3) -> (Vec3, Vec3),
) {
    let area = edge(a.screen, b.screen, c.screen);
    // Counter-clockwise in NDC turns clockwise once y points down.
    if area >= 0.0 || !area.is_finite() {
        return;
    }

    let max_x = (targets.width() - 1) as f32;
    let max_y = (targets.height() - 1) as f32;
    let min = a.screen.min(b.screen).min(c.screen);
    let max = a.screen.max(b.screen).max(c.screen);
    if max.x < 0.0 || max.y < 0.0 || min.x > max_x + 1.0 || min.y > max_y + 1.0 {
        return;
    }
    let x0 = min.x.floor().clamp(0.0, max_x) as u32;
    let x1 = max.x.ceil().clamp(0.0, max_x) as u32;
    let y0 = min.y.floor().clamp(0.0, max_y) as u32;
    let y1 = max.y.ceil().clamp(0.0, max_y) as u32;

    for y in y0..=y1 {
        for x in x0..=x1 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(b.screen, c.screen, p) / area;
            let w1 = edge(c.screen, a.screen, p) / area;
            let w2 = edge(a.screen, b.screen, p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            // Orthographic projection keeps depth affine in screen space.
            let depth = w0 * a.depth + w1 * b.depth + w2 * c.depth;
            if depth < camera.near || depth > camera.far {
                continue;
            }
            let i = targets.index(x, y);
            if depth >= targets.depth[i] {
                continue;
            }
            let world = a.world * w0 + b.world * w1 + c.world * w2;
            let (color, normal) = fragment(world);
            targets.depth[i] = depth;
            targets.color[i] = color;
            targets.normal[i] = normal;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use pixelgrid_common::{Transform, Viewport};
    use pixelgrid_kernel::{DirectionalLight, Material, SceneObject, ShadowFlags, Showcase};

    fn camera_looking_down_z() -> OrthoCamera {
        let mut cam = OrthoCamera::new(1.0);
        cam.position = Vec3::new(0.0, 0.0, 5.0);
        cam
    }

    fn facing_plane(z: f32, size: f32, color: Vec3) -> SceneObject {
        SceneObject {
            shape: Shape::Plane { size },
            material: Material {
                emissive: color,
                emissive_intensity: 1.0,
                ..Material::matte(Vec3::ZERO)
            },
            transform: Transform::from_position(Vec3::new(0.0, 0.0, z)),
            shadows: ShadowFlags::ALL,
        }
    }

    /// White ground facing the camera, a small box hovering above it and a
    /// sun coming in from the upper right.
    fn shadowed_scene(ground: ShadowFlags) -> Scene {
        let mut scene = Scene::new();
        scene.lighting.ambient = Vec3::splat(0.2);
        scene.lighting.sun = DirectionalLight {
            direction: Vec3::new(1.0, 0.0, 1.0).normalize(),
            color: Vec3::ONE,
            intensity: 0.8,
            cast_shadow: true,
        };
        scene.lighting.spot = None;
        scene.spawn(SceneObject {
            shape: Shape::Plane { size: 2.0 },
            material: Material::matte(Vec3::ONE),
            transform: Transform::default(),
            shadows: ground,
        });
        scene.spawn(SceneObject {
            shape: Shape::Cuboid {
                width: 0.3,
                height: 0.3,
                depth: 0.3,
            },
            material: Material::matte(Vec3::ONE),
            transform: Transform::from_position(Vec3::new(0.0, 0.0, 0.5)),
            shadows: ShadowFlags::ALL,
        });
        scene
    }

    #[test]
    fn empty_scene_is_background() {
        let scene = Scene::with_background(Vec3::new(0.1, 0.2, 0.3));
        let mut targets = FrameBuffers::new(Viewport::new(16, 16));
        SoftwareRasterizer::new()
            .rasterize(&scene, &camera_looking_down_z(), &mut targets)
            .unwrap();
        assert!(targets.color.iter().all(|c| *c == Vec3::new(0.1, 0.2, 0.3)));
        assert!(targets.depth.iter().all(|d| *d == 10.0));
    }

    #[test]
    fn plane_fills_center_with_its_depth_and_normal() {
        let mut scene = Scene::new();
        scene.spawn(facing_plane(0.0, 1.0, Vec3::new(1.0, 0.0, 0.0)));
        let mut targets = FrameBuffers::new(Viewport::new(32, 32));
        SoftwareRasterizer::new()
            .rasterize(&scene, &camera_looking_down_z(), &mut targets)
            .unwrap();

        let center = targets.index(16, 16);
        assert_eq!(targets.color[center], Vec3::new(1.0, 0.0, 0.0));
        assert!((targets.depth[center] - 5.0).abs() < 1e-4);
        assert!((targets.normal[center] - Vec3::Z).length() < 1e-5);

        // The plane spans half the frustum, so the corners stay clear.
        let corner = targets.index(1, 1);
        assert_eq!(targets.color[corner], Vec3::ZERO);
    }

    #[test]
    fn nearer_surface_wins() {
        let mut scene = Scene::new();
        scene.spawn(facing_plane(0.0, 1.0, Vec3::new(1.0, 0.0, 0.0)));
        scene.spawn(facing_plane(1.0, 0.5, Vec3::new(0.0, 1.0, 0.0)));
        let mut targets = FrameBuffers::new(Viewport::new(32, 32));
        SoftwareRasterizer::new()
            .rasterize(&scene, &camera_looking_down_z(), &mut targets)
            .unwrap();
        let center = targets.index(16, 16);
        assert_eq!(targets.color[center], Vec3::new(0.0, 1.0, 0.0));
        assert!((targets.depth[center] - 4.0).abs() < 1e-4);
    }

    #[test]
    fn back_faces_are_culled() {
        let mut scene = Scene::new();
        let mut plane = facing_plane(0.0, 1.0, Vec3::ONE);
        plane.transform.rotation = Quat::from_rotation_y(std::f32::consts::PI);
        scene.spawn(plane);
        let mut targets = FrameBuffers::new(Viewport::new(16, 16));
        SoftwareRasterizer::new()
            .rasterize(&scene, &camera_looking_down_z(), &mut targets)
            .unwrap();
        assert!(targets.color.iter().all(|c| *c == Vec3::ZERO));
    }

    #[test]
    fn geometry_beyond_far_plane_is_clipped() {
        let mut scene = Scene::new();
        scene.spawn(facing_plane(-20.0, 1.0, Vec3::ONE));
        let mut targets = FrameBuffers::new(Viewport::new(16, 16));
        SoftwareRasterizer::new()
            .rasterize(&scene, &camera_looking_down_z(), &mut targets)
            .unwrap();
        assert!(targets.color.iter().all(|c| *c == Vec3::ZERO));
    }

    #[test]
    fn showcase_renders_something_in_front_of_background() {
        let showcase = Showcase::build();
        let mut targets = FrameBuffers::new(Viewport::new(64, 36));
        let camera = OrthoCamera::showcase(64.0 / 36.0);
        SoftwareRasterizer::new()
            .rasterize(&showcase.scene, &camera, &mut targets)
            .unwrap();
        let covered = targets.depth.iter().filter(|d| **d < camera.far).count();
        assert!(covered > targets.depth.len() / 5);
    }

    #[test]
    fn mesh_cache_follows_scene() {
        let mut scene = Scene::new();
        let id = scene.spawn(facing_plane(0.0, 1.0, Vec3::ONE));
        let mut raster = SoftwareRasterizer::new();
        let mut targets = FrameBuffers::new(Viewport::new(8, 8));
        raster.rasterize(&scene, &camera_looking_down_z(), &mut targets).unwrap();
        assert_eq!(raster.meshes.len(), 1);
        scene.despawn(id);
        raster.rasterize(&scene, &camera_looking_down_z(), &mut targets).unwrap();
        assert!(raster.meshes.is_empty());
    }

    #[test]
    fn box_shadows_the_plane_beneath_it() {
        let scene = shadowed_scene(ShadowFlags::RECEIVE_ONLY);
        let mut targets = FrameBuffers::new(Viewport::new(32, 32));
        SoftwareRasterizer::with_shadow_sizes(256, 64)
            .rasterize(&scene, &camera_looking_down_z(), &mut targets)
            .unwrap();

        // The sun comes from +x, so the shadow falls on the -x side.
        let shaded = targets.color[targets.index(8, 16)];
        let lit = targets.color[targets.index(25, 16)];
        assert!((shaded.x - 0.2).abs() < 1e-3, "shaded {shaded}");
        let sun_term = 0.8 * std::f32::consts::FRAC_1_SQRT_2;
        assert!((lit.x - (0.2 + sun_term)).abs() < 1e-3, "lit {lit}");
    }

    #[test]
    fn ground_that_does_not_receive_stays_lit() {
        let scene = shadowed_scene(ShadowFlags::NONE);
        let mut targets = FrameBuffers::new(Viewport::new(32, 32));
        SoftwareRasterizer::with_shadow_sizes(256, 64)
            .rasterize(&scene, &camera_looking_down_z(), &mut targets)
            .unwrap();
        let left = targets.color[targets.index(8, 16)];
        let right = targets.color[targets.index(25, 16)];
        assert!((left - right).length() < 1e-4);
    }
}
