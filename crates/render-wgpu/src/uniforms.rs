use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Vec3};
use pixelgrid_common::BlockGrid;
use pixelgrid_kernel::{Lighting, SceneObject};
use pixelgrid_render::{
    LightViews, MeshVertex, OrthoCamera, PixelationConfig, SHADOW_DEPTH_BIAS, SHADOW_NORMAL_OFFSET,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct SceneUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub ambient: [f32; 4],
    pub sun_direction: [f32; 4],
    /// Color premultiplied by intensity.
    pub sun_color: [f32; 4],
    /// `w` is 1 when the spot is enabled.
    pub spot_position: [f32; 4],
    pub spot_direction: [f32; 4],
    pub spot_color: [f32; 4],
    /// cos(outer), cos(inner), range, decay.
    pub spot_params: [f32; 4],
    /// Unit vector from the surface toward the camera.
    pub view_dir: [f32; 4],
    pub sun_shadow: [[f32; 4]; 4],
    pub spot_shadow: [[f32; 4]; 4],
    /// sun enabled, spot enabled, depth bias, normal offset.
    pub shadow_params: [f32; 4],
}

impl SceneUniforms {
    pub fn new(camera: &OrthoCamera, lighting: &Lighting, shadows: &LightViews) -> Self {
        let sun = &lighting.sun;
        let enabled = |view: Option<glam::Mat4>| if view.is_some() { 1.0 } else { 0.0 };
        let mut uniforms = Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            view: camera.view_matrix().to_cols_array_2d(),
            view_dir: (-camera.forward()).extend(0.0).to_array(),
            sun_shadow: shadows.sun.unwrap_or_default().to_cols_array_2d(),
            spot_shadow: shadows.spot.unwrap_or_default().to_cols_array_2d(),
            shadow_params: [
                enabled(shadows.sun),
                enabled(shadows.spot),
                SHADOW_DEPTH_BIAS,
                SHADOW_NORMAL_OFFSET,
            ],
            ambient: lighting.ambient.extend(1.0).to_array(),
            sun_direction: sun.direction.normalize_or_zero().extend(0.0).to_array(),
            sun_color: (sun.color * sun.intensity).extend(1.0).to_array(),
            ..Self::zeroed()
        };
        if let Some(spot) = &lighting.spot {
            uniforms.spot_position = spot.position.extend(1.0).to_array();
            uniforms.spot_direction = (spot.target - spot.position)
                .normalize_or_zero()
                .extend(0.0)
                .to_array();
            uniforms.spot_color = (spot.color * spot.intensity).extend(1.0).to_array();
            uniforms.spot_params = [
                spot.angle.cos(),
                (spot.angle * (1.0 - spot.penumbra)).cos(),
                spot.range,
                spot.decay,
            ];
        }
        uniforms
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl From<&MeshVertex> for Vertex {
    fn from(v: &MeshVertex) -> Self {
        Self {
            position: v.position.to_array(),
            normal: v.normal.to_array(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct InstanceData {
    pub model_0: [f32; 4],
    pub model_1: [f32; 4],
    pub model_2: [f32; 4],
    pub model_3: [f32; 4],
    pub normal_0: [f32; 4],
    pub normal_1: [f32; 4],
    pub normal_2: [f32; 4],
    pub base_color: [f32; 4],
    /// Emissive color premultiplied by intensity.
    pub emissive: [f32; 4],
    /// Specular color, shininess.
    pub specular: [f32; 4],
    /// cast, receive, unused, unused.
    pub shadow_flags: [f32; 4],
}

impl From<&SceneObject> for InstanceData {
    fn from(object: &SceneObject) -> Self {
        let model = object.transform.matrix();
        let cols = model.to_cols_array_2d();
        let normal = Mat3::from_mat4(model).inverse().transpose();
        Self {
            model_0: cols[0],
            model_1: cols[1],
            model_2: cols[2],
            model_3: cols[3],
            normal_0: normal.x_axis.extend(0.0).to_array(),
            normal_1: normal.y_axis.extend(0.0).to_array(),
            normal_2: normal.z_axis.extend(0.0).to_array(),
            base_color: object.material.base_color.extend(1.0).to_array(),
            emissive: object.material.emission().extend(1.0).to_array(),
            specular: object
                .material
                .specular
                .extend(object.material.shininess)
                .to_array(),
            shadow_flags: [
                f32::from(u8::from(object.shadows.cast)),
                f32::from(u8::from(object.shadows.receive)),
                0.0,
                0.0,
            ],
        }
    }
}

/// Light-space matrix for one shadow pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct ShadowUniforms {
    pub light_view_proj: [[f32; 4]; 4],
}

impl ShadowUniforms {
    pub fn new(light_view_proj: glam::Mat4) -> Self {
        Self {
            light_view_proj: light_view_proj.to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct PixelateUniforms {
    /// columns, rows, block size, unused.
    pub grid: [u32; 4],
    /// normal strength, depth strength, unused, unused.
    pub strengths: [f32; 4],
}

impl PixelateUniforms {
    pub fn new(grid: BlockGrid, config: &PixelationConfig) -> Self {
        Self {
            grid: [grid.columns, grid.rows, grid.block_size, 0],
            strengths: [
                config.normal_edge_strength,
                config.depth_edge_strength,
                0.0,
                0.0,
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct OutputUniforms {
    /// columns, rows, block size, unused.
    pub grid: [u32; 4],
    pub background: [f32; 4],
}

impl OutputUniforms {
    pub fn new(grid: BlockGrid, background: Vec3) -> Self {
        Self {
            grid: [grid.columns, grid.rows, grid.block_size, 0],
            background: background.extend(1.0).to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use pixelgrid_common::{Transform, Viewport};
    use pixelgrid_kernel::{Material, ShadowFlags, Shape, Showcase};

    #[test]
    fn uniform_sizes_are_vec4_aligned() {
        assert_eq!(std::mem::size_of::<SceneUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<InstanceData>(), 11 * 16);
        assert_eq!(std::mem::size_of::<ShadowUniforms>(), 64);
        assert_eq!(std::mem::size_of::<PixelateUniforms>(), 32);
        assert_eq!(std::mem::size_of::<OutputUniforms>(), 32);
    }

    #[test]
    fn spot_is_flagged_only_when_present() {
        let camera = OrthoCamera::showcase(1.0);
        let showcase = Showcase::build();
        let views = LightViews::default();
        let lit = SceneUniforms::new(&camera, &showcase.scene.lighting, &views);
        assert_eq!(lit.spot_position[3], 1.0);
        assert!(lit.spot_params[0] < lit.spot_params[1]);

        let mut lighting = showcase.scene.lighting;
        lighting.spot = None;
        let unlit = SceneUniforms::new(&camera, &lighting, &views);
        assert_eq!(unlit.spot_position[3], 0.0);
    }

    #[test]
    fn instance_carries_emission_and_normal_matrix() {
        let mut material = Material::matte(Vec3::ONE);
        material.emissive = Vec3::new(0.0, 1.0, 0.0);
        material.emissive_intensity = 0.5;
        let object = SceneObject {
            shape: Shape::Plane { size: 1.0 },
            material,
            transform: Transform {
                rotation: Quat::from_rotation_y(0.3),
                scale: Vec3::new(2.0, 1.0, 1.0),
                ..Transform::default()
            },
            shadows: ShadowFlags::RECEIVE_ONLY,
        };
        let instance = InstanceData::from(&object);
        assert_eq!(instance.emissive, [0.0, 0.5, 0.0, 1.0]);
        assert_eq!(instance.shadow_flags[..2], [0.0, 1.0]);
        // Non-uniform scale: the normal matrix is not the model matrix.
        assert_ne!(instance.normal_0[..3], instance.model_0[..3]);
    }

    #[test]
    fn shadow_matrices_follow_the_showcase_lights() {
        let camera = OrthoCamera::showcase(1.0);
        let scene = Showcase::build().scene;
        let views = LightViews::for_scene(&scene);
        let uniforms = SceneUniforms::new(&camera, &scene.lighting, &views);
        assert_eq!(uniforms.shadow_params[..2], [1.0, 1.0]);
        assert_eq!(uniforms.sun_shadow, views.sun.unwrap().to_cols_array_2d());
        assert_eq!(uniforms.shadow_params[2], SHADOW_DEPTH_BIAS);

        let dark = SceneUniforms::new(&camera, &scene.lighting, &LightViews::default());
        assert_eq!(dark.shadow_params[..2], [0.0, 0.0]);
    }

    #[test]
    fn crystal_instance_carries_its_highlight() {
        let scene = Showcase::build().scene;
        let crystal = scene
            .objects()
            .values()
            .find(|o| matches!(o.shape, Shape::Icosahedron { .. }))
            .unwrap();
        let instance = InstanceData::from(crystal);
        assert_eq!(instance.specular, [1.0, 1.0, 1.0, 10.0]);
    }

    #[test]
    fn grid_uniforms_follow_block_grid() {
        let grid = BlockGrid::for_viewport(Viewport::new(1920, 1080), 6);
        let uniforms = PixelateUniforms::new(grid, &PixelationConfig::default());
        assert_eq!(uniforms.grid, [320, 180, 6, 0]);
        assert_eq!(uniforms.strengths[..2], [0.3, 0.4]);
    }
}
