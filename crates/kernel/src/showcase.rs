use crate::anim::CrystalMotion;
use crate::scene::{
    DirectionalLight, Lighting, Material, Scene, SceneObject, ShadowFlags, Shape, SpotLight,
};
use glam::{Quat, Vec3};
use pixelgrid_common::color::hex;
use pixelgrid_common::{ObjectId, Transform};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// The demo diorama: two stone pillars and a floating crystal on a patch of
/// grass, lit by an ambient fill, a sun and a narrow warm spot.
pub struct Showcase {
    pub scene: Scene,
    pub crystal: ObjectId,
    pub motion: CrystalMotion,
}

impl Showcase {
    pub fn build() -> Self {
        let mut scene = Scene::with_background(hex(0x151729));
        let stone = Material::matte(hex(0xffeded));
        let grass = Material::matte(hex(0x8ac165));

        scene.spawn(SceneObject {
            shape: Shape::Cuboid {
                width: 0.3,
                height: 0.3,
                depth: 0.3,
            },
            material: stone,
            transform: Transform::from_position(Vec3::new(0.0, 0.25, 0.0)),
            shadows: ShadowFlags::ALL,
        });

        scene.spawn(SceneObject {
            shape: Shape::Cuboid {
                width: 0.3,
                height: 0.8,
                depth: 0.3,
            },
            material: stone,
            transform: Transform {
                position: Vec3::new(0.4, 0.4, -0.4),
                rotation: Quat::from_rotation_y(FRAC_PI_4),
                ..Transform::default()
            },
            shadows: ShadowFlags::ALL,
        });

        scene.spawn(SceneObject {
            shape: Shape::Plane { size: 2.0 },
            material: grass,
            transform: Transform {
                rotation: Quat::from_rotation_x(-FRAC_PI_2),
                ..Transform::default()
            },
            shadows: ShadowFlags::RECEIVE_ONLY,
        });

        let motion = CrystalMotion::default();
        let crystal = scene.spawn(SceneObject {
            shape: Shape::Icosahedron { radius: 0.2 },
            material: Material {
                emissive: hex(0x4f7e8b),
                emissive_intensity: 0.5,
                ..Material::glossy(hex(0x68b7e9), Vec3::ONE, 10.0)
            },
            transform: Transform::from_position(Vec3::new(0.0, motion.base_height as f32, 0.0)),
            shadows: ShadowFlags::ALL,
        });

        scene.lighting = Lighting {
            ambient: hex(0x757f8e) * 0.6,
            sun: DirectionalLight {
                direction: Vec3::new(100.0, 100.0, 100.0).normalize(),
                color: hex(0xfffecd),
                intensity: 0.9,
                cast_shadow: true,
            },
            spot: Some(SpotLight {
                position: Vec3::new(2.0, 2.0, 0.0),
                target: Vec3::ZERO,
                color: hex(0xffc100),
                intensity: 2.5,
                range: 10.0,
                angle: PI / 16.0,
                penumbra: 0.02,
                decay: 2.0,
                cast_shadow: true,
            }),
        };

        tracing::debug!(objects = scene.object_count(), "showcase scene built");

        Self {
            scene,
            crystal,
            motion,
        }
    }
}
