use glam::Vec3;
use pixelgrid_common::{ObjectId, Transform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f32::consts::FRAC_1_SQRT_2;

/// Geometry of a scene object, in local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Axis-aligned box centered on the origin.
    Cuboid { width: f32, height: f32, depth: f32 },
    /// Square in the local XY plane facing +Z.
    Plane { size: f32 },
    /// Regular icosahedron with flat faces.
    Icosahedron { radius: f32 },
}

impl Shape {
    /// Radius of a sphere around the local origin enclosing the shape.
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            Shape::Cuboid {
                width,
                height,
                depth,
            } => 0.5 * Vec3::new(width, height, depth).length(),
            Shape::Plane { size } => size * FRAC_1_SQRT_2,
            Shape::Icosahedron { radius } => radius,
        }
    }
}

/// Surface parameters, all colors in linear RGB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub base_color: Vec3,
    pub emissive: Vec3,
    pub emissive_intensity: f32,
    /// Blinn-Phong highlight color; zero for matte surfaces.
    #[serde(default)]
    pub specular: Vec3,
    #[serde(default)]
    pub shininess: f32,
}

impl Material {
    pub fn matte(base_color: Vec3) -> Self {
        Self {
            base_color,
            emissive: Vec3::ZERO,
            emissive_intensity: 0.0,
            specular: Vec3::ZERO,
            shininess: 30.0,
        }
    }

    /// Glossy surface with a Blinn-Phong highlight.
    pub fn glossy(base_color: Vec3, specular: Vec3, shininess: f32) -> Self {
        Self {
            specular,
            shininess,
            ..Self::matte(base_color)
        }
    }

    /// Emitted radiance after intensity scaling.
    pub fn emission(&self) -> Vec3 {
        self.emissive * self.emissive_intensity
    }
}

/// Whether an object takes part in shadow mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowFlags {
    /// Occludes shadow-casting lights.
    pub cast: bool,
    /// Darkens where shadow-casting lights are occluded.
    pub receive: bool,
}

impl ShadowFlags {
    pub const ALL: Self = Self {
        cast: true,
        receive: true,
    };
    pub const RECEIVE_ONLY: Self = Self {
        cast: false,
        receive: true,
    };
    pub const NONE: Self = Self {
        cast: false,
        receive: false,
    };
}

impl Default for ShadowFlags {
    fn default() -> Self {
        Self::ALL
    }
}

/// A renderable object: geometry, material and placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObject {
    pub shape: Shape,
    pub material: Material,
    pub transform: Transform,
    #[serde(default)]
    pub shadows: ShadowFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    /// Unit vector pointing from the surface toward the light.
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    #[serde(default)]
    pub cast_shadow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotLight {
    pub position: Vec3,
    pub target: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// Distance at which the light reaches zero.
    pub range: f32,
    /// Half-angle of the cone, radians.
    pub angle: f32,
    /// Fraction of the cone that fades out, 0..1.
    pub penumbra: f32,
    pub decay: f32,
    #[serde(default)]
    pub cast_shadow: bool,
}

/// Light rig shared by the software and GPU rasterizers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lighting {
    pub ambient: Vec3,
    pub sun: DirectionalLight,
    pub spot: Option<SpotLight>,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: Vec3::splat(0.3),
            sun: DirectionalLight {
                direction: Vec3::new(0.3, 1.0, 0.5).normalize(),
                color: Vec3::ONE,
                intensity: 0.7,
                cast_shadow: false,
            },
            spot: None,
        }
    }
}

/// The renderable scene: objects, lights and background.
///
/// Objects live in a BTreeMap so draw order is stable between frames.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    objects: BTreeMap<ObjectId, SceneObject>,
    pub lighting: Lighting,
    /// Linear clear color.
    pub background: Vec3,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_background(background: Vec3) -> Self {
        Self {
            background,
            ..Self::default()
        }
    }

    /// Number of objects in the scene.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Sphere `(center, radius)` enclosing every object, or `None` for an
    /// empty scene.
    pub fn bounds(&self) -> Option<(Vec3, f32)> {
        let spheres: Vec<(Vec3, f32)> = self
            .objects
            .values()
            .map(|o| {
                let scale = o.transform.scale.abs().max_element();
                (o.transform.position, o.shape.bounding_radius() * scale)
            })
            .collect();
        if spheres.is_empty() {
            return None;
        }
        let (min, max) = spheres.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(min, max), &(c, r)| (min.min(c - r), max.max(c + r)),
        );
        let center = (min + max) * 0.5;
        let radius = spheres
            .iter()
            .map(|&(c, r)| c.distance(center) + r)
            .fold(0.0, f32::max);
        Some((center, radius))
    }

    /// Read-only access to all objects in draw order.
    pub fn objects(&self) -> &BTreeMap<ObjectId, SceneObject> {
        &self.objects
    }

    /// Add an object and return its id.
    pub fn spawn(&mut self, object: SceneObject) -> ObjectId {
        let id = ObjectId::new();
        self.objects.insert(id, object);
        id
    }

    /// Remove an object. Returns it if it existed.
    pub fn despawn(&mut self, id: ObjectId) -> Option<SceneObject> {
        self.objects.remove(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    /// Replace an object's transform. Returns false if the id is unknown.
    pub fn set_transform(&mut self, id: ObjectId, transform: Transform) -> bool {
        match self.objects.get_mut(&id) {
            Some(object) => {
                object.transform = transform;
                true
            }
            None => false,
        }
    }
}
