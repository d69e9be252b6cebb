use glam::Vec3;
use pixelgrid_kernel::{Lighting, Material, SpotLight};

/// How much of each shadow-casting light reaches a point: 1 is fully lit,
/// 0 fully occluded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visibility {
    pub sun: f32,
    pub spot: f32,
}

impl Visibility {
    pub const LIT: Self = Self {
        sun: 1.0,
        spot: 1.0,
    };
}

impl Default for Visibility {
    fn default() -> Self {
        Self::LIT
    }
}

/// Lambert diffuse plus a Blinn-Phong highlight, with ambient fill, sun,
/// optional spot and emission.
///
/// `view_dir` points from the surface toward the viewer. The WGSL scene
/// shader mirrors this function term for term.
pub fn shade(
    material: &Material,
    lighting: &Lighting,
    world_pos: Vec3,
    normal: Vec3,
    view_dir: Vec3,
    visibility: Visibility,
) -> Vec3 {
    let n = normal.normalize_or_zero();
    let v = view_dir.normalize_or_zero();
    let mut diffuse = lighting.ambient;
    let mut highlight = Vec3::ZERO;

    let sun = &lighting.sun;
    let l = sun.direction.normalize_or_zero();
    let radiance = sun.color * sun.intensity * visibility.sun;
    diffuse += radiance * n.dot(l).max(0.0);
    highlight += radiance * blinn_phong(material.shininess, n, l, v);

    if let Some(spot) = &lighting.spot {
        if let Some((radiance, l)) = spot_radiance(spot, world_pos) {
            let radiance = radiance * visibility.spot;
            diffuse += radiance * n.dot(l).max(0.0);
            highlight += radiance * blinn_phong(material.shininess, n, l, v);
        }
    }

    material.base_color * diffuse + material.specular * highlight + material.emission()
}

/// Normalized Blinn-Phong lobe, already weighted by `n . l`.
fn blinn_phong(shininess: f32, n: Vec3, l: Vec3, v: Vec3) -> f32 {
    let n_dot_l = n.dot(l);
    if n_dot_l <= 0.0 {
        return 0.0;
    }
    let h = (l + v).normalize_or_zero();
    if h == Vec3::ZERO {
        return 0.0;
    }
    (shininess + 2.0) / 8.0 * n.dot(h).max(1e-4).powf(shininess) * n_dot_l
}

/// Light arriving from the spot and the unit direction toward it, or `None`
/// outside its range.
fn spot_radiance(spot: &SpotLight, world_pos: Vec3) -> Option<(Vec3, Vec3)> {
    let to_light = spot.position - world_pos;
    let distance = to_light.length();
    if distance <= f32::EPSILON || distance >= spot.range {
        return None;
    }
    let l = to_light / distance;
    let axis = (spot.target - spot.position).normalize_or_zero();

    let cos_outer = spot.angle.cos();
    let cos_inner = (spot.angle * (1.0 - spot.penumbra)).cos();
    let cone = smoothstep(cos_outer, cos_inner, (-l).dot(axis));
    let falloff = (1.0 - distance / spot.range).powf(spot.decay);

    Some((spot.color * spot.intensity * cone * falloff, l))
}

/// Hermite smoothstep; a zero-width window becomes a step.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x >= edge1 { 1.0 } else { 0.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelgrid_kernel::DirectionalLight;

    fn sun_only() -> Lighting {
        Lighting {
            ambient: Vec3::splat(0.2),
            sun: DirectionalLight {
                direction: Vec3::Y,
                color: Vec3::ONE,
                intensity: 0.8,
                cast_shadow: true,
            },
            spot: None,
        }
    }

    #[test]
    fn facing_the_sun_gets_full_light() {
        let color = shade(
            &Material::matte(Vec3::ONE),
            &sun_only(),
            Vec3::ZERO,
            Vec3::Y,
            Vec3::Y,
            Visibility::LIT,
        );
        assert!((color - Vec3::ONE).length() < 1e-6);
    }

    #[test]
    fn facing_away_gets_ambient_only() {
        let color = shade(
            &Material::matte(Vec3::ONE),
            &sun_only(),
            Vec3::ZERO,
            Vec3::NEG_Y,
            Vec3::Y,
            Visibility::LIT,
        );
        assert!((color - Vec3::splat(0.2)).length() < 1e-6);
    }

    #[test]
    fn emission_adds_on_top() {
        let mut material = Material::matte(Vec3::ZERO);
        material.emissive = Vec3::new(0.0, 0.5, 0.0);
        material.emissive_intensity = 1.0;
        let color = shade(
            &material,
            &sun_only(),
            Vec3::ZERO,
            Vec3::Y,
            Vec3::Y,
            Visibility::LIT,
        );
        assert_eq!(color, Vec3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn spot_lights_inside_cone_only() {
        let mut lighting = sun_only();
        lighting.ambient = Vec3::ZERO;
        lighting.sun.intensity = 0.0;
        lighting.spot = Some(SpotLight {
            position: Vec3::new(0.0, 2.0, 0.0),
            target: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
            angle: 0.2,
            penumbra: 0.1,
            decay: 2.0,
            cast_shadow: true,
        });
        let material = Material::matte(Vec3::ONE);
        let lit = shade(&material, &lighting, Vec3::ZERO, Vec3::Y, Vec3::Y, Visibility::LIT);
        let dark = shade(
            &material,
            &lighting,
            Vec3::new(1.5, 0.0, 0.0),
            Vec3::Y,
            Vec3::Y,
            Visibility::LIT,
        );
        assert!(lit.x > 0.0);
        assert_eq!(dark, Vec3::ZERO);

        let occluded = Visibility {
            sun: 1.0,
            spot: 0.0,
        };
        let shadowed = shade(&material, &lighting, Vec3::ZERO, Vec3::Y, Vec3::Y, occluded);
        assert_eq!(shadowed, Vec3::ZERO);
    }

    #[test]
    fn occluded_sun_leaves_ambient() {
        let occluded = Visibility {
            sun: 0.0,
            spot: 1.0,
        };
        let color = shade(
            &Material::matte(Vec3::ONE),
            &sun_only(),
            Vec3::ZERO,
            Vec3::Y,
            Vec3::Y,
            occluded,
        );
        assert!((color - Vec3::splat(0.2)).length() < 1e-6);
    }

    #[test]
    fn glossy_surface_shows_highlight_toward_the_viewer() {
        let mut lighting = sun_only();
        lighting.ambient = Vec3::ZERO;
        let matte = Material::matte(Vec3::splat(0.5));
        let glossy = Material::glossy(Vec3::splat(0.5), Vec3::ONE, 10.0);

        let flat = shade(&matte, &lighting, Vec3::ZERO, Vec3::Y, Vec3::Y, Visibility::LIT);
        let shiny = shade(&glossy, &lighting, Vec3::ZERO, Vec3::Y, Vec3::Y, Visibility::LIT);
        // Mirror direction: n . h = 1, lobe = (10 + 2) / 8 = 1.5.
        assert!((shiny.x - flat.x - 0.8 * 1.5).abs() < 1e-5);

        // Grazing view: the half vector leaves the normal and the lobe fades.
        let grazing = shade(&glossy, &lighting, Vec3::ZERO, Vec3::Y, Vec3::X, Visibility::LIT);
        assert!(grazing.x < shiny.x);
        assert!(grazing.x > flat.x);
    }

    #[test]
    fn smoothstep_edges() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert_eq!(smoothstep(1.0, 1.0, 1.0), 1.0);
    }
}
