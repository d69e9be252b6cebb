//! Time-driven animation. Every pose is a pure function of elapsed seconds.

use crate::scene::SceneObject;
use glam::Quat;
use std::f64::consts::TAU;

/// Smooth cubic ease with zero slope at both ends: `3x^2 - 2x^3`.
pub fn ease_in_out_cubic(x: f64) -> f64 {
    x * x * 3.0 - x * x * x * 2.0
}

/// Linear ramp from 0 at `edge0` to 1 at `edge1`, clamped to [0, 1].
///
/// A non-positive window degenerates to a step at `edge1`.
pub fn linear_step(x: f64, edge0: f64, edge1: f64) -> f64 {
    let width = edge1 - edge0;
    if width <= 0.0 {
        return if x >= edge1 { 1.0 } else { 0.0 };
    }
    ((x - edge0) / width).clamp(0.0, 1.0)
}

/// Cyclic stop-and-go progress.
///
/// Holds flat for the first `downtime` seconds of every `period`, then sweeps
/// smoothly to the next integer. The result lands exactly on `n` at `t = n * period`.
pub fn stop_go_eased(t: f64, downtime: f64, period: f64) -> f64 {
    debug_assert!(period > 0.0, "period must be positive");
    debug_assert!(
        (0.0..period).contains(&downtime),
        "downtime must lie in [0, period)"
    );
    let cycle = (t / period).floor();
    let tween = t - cycle * period;
    cycle + ease_in_out_cubic(linear_step(tween, downtime, period))
}

/// An entity whose state is recomputed from the clock every frame.
pub trait Animate {
    fn apply(&self, t: f64, object: &mut SceneObject);
}

/// Pose of the crystal at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrystalPose {
    pub height: f32,
    pub rotation_y: f32,
    pub emissive_intensity: f32,
}

/// The floating crystal: bobs, pulses its glow, and spins one full turn per
/// period after a pause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrystalMotion {
    pub base_height: f64,
    pub bob_amplitude: f64,
    pub bob_rate: f64,
    pub glow_rate: f64,
    pub spin_downtime: f64,
    pub spin_period: f64,
}

impl Default for CrystalMotion {
    fn default() -> Self {
        Self {
            base_height: 0.7,
            bob_amplitude: 0.05,
            bob_rate: 2.0,
            glow_rate: 3.0,
            spin_downtime: 2.0,
            spin_period: 4.0,
        }
    }
}

impl CrystalMotion {
    pub fn pose_at(&self, t: f64) -> CrystalPose {
        let turns = stop_go_eased(t, self.spin_downtime, self.spin_period);
        CrystalPose {
            height: (self.base_height + (t * self.bob_rate).sin() * self.bob_amplitude) as f32,
            // Whole turns are dropped before narrowing so long sessions keep precision.
            rotation_y: (turns.fract() * TAU) as f32,
            emissive_intensity: ((t * self.glow_rate).sin() * 0.5 + 0.5) as f32,
        }
    }
}

impl Animate for CrystalMotion {
    fn apply(&self, t: f64, object: &mut SceneObject) {
        let pose = self.pose_at(t);
        object.transform.position.y = pose.height;
        object.transform.rotation = Quat::from_rotation_y(pose.rotation_y);
        object.material.emissive_intensity = pose.emissive_intensity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Material, ShadowFlags, Shape};
    use glam::Vec3;
    use pixelgrid_common::Transform;

    #[test]
    fn ease_endpoints_and_midpoint() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert_eq!(ease_in_out_cubic(0.5), 0.5);
    }

    #[test]
    fn linear_step_clamps() {
        assert_eq!(linear_step(-1.0, 2.0, 4.0), 0.0);
        assert_eq!(linear_step(2.0, 2.0, 4.0), 0.0);
        assert_eq!(linear_step(3.0, 2.0, 4.0), 0.5);
        assert_eq!(linear_step(9.0, 2.0, 4.0), 1.0);
    }

    #[test]
    fn linear_step_degenerate_window_is_a_step() {
        assert_eq!(linear_step(0.9, 1.0, 1.0), 0.0);
        assert_eq!(linear_step(1.0, 1.0, 1.0), 1.0);
    }

    #[test]
    fn lands_on_integer_at_period_boundaries() {
        for &(downtime, period) in &[(2.0, 4.0), (0.0, 1.0), (0.5, 2.0), (1.0, 3.0), (0.0, 0.25)] {
            for cycle in 0..50u32 {
                let t = f64::from(cycle) * period;
                let v = stop_go_eased(t, downtime, period);
                assert!(
                    (v - f64::from(cycle)).abs() < 1e-9,
                    "downtime={downtime} period={period} cycle={cycle} got {v}"
                );
            }
        }
        // Power-of-two periods are exact.
        assert_eq!(stop_go_eased(12.0, 2.0, 4.0), 3.0);
    }

    #[test]
    fn monotonically_non_decreasing() {
        for &(downtime, period) in &[(2.0, 4.0), (0.0, 1.5), (0.9, 1.0)] {
            let mut previous = stop_go_eased(0.0, downtime, period);
            for step in 1..4000 {
                let t = f64::from(step) * 0.003;
                let v = stop_go_eased(t, downtime, period);
                assert!(v >= previous, "decreased at t={t}: {previous} -> {v}");
                previous = v;
            }
        }
    }

    #[test]
    fn holds_flat_during_downtime() {
        assert_eq!(stop_go_eased(4.5, 2.0, 4.0), 1.0);
        assert_eq!(stop_go_eased(5.9, 2.0, 4.0), 1.0);
        assert!(stop_go_eased(6.5, 2.0, 4.0) > 1.0);
    }

    #[test]
    fn zero_downtime_is_plain_ease() {
        let period = 2.5;
        for step in 0..200 {
            let t = f64::from(step) * 0.07;
            let cycle = (t / period).floor();
            let tween = t - cycle * period;
            let expected = cycle + ease_in_out_cubic(tween / period);
            assert!((stop_go_eased(t, 0.0, period) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn crystal_pose_at_zero() {
        let pose = CrystalMotion::default().pose_at(0.0);
        assert!((pose.height - 0.7).abs() < 1e-6);
        assert_eq!(pose.rotation_y, 0.0);
        assert!((pose.emissive_intensity - 0.5).abs() < 1e-6);
    }

    #[test]
    fn crystal_spins_half_turn_mid_sweep() {
        // Halfway through the sweep window of the first period.
        let pose = CrystalMotion::default().pose_at(3.0);
        assert!((pose.rotation_y - std::f32::consts::PI).abs() < 1e-5);
    }

    #[test]
    fn crystal_glow_stays_in_unit_range() {
        let motion = CrystalMotion::default();
        for step in 0..500 {
            let pose = motion.pose_at(f64::from(step) * 0.037);
            assert!((0.0..=1.0).contains(&pose.emissive_intensity));
            assert!((pose.height - 0.7).abs() <= 0.05 + 1e-6);
        }
    }

    #[test]
    fn apply_writes_transform_and_material() {
        let mut object = SceneObject {
            shape: Shape::Icosahedron { radius: 0.2 },
            material: Material::matte(Vec3::ONE),
            transform: Transform::default(),
            shadows: ShadowFlags::ALL,
        };
        let motion = CrystalMotion::default();
        motion.apply(1.0, &mut object);
        let pose = motion.pose_at(1.0);
        assert_eq!(object.transform.position.y, pose.height);
        assert_eq!(object.material.emissive_intensity, pose.emissive_intensity);
    }
}
