//! Scene kernel: the renderable scene, its lights, and time-driven animation.
//!
//! # Invariants
//! - Animated state is a pure function of elapsed time; nothing accumulates
//!   across frames except the clock.
//! - Object iteration order is stable (BTreeMap).

pub mod anim;
pub mod clock;
pub mod scene;
mod showcase;

pub use anim::{Animate, CrystalMotion, CrystalPose, stop_go_eased};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use scene::{
    DirectionalLight, Lighting, Material, Scene, SceneObject, ShadowFlags, Shape, SpotLight,
};
pub use showcase::Showcase;
