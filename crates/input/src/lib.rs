//! Camera input: pointer gestures mapped to actions, and orbit controls that
//! apply them to the orthographic camera.
//!
//! # Invariants
//! - Controls move the camera; they never touch the frustum bounds.
//! - Zoom stays within `[min_zoom, max_zoom]`.

pub mod action;
pub mod orbit;

pub use action::Action;
pub use orbit::OrbitControls;
