/// A camera action produced by the desktop input mapping.
///
/// Controls consume actions, never raw window events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Rotate around the target by a pointer delta in device pixels.
    Orbit { dx: f32, dy: f32 },
    /// Slide the camera and target by a pointer delta in device pixels.
    Pan { dx: f32, dy: f32 },
    /// Zoom by wheel steps; positive zooms in.
    Zoom(f32),
    /// Return to the starting viewpoint.
    Reset,
    /// Show or hide the settings panel.
    TogglePanel,
    /// Pointer moved without producing a drag delta: no button held, or the
    /// first sample after entering the window.
    Noop,
}

impl Action {
    /// True for actions that move the camera.
    pub fn moves_camera(&self) -> bool {
        matches!(
            self,
            Action::Orbit { .. } | Action::Pan { .. } | Action::Zoom(_) | Action::Reset
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_actions_are_flagged() {
        assert!(Action::Orbit { dx: 1.0, dy: 0.0 }.moves_camera());
        assert!(Action::Zoom(-1.0).moves_camera());
        assert!(Action::Reset.moves_camera());
        assert!(!Action::TogglePanel.moves_camera());
        assert!(!Action::Noop.moves_camera());
    }
}
