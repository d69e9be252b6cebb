use crate::RenderError;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;

/// Allowed pixel block sizes, in screen pixels per block edge.
pub const BLOCK_SIZE_RANGE: RangeInclusive<u32> = 1..=16;
/// Allowed normal edge strengths.
pub const NORMAL_EDGE_RANGE: RangeInclusive<f32> = 0.0..=2.0;
/// Allowed depth edge strengths.
pub const DEPTH_EDGE_RANGE: RangeInclusive<f32> = 0.0..=1.0;
/// Slider step for both edge strengths.
pub const EDGE_STRENGTH_STEP: f64 = 0.05;

/// Live pixelation settings, sampled once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelationConfig {
    pub pixel_block_size: u32,
    pub normal_edge_strength: f32,
    pub depth_edge_strength: f32,
    pub pixel_aligned_panning: bool,
}

impl Default for PixelationConfig {
    fn default() -> Self {
        Self {
            pixel_block_size: 6,
            normal_edge_strength: 0.3,
            depth_edge_strength: 0.4,
            pixel_aligned_panning: true,
        }
    }
}

impl PixelationConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, RenderError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Report every field that lies outside its allowed range.
    pub fn validate(&self) -> Vec<RenderError> {
        let mut issues = Vec::new();
        if !BLOCK_SIZE_RANGE.contains(&self.pixel_block_size) {
            issues.push(RenderError::ConfigurationOutOfRange {
                field: "pixel_block_size",
                value: f64::from(self.pixel_block_size),
                min: f64::from(*BLOCK_SIZE_RANGE.start()),
                max: f64::from(*BLOCK_SIZE_RANGE.end()),
            });
        }
        for (field, value, range) in [
            ("normal_edge_strength", self.normal_edge_strength, NORMAL_EDGE_RANGE),
            ("depth_edge_strength", self.depth_edge_strength, DEPTH_EDGE_RANGE),
        ] {
            if !range.contains(&value) {
                issues.push(RenderError::ConfigurationOutOfRange {
                    field,
                    value: f64::from(value),
                    min: f64::from(*range.start()),
                    max: f64::from(*range.end()),
                });
            }
        }
        issues
    }

    /// Clamp every field into its allowed range. Returns true if anything
    /// changed. Out-of-range values are a normal occurrence for a live
    /// control, so they are only logged at debug level.
    pub fn sanitize(&mut self) -> bool {
        let issues = self.validate();
        if issues.is_empty() {
            return false;
        }
        for issue in &issues {
            tracing::debug!("clamping config: {issue}");
        }
        self.pixel_block_size = self
            .pixel_block_size
            .clamp(*BLOCK_SIZE_RANGE.start(), *BLOCK_SIZE_RANGE.end());
        self.normal_edge_strength = clamp_strength(self.normal_edge_strength, NORMAL_EDGE_RANGE);
        self.depth_edge_strength = clamp_strength(self.depth_edge_strength, DEPTH_EDGE_RANGE);
        true
    }

    /// A sanitized copy.
    pub fn sanitized(mut self) -> Self {
        self.sanitize();
        self
    }
}

fn clamp_strength(value: f32, range: RangeInclusive<f32>) -> f32 {
    if value.is_nan() {
        *range.start()
    } else {
        value.clamp(*range.start(), *range.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = PixelationConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.pixel_block_size, 6);
        assert!(config.pixel_aligned_panning);
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let mut config = PixelationConfig {
            pixel_block_size: 0,
            normal_edge_strength: 5.0,
            depth_edge_strength: -1.0,
            pixel_aligned_panning: false,
        };
        assert_eq!(config.validate().len(), 3);
        assert!(config.sanitize());
        assert_eq!(config.pixel_block_size, 1);
        assert_eq!(config.normal_edge_strength, 2.0);
        assert_eq!(config.depth_edge_strength, 0.0);
        assert!(!config.sanitize());
    }

    #[test]
    fn sanitize_replaces_nan() {
        let config = PixelationConfig {
            depth_edge_strength: f32::NAN,
            ..PixelationConfig::default()
        }
        .sanitized();
        assert_eq!(config.depth_edge_strength, 0.0);
    }

    #[test]
    fn block_size_above_range_is_clamped() {
        let config = PixelationConfig {
            pixel_block_size: 40,
            ..PixelationConfig::default()
        }
        .sanitized();
        assert_eq!(config.pixel_block_size, 16);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = PixelationConfig::from_json(r#"{ "pixel_block_size": 3 }"#).unwrap();
        assert_eq!(config.pixel_block_size, 3);
        assert_eq!(config.depth_edge_strength, 0.4);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = PixelationConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, RenderError::Json(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "pixel_block_size": 8, "pixel_aligned_panning": false }}"#
        )
        .unwrap();
        let config = PixelationConfig::load(file.path()).unwrap();
        assert_eq!(config.pixel_block_size, 8);
        assert!(!config.pixel_aligned_panning);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PixelationConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, RenderError::Io(_)));
    }
}
