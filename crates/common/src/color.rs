//! Color-space helpers. All shading happens in linear RGB; hex colors are
//! authored in sRGB.

use glam::Vec3;

/// Decode one sRGB-encoded channel to linear.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Encode one linear channel to sRGB.
pub fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Linear color from a `0xRRGGBB` sRGB hex literal.
pub fn hex(rgb: u32) -> Vec3 {
    let channel = |shift: u32| srgb_to_linear(((rgb >> shift) & 0xff) as f32 / 255.0);
    Vec3::new(channel(16), channel(8), channel(0))
}

/// Encode a linear color to 8-bit sRGB.
pub fn to_srgb8(linear: Vec3) -> [u8; 3] {
    let q = |c: f32| (linear_to_srgb(c) * 255.0).round() as u8;
    [q(linear.x), q(linear.y), q(linear.z)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extremes_are_fixed_points() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
        assert_eq!(linear_to_srgb(0.0), 0.0);
        assert!((linear_to_srgb(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn hex_white_and_black() {
        assert_eq!(to_srgb8(hex(0xffffff)), [255, 255, 255]);
        assert_eq!(to_srgb8(hex(0x000000)), [0, 0, 0]);
    }

    #[test]
    fn encode_decode_preserves_8bit_values() {
        assert_eq!(to_srgb8(hex(0x151729)), [0x15, 0x17, 0x29]);
        assert_eq!(to_srgb8(hex(0x8ac165)), [0x8a, 0xc1, 0x65]);
    }

    #[test]
    fn out_of_range_linear_is_clamped() {
        assert_eq!(to_srgb8(Vec3::new(4.0, -1.0, 0.5))[..2], [255, 0]);
    }
}
