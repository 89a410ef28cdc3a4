use serde::{Deserialize, Serialize};
use std::fmt;

/// RGBA color with f32 components in [0.0, 1.0] range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Create a new RGBA color.
    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque RGB color (alpha = 1.0).
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Convert to RGBA u8 values.
    pub fn to_rgba8(&self) -> [u8; 4] {
        [
            (self.r * 255.0).clamp(0.0, 255.0) as u8,
            (self.g * 255.0).clamp(0.0, 255.0) as u8,
            (self.b * 255.0).clamp(0.0, 255.0) as u8,
            (self.a * 255.0).clamp(0.0, 255.0) as u8,
        ]
    }

    /// The draw tint for a layer: rgb scaled by opacity, alpha = opacity.
    ///
    /// The layer's own alpha channel is intentionally not folded in on the
    /// quad path; it only participates in circle and text fills.
    pub fn quad_tint(&self, opacity: f32) -> Color {
        Color::rgba(
            self.r * opacity,
            self.g * opacity,
            self.b * opacity,
            opacity,
        )
    }

    /// The fill color for circle and text draws: rgba with alpha scaled
    /// by layer opacity.
    pub fn fill_tint(&self, opacity: f32) -> Color {
        Color::rgba(self.r, self.g, self.b, self.a * opacity)
    }

    /// Component-wise modulation of an RGBA8 sample by this color.
    pub fn modulate_rgba8(&self, sample: [u8; 4]) -> [u8; 4] {
        [
            (sample[0] as f32 * self.r.clamp(0.0, 1.0)) as u8,
            (sample[1] as f32 * self.g.clamp(0.0, 1.0)) as u8,
            (sample[2] as f32 * self.b.clamp(0.0, 1.0)) as u8,
            (sample[3] as f32 * self.a.clamp(0.0, 1.0)) as u8,
        ]
    }

    // --- Named constants ---

    pub const TRANSPARENT: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
    pub const RED: Color = Color {
        r: 1.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const GREEN: Color = Color {
        r: 0.0,
        g: 1.0,
        b: 0.0,
        a: 1.0,
    };
    pub const BLUE: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 1.0,
        a: 1.0,
    };
}

impl Default for Color {
    fn default() -> Self {
        Color::TRANSPARENT
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            write!(f, "#{:02X}{:02X}{:02X}", r, g, b)
        } else {
            write!(f, "#{:02X}{:02X}{:02X}{:02X}", r, g, b, a)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_rgba8_clamps() {
        let c = Color::rgba(2.0, -1.0, 0.5, 1.0);
        assert_eq!(c.to_rgba8(), [255, 0, 127, 255]);
    }

    #[test]
    fn test_quad_tint() {
        let c = Color::rgba(1.0, 0.5, 0.0, 0.25);
        let t = c.quad_tint(0.5);
        assert!((t.r - 0.5).abs() < 0.001);
        assert!((t.g - 0.25).abs() < 0.001);
        // Alpha is the opacity itself, not color_a * opacity.
        assert!((t.a - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_fill_tint() {
        let c = Color::rgba(1.0, 1.0, 1.0, 0.5);
        let t = c.fill_tint(0.5);
        assert!((t.a - 0.25).abs() < 0.001);
        assert!((t.r - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_color_display() {
        assert_eq!(format!("{}", Color::RED), "#FF0000");
        assert_eq!(format!("{}", Color::rgba(1.0, 0.0, 0.0, 0.5)), "#FF00007F");
    }
}
