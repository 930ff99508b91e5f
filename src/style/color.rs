//! RGBA colors

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// `0xRRGGBB`, fully opaque
    pub const fn hex(rgb: u32) -> Self {
        Self::rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    /// Alpha as a fraction in [0, 1]
    pub fn with_alpha(self, alpha: f32) -> Self {
        Self { a: (alpha.clamp(0.0, 1.0) * 255.0).round() as u8, ..self }
    }

    /// Scale each RGB channel by `1 - amount`
    pub fn darken(self, amount: f32) -> Self {
        let k = 1.0 - amount.clamp(0.0, 1.0);
        self.map_rgb(|c| c as f32 * k)
    }

    /// Move each RGB channel toward 255 by `amount`
    pub fn lighten(self, amount: f32) -> Self {
        let k = amount.clamp(0.0, 1.0);
        self.map_rgb(|c| c as f32 + (255.0 - c as f32) * k)
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    fn map_rgb(self, f: impl Fn(u8) -> f32) -> Self {
        let channel = |c| f(c).round().clamp(0.0, 255.0) as u8;
        Self { r: channel(self.r), g: channel(self.g), b: channel(self.b), a: self.a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_darken() {
        assert_eq!(Color::rgb(200, 100, 0).darken(0.3), Color::rgb(140, 70, 0));
        assert_eq!(Color::rgb(10, 20, 30).darken(0.0), Color::rgb(10, 20, 30));
    }

    #[test]
    fn test_lighten() {
        assert_eq!(Color::rgb(55, 255, 0).lighten(0.3), Color::rgb(115, 255, 77));
        assert_eq!(Color::rgb(0, 0, 0).lighten(1.0), Color::WHITE);
    }

    #[test]
    fn test_alpha_preserved() {
        let c = Color::rgba(100, 100, 100, 40);
        assert_eq!(c.darken(0.5).a, 40);
        assert_eq!(c.with_alpha(1.0).a, 255);
    }

    #[test]
    fn test_hex() {
        assert_eq!(Color::hex(0xe8924a), Color::rgb(0xe8, 0x92, 0x4a));
    }
}
