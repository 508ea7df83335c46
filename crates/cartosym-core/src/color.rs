use serde::{Deserialize, Serialize};

/// RGBA color used by symbol layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for Color {
    fn default() -> Self {
        Self {
            r: 128,
            g: 128,
            b: 128,
            a: 255,
        }
    }
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    /// Default highlight for selected features.
    pub const SELECTION: Color = Color::rgba(255, 255, 0, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Scale the alpha channel by `opacity` (clamped to [0, 1]).
    pub fn with_opacity(&self, opacity: f64) -> Self {
        let opacity = opacity.clamp(0.0, 1.0);
        Self {
            a: (self.a as f64 * opacity).round() as u8,
            ..*self
        }
    }

    pub fn with_alpha(&self, a: u8) -> Self {
        Self { a, ..*self }
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    pub fn to_f32_array(&self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    /// `"r,g,b,a"` form used in dumps and expression variables.
    pub fn encode(&self) -> String {
        format!("{},{},{},{}", self.r, self.g, self.b, self.a)
    }

    /// Parse either `"r,g,b[,a]"` or `"#rrggbb[aa]"`.
    pub fn decode(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix('#') {
            let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
            return match hex.len() {
                6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
                8 => Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
                _ => None,
            };
        }
        let parts: Vec<u8> = value
            .split(',')
            .map(|p| p.trim().parse::<u8>())
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [r, g, b] => Some(Color::rgb(*r, *g, *b)),
            [r, g, b, a] => Some(Color::rgba(*r, *g, *b, *a)),
            _ => None,
        }
    }

    /// Hex form without alpha, as SVG expects.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_opacity_scales_alpha() {
        let c = Color::rgba(10, 20, 30, 200).with_opacity(0.5);
        assert_eq!(c.a, 100);
        assert_eq!(c.r, 10);
    }

    #[test]
    fn test_decode_forms() {
        assert_eq!(Color::decode("255,0,0"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(Color::decode("1, 2, 3, 4"), Some(Color::rgba(1, 2, 3, 4)));
        assert_eq!(Color::decode("#00ff0080"), Some(Color::rgba(0, 255, 0, 128)));
        assert_eq!(Color::decode("red"), None);
    }

    #[test]
    fn test_encode_matches_decode() {
        let c = Color::rgba(12, 34, 56, 78);
        assert_eq!(Color::decode(&c.encode()), Some(c));
    }
}
