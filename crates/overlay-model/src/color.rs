/// Normalized RGB triple (each channel in 0.0..=1.0) as handed to the mutator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor { r: 0.0, g: 0.0, b: 0.0 };

    pub fn from_bytes(r: u8, g: u8, b: u8) -> Self {
        Self { r: r as f32 / 255.0, g: g as f32 / 255.0, b: b as f32 / 255.0 }
    }

    /// Back to 8-bit channels, used when painting previews.
    pub fn to_bytes(self) -> [u8; 3] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
        ]
    }
}

/// Parses `#rrggbb` or `rrggbb`.
pub fn parse_hex_color(value: &str) -> Option<RgbColor> {
    let hex = value.trim().strip_prefix('#').unwrap_or(value.trim());
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();

    Some(RgbColor::from_bytes(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Resolves a user-supplied color, falling back to black for malformed input.
pub fn resolve_color(value: &str) -> RgbColor {
    parse_hex_color(value).unwrap_or(RgbColor::BLACK)
}
