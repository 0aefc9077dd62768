use serde::{Deserialize, Serialize};
use std::fmt;

/// Straight-alpha RGBA colour, components in `[0, 1]`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Channels are clamped into range.
    pub fn from_rgba8(r: f64, g: f64, b: f64, a: f64) -> Self {
        let c = |v: f64| (v / 255.0).clamp(0.0, 1.0);
        Self::rgba(c(r), c(g), c(b), a.clamp(0.0, 1.0))
    }

    pub fn gray(level: f64) -> Self {
        let l = level.clamp(0.0, 1.0);
        Self::rgba(l, l, l, 1.0)
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
    pub fn from_hex(text: &str) -> Option<Self> {
        let hex = text.strip_prefix('#').unwrap_or(text);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f64 / 255.0);
        match hex.len() {
            3 => {
                let mut out = [0.0; 3];
                for (i, ch) in hex.chars().enumerate() {
                    let doubled: String = [ch, ch].iter().collect();
                    out[i] = channel(&doubled)?;
                }
                Some(Self::rgba(out[0], out[1], out[2], 1.0))
            }
            6 | 8 => {
                let r = channel(&hex[0..2])?;
                let g = channel(&hex[2..4])?;
                let b = channel(&hex[4..6])?;
                let a = if hex.len() == 8 { channel(&hex[6..8])? } else { 1.0 };
                Some(Self::rgba(r, g, b, a))
            }
            _ => None,
        }
    }

    pub fn named(name: &str) -> Option<Self> {
        let color = match name {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::rgba(1.0, 0.0, 0.0, 1.0),
            "green" => Self::rgba(0.0, 0.5, 0.0, 1.0),
            "blue" => Self::rgba(0.0, 0.0, 1.0, 1.0),
            "gray" | "grey" => Self::gray(0.5),
            "transparent" => Self::TRANSPARENT,
            _ => return None,
        };
        Some(color)
    }

    pub fn with_alpha(self, a: f64) -> Self {
        Self { a: a.clamp(0.0, 1.0), ..self }
    }

    pub fn is_transparent(self) -> bool {
        self.a <= 0.0
    }

    pub fn to_hex(self) -> String {
        let byte = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        if self.a >= 1.0 {
            format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
        } else {
            format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                byte(self.r),
                byte(self.g),
                byte(self.b),
                byte(self.a)
            )
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
