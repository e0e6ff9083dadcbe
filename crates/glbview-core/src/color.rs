//! `#rrggbb` colors and HSL blending

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ColorError {
    #[error("Invalid hex color: {0}")]
    InvalidHex(String),
}

/// 8-bit sRGB color written as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor(pub [u8; 3]);

impl HexColor {
    pub const WHITE: HexColor = HexColor([0xff, 0xff, 0xff]);
    pub const BLACK: HexColor = HexColor([0, 0, 0]);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Parse `#rrggbb` or `#rgb` (leading `#` optional)
    pub fn parse(s: &str) -> Result<Self, ColorError> {
        let err = || ColorError::InvalidHex(s.to_string());
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(err());
        }
        let channel = |i: usize, len: usize| -> Result<u8, ColorError> {
            let digits = &hex[i * len..(i + 1) * len];
            let v = u8::from_str_radix(digits, 16).map_err(|_| err())?;
            Ok(if len == 1 { v * 17 } else { v })
        };
        match hex.len() {
            6 => Ok(Self([channel(0, 2)?, channel(1, 2)?, channel(2, 2)?])),
            3 => Ok(Self([channel(0, 1)?, channel(1, 1)?, channel(2, 1)?])),
            _ => Err(err()),
        }
    }

    /// Channels as 0..1 floats
    pub fn to_rgb_f32(&self) -> [f32; 3] {
        self.0.map(|c| c as f32 / 255.0)
    }

    pub fn from_rgb_f32(rgb: [f32; 3]) -> Self {
        Self(rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
    }

    /// Hue, saturation, lightness, each in 0..1
    pub fn to_hsl(&self) -> [f32; 3] {
        rgb_to_hsl(self.to_rgb_f32())
    }

    pub fn from_hsl(hsl: [f32; 3]) -> Self {
        Self::from_rgb_f32(hsl_to_rgb(hsl))
    }
}

impl Default for HexColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl FromStr for HexColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        HexColor::parse(&s).map_err(serde::de::Error::custom)
    }
}

pub fn rgb_to_hsl([r, g, b]: [f32; 3]) -> [f32; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let lightness = (min + max) / 2.0;
    if (max - min).abs() < f32::EPSILON {
        return [0.0, 0.0, lightness];
    }
    let delta = max - min;
    let saturation = if lightness <= 0.5 {
        delta / (max + min)
    } else {
        delta / (2.0 - max - min)
    };
    let hue = if max == r {
        (g - b) / delta + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };
    [hue / 6.0, saturation, lightness]
}

pub fn hsl_to_rgb([h, s, l]: [f32; 3]) -> [f32; 3] {
    let h = h.rem_euclid(1.0);
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);
    if s == 0.0 {
        return [l, l, l];
    }
    let p = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let q = 2.0 * l - p;
    [
        hue_to_channel(q, p, h + 1.0 / 3.0),
        hue_to_channel(q, p, h),
        hue_to_channel(q, p, h - 1.0 / 3.0),
    ]
}

fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * 6.0 * (2.0 / 3.0 - t)
    } else {
        p
    }
}

/// Interpolate hue along the shorter way around the circle
pub fn lerp_hue(a: f32, b: f32, t: f32) -> f32 {
    let mut delta = b - a;
    if delta > 0.5 {
        delta -= 1.0;
    }
    if delta < -0.5 {
        delta += 1.0;
    }
    let mut next = a + delta * t;
    if next < 0.0 {
        next += 1.0;
    }
    if next > 1.0 {
        next -= 1.0;
    }
    next
}

/// Blend two colors in HSL space. The endpoints are returned exactly.
pub fn lerp_hsl(a: HexColor, b: HexColor, t: f32) -> HexColor {
    if t <= 0.0 {
        return a;
    }
    if t >= 1.0 {
        return b;
    }
    let [ha, sa, la] = a.to_hsl();
    let [hb, sb, lb] = b.to_hsl();
    HexColor::from_hsl([lerp_hue(ha, hb, t), sa + (sb - sa) * t, la + (lb - la) * t])
}
