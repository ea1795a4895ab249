use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// `#rrggbb` (leading `#` optional); `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        if s.len() != 6 || !s.is_ascii() {
            return None;
        }
        let c = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).ok();
        Some(Self::rgb(c(0)?, c(2)?, c(4)?))
    }

    /// Like [`Color::parse`], black when the string is not a color.
    pub fn hex(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::BLACK)
    }

    pub const fn with_alpha(mut self, a: f64) -> Self {
        self.a = a;
        self
    }

    pub fn to_svg_fill(&self) -> String {
        if (self.a - 1.0).abs() < 1e-6 {
            self.to_hex()
        } else {
            format!("rgba({},{},{},{:.3})", self.r, self.g, self.b, self.a)
        }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn lerp(a: Color, b: Color, t: f64) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |x: u8, y: u8| (x as f64 * (1.0 - t) + y as f64 * t).round() as u8;
        Color { r: mix(a.r, b.r), g: mix(a.g, b.g), b: mix(a.b, b.b), a: a.a * (1.0 - t) + b.a * t }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_svg_fill())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Color::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid color '{s}'")))
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

// --- Palettes ---

pub const CMS_PETROFF6: &[&str] =
    &["#5790fc", "#f89c20", "#e42536", "#964a8b", "#9c9ca1", "#7a21dd"];

pub const ATLAS_WONG: &[&str] =
    &["#0072b2", "#d55e00", "#56b4e9", "#e69f00", "#f0e442", "#009e73", "#cc79a7"];

pub const TABLEAU10: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

pub const TABLEAU20: &[&str] = &[
    "#1f77b4", "#aec7e8", "#ff7f0e", "#ffbb78", "#2ca02c", "#98df8a", "#d62728", "#ff9896",
    "#9467bd", "#c5b0d5", "#8c564b", "#c49c94", "#e377c2", "#f7b6d2", "#7f7f7f", "#c7c7c7",
    "#bcbd22", "#dbdb8d", "#17becf", "#9edae5",
];

pub fn palette_colors(name: &str) -> Vec<Color> {
    let strs = match name {
        "atlas_wong" => ATLAS_WONG,
        "tableau10" | "tab10" => TABLEAU10,
        "tableau20" | "tab20" => TABLEAU20,
        _ => CMS_PETROFF6,
    };
    strs.iter().map(|s| Color::hex(s)).collect()
}

/// Colors for `n` variation curves.
///
/// With `paired`, consecutive curves (up/down) share a color.
pub fn variation_colors(n: usize, paired: bool) -> Vec<String> {
    let distinct = if paired { n.div_ceil(2) } else { n };
    let table = if distinct < 10 { TABLEAU10 } else { TABLEAU20 };
    (0..n)
        .map(|i| {
            let k = if paired { i / 2 } else { i };
            table[k % table.len()].to_string()
        })
        .collect()
}

// --- Colormaps ---

/// Diverging blue-white-red map on `[-1, 1]`.
pub fn rdbu_r(val: f64) -> Color {
    let v = val.clamp(-1.0, 1.0);
    if v < 0.0 {
        Color::lerp(Color::WHITE, Color::hex("#2166ac"), -v)
    } else {
        Color::lerp(Color::WHITE, Color::hex("#b2182b"), v)
    }
}

const VIRIDIS: [&str; 5] = ["#440154", "#3b528b", "#21918c", "#5ec962", "#fde725"];

/// Sequential map on `[0, 1]`.
pub fn viridis(t: f64) -> Color {
    let t = t.clamp(0.0, 1.0) * (VIRIDIS.len() - 1) as f64;
    let i = (t.floor() as usize).min(VIRIDIS.len() - 2);
    Color::lerp(Color::hex(VIRIDIS[i]), Color::hex(VIRIDIS[i + 1]), t - i as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing() {
        let c = Color::hex("#1D4ED8");
        assert_eq!((c.r, c.g, c.b), (0x1D, 0x4E, 0xD8));
        assert!(Color::parse("#12").is_none());
        assert!(Color::parse("#zzzzzz").is_none());
        assert_eq!(Color::hex("garbage"), Color::BLACK);
    }

    #[test]
    fn svg_fill_alpha() {
        let c = Color::rgb(29, 78, 216).with_alpha(0.5);
        assert_eq!(c.to_svg_fill(), "rgba(29,78,216,0.500)");
        assert_eq!(Color::rgb(29, 78, 216).to_svg_fill(), "#1d4ed8");
    }

    #[test]
    fn paired_variation_colors() {
        let c = variation_colors(4, true);
        assert_eq!(c[0], c[1]);
        assert_ne!(c[1], c[2]);
        assert_eq!(variation_colors(12, false)[11], TABLEAU20[11]);
    }

    #[test]
    fn colormap_ends() {
        assert_eq!(viridis(0.0).to_hex(), "#440154");
        assert_eq!(viridis(1.0).to_hex(), "#fde725");
        assert_eq!(rdbu_r(0.0), Color::WHITE);
        assert!(rdbu_r(-1.0).b > rdbu_r(-1.0).r);
    }
}
