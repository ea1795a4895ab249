//! Paint descriptions shared by the canvas, the layout helpers and the plots.
//!
//! Each type knows how to emit its own SVG presentation attributes, so the
//! canvas only writes geometry.

use std::fmt::{self, Write};

use crate::color::Color;

/// Fill and outline for closed shapes.
#[derive(Debug, Clone)]
pub struct Style {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub stroke_width: f64,
    pub opacity: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self { fill: None, stroke: None, stroke_width: 1.0, opacity: 1.0 }
    }
}

impl Style {
    pub fn filled(color: Color) -> Self {
        Self { fill: Some(color), ..Self::default() }
    }

    pub fn stroked(color: Color, width: f64) -> Self {
        Self { stroke: Some(color), stroke_width: width, ..Self::default() }
    }

    pub(crate) fn write_svg_attrs(&self, out: &mut String) -> fmt::Result {
        match self.fill {
            Some(c) => write!(out, r#" fill="{}""#, c.to_svg_fill())?,
            None => out.push_str(r#" fill="none""#),
        }
        if let Some(c) = self.stroke {
            write!(out, r#" stroke="{}" stroke-width="{:.2}""#, c.to_svg_fill(), self.stroke_width)?;
        }
        if (self.opacity - 1.0).abs() > 1e-4 {
            write!(out, r#" opacity="{:.3}""#, self.opacity)?;
        }
        Ok(())
    }
}

/// Stroke dash patterns, in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dash {
    Dashed,
    Dotted,
    DashDot,
    /// Short even dashes for grid lines.
    Fine,
}

impl Dash {
    pub fn pattern(self) -> &'static str {
        match self {
            Dash::Dashed => "6 3",
            Dash::Dotted => "2 2",
            Dash::DashDot => "6 2 2 2",
            Dash::Fine => "3 3",
        }
    }

    /// Matplotlib linestyle names and shorthands; `None` for solid or unknown.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "--" | "dashed" => Some(Dash::Dashed),
            ":" | "dotted" => Some(Dash::Dotted),
            "-." | "dashdot" => Some(Dash::DashDot),
            _ => None,
        }
    }
}

/// Open strokes: lines, polylines and error bars.
#[derive(Debug, Clone)]
pub struct LineStyle {
    pub color: Color,
    pub width: f64,
    pub dash: Option<Dash>,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self::solid(Color::BLACK, 1.0)
    }
}

impl LineStyle {
    pub fn solid(color: Color, width: f64) -> Self {
        Self { color, width, dash: None }
    }

    pub fn dashed(color: Color, width: f64) -> Self {
        Self { dash: Some(Dash::Dashed), ..Self::solid(color, width) }
    }

    pub fn from_shorthand(s: Option<&str>, color: Color, width: f64) -> Self {
        Self { dash: s.and_then(Dash::parse), ..Self::solid(color, width) }
    }

    pub(crate) fn write_svg_attrs(&self, out: &mut String) -> fmt::Result {
        write!(out, r#" stroke="{}" stroke-width="{:.2}""#, self.color.to_svg_fill(), self.width)?;
        if let Some(d) = self.dash {
            write!(out, r#" stroke-dasharray="{}""#, d.pattern())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontWeight {
    #[default]
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// Horizontal alignment relative to the text origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAnchor {
    #[default]
    Start,
    Middle,
    End,
}

impl TextAnchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextAnchor::Start => "start",
            TextAnchor::Middle => "middle",
            TextAnchor::End => "end",
        }
    }
}

/// Vertical alignment relative to the text origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextBaseline {
    #[default]
    Alphabetic,
    Central,
    Hanging,
}

impl TextBaseline {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextBaseline::Alphabetic => "auto",
            TextBaseline::Central => "central",
            TextBaseline::Hanging => "hanging",
        }
    }
}

pub const FONT_FAMILY: &str = "Helvetica, Arial, sans-serif";

#[derive(Debug, Clone)]
pub struct TextStyle {
    pub size: f64,
    pub color: Color,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub anchor: TextAnchor,
    pub baseline: TextBaseline,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 10.0,
            color: Color::BLACK,
            weight: FontWeight::default(),
            style: FontStyle::default(),
            anchor: TextAnchor::default(),
            baseline: TextBaseline::default(),
        }
    }
}

impl TextStyle {
    pub(crate) fn write_svg_attrs(&self, out: &mut String) -> fmt::Result {
        write!(
            out,
            r#" font-family="{FONT_FAMILY}" font-size="{:.1}" fill="{}" text-anchor="{}" dominant-baseline="{}""#,
            self.size,
            self.color.to_svg_fill(),
            self.anchor.as_str(),
            self.baseline.as_str(),
        )?;
        if self.weight == FontWeight::Bold {
            out.push_str(r#" font-weight="bold""#);
        }
        if self.style == FontStyle::Italic {
            out.push_str(r#" font-style="italic""#);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerShape {
    #[default]
    Circle,
    Square,
}

/// Data-point marker. `size` is the radius (half side for squares).
#[derive(Debug, Clone)]
pub struct MarkerStyle {
    pub shape: MarkerShape,
    pub size: f64,
    pub color: Color,
    pub fill: bool,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self { shape: MarkerShape::default(), size: 3.0, color: Color::BLACK, fill: true }
    }
}

impl MarkerStyle {
    /// Paint for the marker body: solid, or hollow with a white face.
    pub fn paint(&self) -> Style {
        if self.fill {
            Style { fill: Some(self.color), stroke: Some(self.color), stroke_width: 0.5, opacity: 1.0 }
        } else {
            Style { fill: Some(Color::WHITE), stroke: Some(self.color), stroke_width: 1.0, opacity: 1.0 }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_maps_to_dash() {
        assert_eq!(LineStyle::from_shorthand(Some("--"), Color::BLACK, 1.0).dash, Some(Dash::Dashed));
        assert_eq!(LineStyle::from_shorthand(Some(":"), Color::BLACK, 1.0).dash, Some(Dash::Dotted));
        assert_eq!(LineStyle::from_shorthand(Some("-"), Color::BLACK, 1.0).dash, None);
        assert_eq!(LineStyle::from_shorthand(None, Color::BLACK, 1.0).dash, None);
    }

    #[test]
    fn text_attrs() {
        let mut s = String::new();
        TextStyle { weight: FontWeight::Bold, anchor: TextAnchor::End, ..TextStyle::default() }
            .write_svg_attrs(&mut s)
            .unwrap();
        assert!(s.contains(r#"text-anchor="end""#));
        assert!(s.contains(r#"font-weight="bold""#));
        assert!(!s.contains("font-style"));
    }

    #[test]
    fn unfilled_style_has_no_fill() {
        let mut s = String::new();
        Style::stroked(Color::BLACK, 2.0).write_svg_attrs(&mut s).unwrap();
        assert!(s.starts_with(r#" fill="none""#));
        assert!(s.contains(r#"stroke-width="2.00""#));
    }
}
