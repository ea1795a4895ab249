use std::fmt::{self, Write};

use crate::color::Color;
use crate::primitives::*;
use crate::text::{TextMetrics, measure_text};

/// SVG canvas that serializes each primitive as it is drawn.
///
/// Coordinates are points (1pt = 1/72") with the origin at the top left.
/// Clip regions open a `<g clip-path>` group that [`Canvas::pop_clip`]
/// closes; anything still open is closed by [`Canvas::finish_svg`].
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    body: String,
    defs: Vec<String>,
    open_clips: usize,
    ids: usize,
}

/// Flip negative extents so the rectangle is valid SVG.
fn normalize(x: f64, y: f64, w: f64, h: f64) -> (f64, f64, f64, f64) {
    let (x, w) = if w < 0.0 { (x + w, -w) } else { (x, w) };
    let (y, h) = if h < 0.0 { (y + h, -h) } else { (y, h) };
    (x, y, w, h)
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> crate::Result<Self> {
        if !(width > 0.0 && height > 0.0) {
            return Err(crate::RenderError::Layout(format!("canvas size {width}x{height}")));
        }
        Ok(Self { width, height, body: String::with_capacity(16 * 1024), defs: Vec::new(), open_clips: 0, ids: 0 })
    }

    fn emit(&mut self, args: fmt::Arguments<'_>) {
        // writing into a String cannot fail
        let _ = self.body.write_fmt(args);
    }

    fn close_shape(&mut self, style: &Style) {
        let _ = style.write_svg_attrs(&mut self.body);
        self.body.push_str("/>\n");
    }

    fn close_stroke(&mut self, style: &LineStyle) {
        let _ = style.write_svg_attrs(&mut self.body);
        self.body.push_str("/>\n");
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.ids += 1;
        format!("{prefix}{}", self.ids)
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, style: &Style) {
        let (x, y, w, h) = normalize(x, y, w, h);
        self.emit(format_args!(r#"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}""#));
        self.close_shape(style);
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, style: &LineStyle) {
        self.emit(format_args!(r#"<line x1="{x1:.2}" y1="{y1:.2}" x2="{x2:.2}" y2="{y2:.2}""#));
        self.close_stroke(style);
    }

    pub fn polyline(&mut self, points: &[(f64, f64)], style: &LineStyle) {
        if points.len() < 2 {
            return;
        }
        self.body.push_str(r#"<polyline fill="none" points=""#);
        for (i, (x, y)) in points.iter().enumerate() {
            let sep = if i == 0 { "" } else { " " };
            self.emit(format_args!("{sep}{x:.2},{y:.2}"));
        }
        self.body.push('"');
        self.close_stroke(style);
    }

    pub fn text(&mut self, x: f64, y: f64, content: &str, style: &TextStyle) {
        self.text_inner(x, y, content, style, None);
    }

    /// Text rotated by `angle` degrees about its anchor point.
    pub fn text_rotated(&mut self, x: f64, y: f64, content: &str, style: &TextStyle, angle: f64) {
        self.text_inner(x, y, content, style, Some(angle));
    }

    fn text_inner(&mut self, x: f64, y: f64, content: &str, style: &TextStyle, angle: Option<f64>) {
        self.emit(format_args!(r#"<text x="{x:.2}" y="{y:.2}""#));
        let _ = style.write_svg_attrs(&mut self.body);
        if let Some(a) = angle {
            self.emit(format_args!(r#" transform="rotate({a:.1},{x:.2},{y:.2})""#));
        }
        self.body.push('>');
        escape_xml(&mut self.body, content);
        self.body.push_str("</text>\n");
    }

    pub fn circle(&mut self, cx: f64, cy: f64, r: f64, style: &Style) {
        self.emit(format_args!(r#"<circle cx="{cx:.2}" cy="{cy:.2}" r="{r:.2}""#));
        self.close_shape(style);
    }

    /// Closed band between `y_lo` and `y_hi` sampled at `x`.
    pub fn fill_between(&mut self, x: &[f64], y_lo: &[f64], y_hi: &[f64], style: &Style) {
        let n = x.len().min(y_lo.len()).min(y_hi.len());
        if n < 2 {
            return;
        }
        let upper = (0..n).map(|i| (x[i], y_hi[i]));
        let lower = (0..n).rev().map(|i| (x[i], y_lo[i]));
        self.body.push_str(r#"<path d=""#);
        for (k, (px, py)) in upper.chain(lower).enumerate() {
            let cmd = if k == 0 { "M" } else { " L" };
            self.emit(format_args!("{cmd}{px:.2},{py:.2}"));
        }
        self.body.push_str("Z\"");
        self.close_shape(style);
    }

    /// Vertical error bar; `cap_width` of zero draws no caps.
    pub fn error_bar(&mut self, x: f64, y_lo: f64, y_hi: f64, cap_width: f64, style: &LineStyle) {
        self.line(x, y_lo, x, y_hi, style);
        if cap_width > 0.0 {
            let half = cap_width / 2.0;
            for y in [y_lo, y_hi] {
                self.line(x - half, y, x + half, y, style);
            }
        }
    }

    pub fn error_bar_h(&mut self, x_lo: f64, x_hi: f64, y: f64, style: &LineStyle) {
        self.line(x_lo, y, x_hi, y, style);
    }

    pub fn marker(&mut self, x: f64, y: f64, marker: &MarkerStyle) {
        let paint = marker.paint();
        let s = marker.size;
        match marker.shape {
            MarkerShape::Circle => self.circle(x, y, s, &paint),
            MarkerShape::Square => self.rect(x - s, y - s, 2.0 * s, 2.0 * s, &paint),
        }
    }

    /// Define a 45 degree hatch and return the id for [`Canvas::pattern_rect`].
    pub fn hatch_pattern(&mut self, color: Color, spacing: f64) -> String {
        let id = self.next_id("hatch");
        self.defs.push(format!(
            r#"<pattern id="{id}" patternUnits="userSpaceOnUse" width="{spacing}" height="{spacing}" patternTransform="rotate(45)"><line x1="0" y1="0" x2="0" y2="{spacing}" stroke="{}" stroke-width="0.8"/></pattern>"#,
            color.to_svg_fill(),
        ));
        id
    }

    pub fn pattern_rect(&mut self, x: f64, y: f64, w: f64, h: f64, pattern_id: &str) {
        let (x, y, w, h) = normalize(x, y, w, h);
        self.emit(format_args!(
            r#"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" fill="url(#{pattern_id})"/>"#
        ));
        self.body.push('\n');
    }

    /// Clip subsequent drawing to a rectangle until the matching [`Canvas::pop_clip`].
    pub fn push_clip(&mut self, x: f64, y: f64, w: f64, h: f64) -> String {
        let id = self.next_id("clip");
        self.defs.push(format!(
            r#"<clipPath id="{id}"><rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}"/></clipPath>"#
        ));
        self.emit(format_args!("<g clip-path=\"url(#{id})\">\n"));
        self.open_clips += 1;
        id
    }

    pub fn pop_clip(&mut self) {
        if self.open_clips > 0 {
            self.open_clips -= 1;
            self.body.push_str("</g>\n");
        }
    }

    pub fn measure_text(&self, content: &str, style: &TextStyle) -> TextMetrics {
        measure_text(content, style)
    }

    pub fn finish_svg(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 1024);
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height,
        );
        if !self.defs.is_empty() {
            out.push_str("<defs>\n");
            for d in &self.defs {
                out.push_str(d);
                out.push('\n');
            }
            out.push_str("</defs>\n");
        }
        let _ = writeln!(out, r#"<rect width="{}" height="{}" fill="white"/>"#, self.width, self.height);
        out.push_str(&self.body);
        for _ in 0..self.open_clips {
            out.push_str("</g>\n");
        }
        out.push_str("</svg>\n");
        out
    }
}

pub(crate) fn escape_xml(out: &mut String, content: &str) {
    for ch in content.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_canvas() {
        let svg = Canvas::new(100.0, 50.0).unwrap().finish_svg();
        assert!(svg.contains("width=\"100\""));
        assert!(svg.contains("height=\"50\""));
        assert!(svg.ends_with("</svg>\n"));
        assert!(Canvas::new(0.0, 10.0).is_err());
    }

    #[test]
    fn negative_rect_is_normalised() {
        let mut c = Canvas::new(200.0, 100.0).unwrap();
        c.rect(10.0, 50.0, 50.0, -30.0, &Style::filled(Color::hex("#ff0000")));
        let svg = c.finish_svg();
        assert!(svg.contains(r##"fill="#ff0000""##));
        assert!(svg.contains(r#"y="20.00""#));
        assert!(svg.contains(r#"height="30.00""#));
    }

    #[test]
    fn text_is_escaped() {
        let mut c = Canvas::new(200.0, 100.0).unwrap();
        c.text(10.0, 20.0, "a < b & c", &TextStyle::default());
        assert!(c.finish_svg().contains("a &lt; b &amp; c"));
    }

    #[test]
    fn clip_group_wraps_only_inner_drawing() {
        let mut c = Canvas::new(200.0, 100.0).unwrap();
        let id = c.push_clip(0.0, 0.0, 50.0, 50.0);
        c.line(0.0, 0.0, 100.0, 100.0, &LineStyle::default());
        c.pop_clip();
        c.line(0.0, 0.0, 1.0, 1.0, &LineStyle::default());
        let svg = c.finish_svg();
        assert!(svg.contains(&format!(r#"<clipPath id="{id}">"#)));
        assert_eq!(svg.matches("clip-path=").count(), 1);
        let close = svg.find("</g>").unwrap();
        assert!(svg[close..].contains(r#"x2="1.00""#));
    }

    #[test]
    fn unbalanced_clip_is_closed() {
        let mut c = Canvas::new(10.0, 10.0).unwrap();
        c.push_clip(0.0, 0.0, 5.0, 5.0);
        c.pop_clip();
        c.pop_clip();
        c.push_clip(0.0, 0.0, 5.0, 5.0);
        let svg = c.finish_svg();
        assert_eq!(svg.matches("<g ").count(), svg.matches("</g>").count());
    }

    #[test]
    fn dashed_line_carries_pattern() {
        let mut c = Canvas::new(10.0, 10.0).unwrap();
        c.line(0.0, 0.0, 1.0, 1.0, &LineStyle::dashed(Color::BLACK, 1.0));
        assert!(c.finish_svg().contains(r#"stroke-dasharray="6 3""#));
    }
}
