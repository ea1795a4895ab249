//! One renderer per artifact kind, plus the binned-drawing helpers they share.

pub mod chi2;
pub mod closure;
pub mod fakerate;
pub mod params;
pub mod sideband;
pub mod stack;

mod axes_draw;

use abcd_viz::{BandEnvelope, BinnedSeries};

use crate::canvas::Canvas;
use crate::color::Color;
use crate::config::VizConfig;
use crate::layout::axes::Axis;
use crate::layout::legend::{self, Legend, LegendCorner, LegendEntry};
use crate::layout::margins::PlotArea;
use crate::layout::multi_panel::MainRatioLayout;
use crate::primitives::*;

/// A plot area with its axes, mapping data to canvas points.
pub(crate) struct Frame {
    pub area: PlotArea,
    pub x: Axis,
    pub y: Axis,
}

impl Frame {
    pub fn px(&self, x: f64) -> f64 {
        self.x.data_to_pixel(x, self.area.left, self.area.right())
    }

    pub fn py(&self, y: f64) -> f64 {
        self.y.data_to_pixel(y, self.area.bottom(), self.area.top)
    }

    /// Lowest drawable y, used as the base of filled bars.
    pub fn y_floor(&self) -> f64 {
        self.y.min
    }

    pub fn clip(&self, canvas: &mut Canvas) {
        canvas.push_clip(self.area.left, self.area.top, self.area.width, self.area.height);
    }
}

/// Main and ratio frames sharing `x`; only the ratio panel carries x tick labels.
///
/// Both y titles are drawn at the same offset from the frame.
pub(crate) fn main_ratio_frames(
    canvas: &mut Canvas,
    config: &VizConfig,
    x: Axis,
    y_main: Axis,
    y_ratio: Axis,
) -> (Frame, Frame) {
    let left = PlotArea::left_margin(canvas, &y_main, config).max(PlotArea::left_margin(canvas, &y_ratio, config));
    let top = crate::header::header_height(config);
    let mut bottom = 15.0 + config.font.tick_size + 6.0;
    if !x.label.is_empty() {
        bottom += config.font.label_size + 8.0;
    }
    let width = (canvas.width - left - 15.0).max(50.0);
    let height = (canvas.height - top - bottom).max(100.0);
    let layout = MainRatioLayout::new(left, top, width, height, 5.0, config.stack.ratio_fraction);
    let y_label_offset = left - config.font.label_size;

    let main = Frame { area: layout.main, x: x.clone().without_tick_labels().with_label(""), y: y_main };
    let ratio = Frame { area: layout.ratio, x, y: y_ratio };
    axes_draw::draw_axes_with_offset(canvas, &main.area, &main.x, &main.y, config, y_label_offset);
    axes_draw::draw_axes_with_offset(canvas, &ratio.area, &ratio.x, &ratio.y, config, y_label_offset);
    (main, ratio)
}

/// Series color, or palette entry `i` when the series has none.
pub(crate) fn series_color(s: &BinnedSeries, config: &VizConfig, i: usize) -> Color {
    s.color.as_deref().and_then(Color::parse).unwrap_or_else(|| config.palette_color(i))
}

/// Histogram outline through the bin tops.
pub(crate) fn stairs(canvas: &mut Canvas, f: &Frame, edges: &[f64], values: &[f64], style: &LineStyle) {
    let mut pts = Vec::with_capacity(2 * values.len());
    for (i, v) in values.iter().enumerate().take(edges.len().saturating_sub(1)) {
        let py = f.py(*v);
        pts.push((f.px(edges[i]), py));
        pts.push((f.px(edges[i + 1]), py));
    }
    canvas.polyline(&pts, style);
}

/// Filled bars from `base` to `top` per bin.
pub(crate) fn bars(canvas: &mut Canvas, f: &Frame, edges: &[f64], base: &[f64], top: &[f64], style: &Style) {
    for i in 0..top.len().min(base.len()).min(edges.len().saturating_sub(1)) {
        let (x0, x1) = (f.px(edges[i]), f.px(edges[i + 1]));
        let (y0, y1) = (f.py(base[i]), f.py(top[i]));
        canvas.rect(x0, y1, x1 - x0, y0 - y1, style);
    }
}

/// Per-bin band between `lo` and `hi`, shaded or hatched.
pub(crate) fn band_boxes(canvas: &mut Canvas, f: &Frame, edges: &[f64], band: &BandEnvelope, fill: BandFill<'_>) {
    for i in 0..band.lo.len().min(band.hi.len()).min(edges.len().saturating_sub(1)) {
        let (x0, x1) = (f.px(edges[i]), f.px(edges[i + 1]));
        let (y0, y1) = (f.py(band.lo[i]), f.py(band.hi[i]));
        match fill {
            BandFill::Shade(color) => canvas.rect(x0, y1, x1 - x0, y0 - y1, &Style::filled(color)),
            BandFill::Hatch(id) => canvas.pattern_rect(x0, y1, x1 - x0, y0 - y1, id),
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) enum BandFill<'a> {
    Shade(Color),
    Hatch(&'a str),
}

/// Markers at bin centers with vertical errors and horizontal bin-width bars.
pub(crate) fn error_points(canvas: &mut Canvas, f: &Frame, edges: &[f64], s: &BinnedSeries, color: Color, size: f64) {
    let line = LineStyle::solid(color, 1.0);
    let marker = MarkerStyle { color, size, ..Default::default() };
    for (i, v) in s.values.iter().enumerate().take(edges.len().saturating_sub(1)) {
        if !v.is_finite() {
            continue;
        }
        let e = s.errors.get(i).copied().unwrap_or(0.0);
        let px = f.px(0.5 * (edges[i] + edges[i + 1]));
        let py = f.py(*v);
        canvas.error_bar(px, f.py(v - e), f.py(v + e), 0.0, &line);
        canvas.error_bar_h(f.px(edges[i]), f.px(edges[i + 1]), py, &line);
        canvas.marker(px, py, &marker);
    }
}

/// Horizontal reference line across the frame.
pub(crate) fn hline(canvas: &mut Canvas, f: &Frame, y: f64, style: &LineStyle) {
    let py = f.py(y);
    canvas.line(f.area.left, py, f.area.right(), py, style);
}

/// Text block at the top-left corner inside the frame, one line per entry.
pub(crate) fn corner_text(canvas: &mut Canvas, area: &PlotArea, lines: &[&str], config: &VizConfig) {
    let style = TextStyle { size: config.font.size, baseline: TextBaseline::Hanging, ..Default::default() };
    let step = config.font.size + 3.0;
    for (i, line) in lines.iter().filter(|l| !l.is_empty()).enumerate() {
        canvas.text(area.left + 6.0, area.top + 6.0 + i as f64 * step, line, &style);
    }
}

/// Legend sized and framed from the config.
pub(crate) fn draw_legend(
    canvas: &mut Canvas,
    area: &PlotArea,
    entries: &[LegendEntry],
    title: Option<&str>,
    corner: LegendCorner,
    config: &VizConfig,
) {
    let legend = Legend {
        entries,
        title,
        font_size: config.font.size * config.legend.scale,
        frame: config.legend.frame,
        corner,
    };
    legend::draw_legend(canvas, area, &legend);
}

/// Small placeholder SVG for artifacts with nothing to draw.
pub(crate) fn empty_svg(message: &str) -> String {
    let mut out = String::from(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="160" height="50"><text x="10" y="30">"#,
    );
    crate::canvas::escape_xml(&mut out, message);
    out.push_str("</text></svg>");
    out
}
