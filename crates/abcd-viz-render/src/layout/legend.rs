use crate::canvas::Canvas;
use crate::color::Color;
use crate::layout::margins::PlotArea;
use crate::primitives::*;

pub struct LegendEntry {
    pub label: String,
    pub color: Color,
    pub kind: LegendKind,
}

impl LegendEntry {
    pub fn new(label: impl Into<String>, color: Color, kind: LegendKind) -> Self {
        Self { label: label.into(), color, kind }
    }
}

pub enum LegendKind {
    FilledRect,
    /// Dash pattern, if any.
    Line(Option<Dash>),
    Marker,
    Band,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendCorner {
    TopRight,
    TopLeft,
}

pub struct Legend<'a> {
    pub entries: &'a [LegendEntry],
    pub title: Option<&'a str>,
    pub font_size: f64,
    pub frame: bool,
    pub corner: LegendCorner,
}

/// Draw a legend inside the plot area.
pub fn draw_legend(canvas: &mut Canvas, area: &PlotArea, legend: &Legend<'_>) {
    if legend.entries.is_empty() && legend.title.is_none() {
        return;
    }
    let fs = legend.font_size;
    let row_height = fs + 4.0;
    let swatch_w = 16.0;
    let swatch_h = fs - 2.0;
    let gap = 6.0;
    let padding = 6.0;

    let text_style = TextStyle { size: fs * 0.9, baseline: TextBaseline::Central, ..Default::default() };
    let max_w = legend
        .entries
        .iter()
        .map(|e| canvas.measure_text(&e.label, &text_style).width + swatch_w + gap)
        .chain(legend.title.map(|t| canvas.measure_text(t, &text_style).width))
        .fold(0.0_f64, f64::max);

    let rows = legend.entries.len() + usize::from(legend.title.is_some());
    let legend_w = padding + max_w + padding;
    let legend_h = padding + rows as f64 * row_height + padding;
    let lx = match legend.corner {
        LegendCorner::TopRight => area.right() - legend_w - 5.0,
        LegendCorner::TopLeft => area.left + 5.0,
    };
    let ly = area.top + 5.0;

    if legend.frame {
        let bg = Style {
            fill: Some(Color::rgba(255, 255, 255, 0.9)),
            stroke: Some(Color::rgb(200, 200, 200)),
            stroke_width: 0.5,
            opacity: 1.0,
        };
        canvas.rect(lx, ly, legend_w, legend_h, &bg);
    }

    let mut row = 0;
    if let Some(title) = legend.title {
        let ey = ly + padding + row_height / 2.0;
        canvas.text(lx + padding, ey, title, &text_style);
        row += 1;
    }
    for entry in legend.entries {
        let ey = ly + padding + row as f64 * row_height + row_height / 2.0;
        let sx = lx + padding;
        match &entry.kind {
            LegendKind::FilledRect => {
                let style = Style { stroke: Some(Color::BLACK), stroke_width: 0.4, ..Style::filled(entry.color) };
                canvas.rect(sx, ey - swatch_h / 2.0, swatch_w, swatch_h, &style);
            }
            LegendKind::Line(dash) => {
                let ls = LineStyle { color: entry.color, width: 1.5, dash: *dash };
                canvas.line(sx, ey, sx + swatch_w, ey, &ls);
            }
            LegendKind::Marker => {
                let cx = sx + swatch_w / 2.0;
                canvas.error_bar(cx, ey - swatch_h / 2.0, ey + swatch_h / 2.0, 0.0, &LineStyle::solid(entry.color, 1.0));
                canvas.marker(cx, ey, &MarkerStyle { color: entry.color, size: 2.5, ..Default::default() });
            }
            LegendKind::Band => {
                canvas.rect(sx, ey - swatch_h / 2.0, swatch_w, swatch_h, &Style::filled(entry.color.with_alpha(0.35)));
            }
        }
        canvas.text(sx + swatch_w + gap, ey, &entry.label, &text_style);
        row += 1;
    }
}
