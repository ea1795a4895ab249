use crate::canvas::Canvas;
use crate::color::Color;
use crate::config::VizConfig;
use crate::layout::axes::Axis;
use crate::layout::margins::PlotArea;
use crate::primitives::*;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Orient {
    Horizontal,
    Vertical,
}

/// Pen settings shared by the two axes of one frame.
struct TickPens {
    major: LineStyle,
    minor: LineStyle,
    grid: Option<LineStyle>,
    inward: bool,
    len: f64,
    minor_len: f64,
}

impl TickPens {
    fn from_config(config: &VizConfig) -> Self {
        let grid = config.grid.show.then(|| LineStyle {
            color: config.grid.color.with_alpha(config.grid.alpha),
            width: 0.5,
            dash: Some(Dash::Fine),
        });
        Self {
            major: LineStyle::solid(Color::BLACK, 0.6),
            minor: LineStyle::solid(Color::BLACK, 0.4),
            grid,
            inward: config.axes.tick_direction == "in",
            len: config.axes.tick_length,
            minor_len: config.axes.minor_tick_length,
        }
    }

    /// Gap between the frame and the tick labels.
    fn label_gap(&self, pad: f64) -> f64 {
        if self.inward { pad } else { self.len + pad }
    }
}

/// Ticks, grid lines and tick labels along one axis.
///
/// Horizontal axes tick the bottom edge (and the top when `mirror`),
/// vertical axes the left edge (and the right).
fn draw_axis_ticks(
    canvas: &mut Canvas,
    area: &PlotArea,
    axis: &Axis,
    orient: Orient,
    mirror: bool,
    pens: &TickPens,
    label_size: f64,
) {
    let (lo, hi) = match orient {
        Orient::Horizontal => (area.left, area.right()),
        Orient::Vertical => (area.bottom(), area.top),
    };
    let to_px = |v: f64| axis.data_to_pixel(v, lo, hi);
    let visible = |p: f64| p >= lo.min(hi) - 0.5 && p <= lo.max(hi) + 0.5;
    let dir = if pens.inward { 1.0 } else { -1.0 };

    let mark = |canvas: &mut Canvas, p: f64, len: f64, pen: &LineStyle| {
        let d = dir * len;
        match orient {
            Orient::Horizontal => {
                canvas.line(p, area.bottom(), p, area.bottom() - d, pen);
                if mirror {
                    canvas.line(p, area.top, p, area.top + d, pen);
                }
            }
            Orient::Vertical => {
                canvas.line(area.left, p, area.left + d, p, pen);
                if mirror {
                    canvas.line(area.right(), p, area.right() - d, p, pen);
                }
            }
        }
    };

    let label_style = match orient {
        Orient::Horizontal => TextStyle {
            size: label_size,
            anchor: TextAnchor::Middle,
            baseline: TextBaseline::Hanging,
            ..TextStyle::default()
        },
        Orient::Vertical => TextStyle {
            size: label_size,
            anchor: TextAnchor::End,
            baseline: TextBaseline::Central,
            ..TextStyle::default()
        },
    };

    for (i, p) in axis.tick_positions.iter().map(|&v| to_px(v)).enumerate() {
        if !visible(p) {
            continue;
        }
        if let Some(grid) = &pens.grid {
            match orient {
                Orient::Horizontal => canvas.line(p, area.top, p, area.bottom(), grid),
                Orient::Vertical => canvas.line(area.left, p, area.right(), p, grid),
            }
        }
        mark(canvas, p, pens.len, &pens.major);
        let Some(label) = axis.tick_labels.get(i) else { continue };
        match orient {
            Orient::Horizontal => canvas.text(p, area.bottom() + pens.label_gap(3.0), label, &label_style),
            Orient::Vertical => canvas.text(area.left - pens.label_gap(4.0), p, label, &label_style),
        }
    }
    for p in axis.minor_ticks.iter().map(|&v| to_px(v)).filter(|&p| visible(p)) {
        mark(canvas, p, pens.minor_len, &pens.minor);
    }
}

/// Frame, ticks, optional grid, tick labels and axis titles.
///
/// The y title sits `y_label_offset` points left of the frame.
pub fn draw_axes(canvas: &mut Canvas, area: &PlotArea, x_axis: &Axis, y_axis: &Axis, config: &VizConfig) {
    let y_label_offset = PlotArea::left_margin(canvas, y_axis, config) - config.font.label_size;
    draw_axes_with_offset(canvas, area, x_axis, y_axis, config, y_label_offset);
}

pub fn draw_axes_with_offset(
    canvas: &mut Canvas,
    area: &PlotArea,
    x_axis: &Axis,
    y_axis: &Axis,
    config: &VizConfig,
    y_label_offset: f64,
) {
    let pens = TickPens::from_config(config);
    canvas.rect(area.left, area.top, area.width, area.height, &Style::stroked(Color::BLACK, 0.8));

    let tick_size = config.font.tick_size;
    draw_axis_ticks(canvas, area, x_axis, Orient::Horizontal, config.axes.show_top_ticks, &pens, tick_size);
    draw_axis_ticks(canvas, area, y_axis, Orient::Vertical, config.axes.show_right_ticks, &pens, tick_size);

    // HEP convention: titles flush with the high end of each axis
    let title = TextStyle { size: config.font.label_size, anchor: TextAnchor::End, ..TextStyle::default() };
    if !x_axis.label.is_empty() {
        let y = area.bottom() + tick_size + config.font.label_size + pens.label_gap(8.0);
        canvas.text(area.right(), y, &x_axis.label, &title);
    }
    if !y_axis.label.is_empty() {
        canvas.text_rotated(area.left - y_label_offset, area.top, &y_axis.label, &title, -90.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> (Canvas, PlotArea) {
        (Canvas::new(300.0, 200.0).unwrap(), PlotArea::manual(50.0, 20.0, 200.0, 150.0))
    }

    #[test]
    fn titles_and_tick_labels_are_drawn() {
        let (mut c, area) = frame();
        let x = Axis::linear(0.0, 10.0, 6).with_label("p_T");
        let y = Axis::linear(0.0, 1.0, 5).with_label("rate");
        draw_axes(&mut c, &area, &x, &y, &VizConfig::default());
        let svg = c.finish_svg();
        assert!(svg.contains(">p_T</text>"));
        assert!(svg.contains("rotate(-90.0"));
        assert!(svg.contains(">10</text>"));
    }

    #[test]
    fn grid_follows_config() {
        let x = Axis::linear(0.0, 10.0, 6);
        let y = Axis::linear(0.0, 1.0, 5);
        let (mut plain, area) = frame();
        draw_axes(&mut plain, &area, &x, &y, &VizConfig::default());
        assert!(!plain.finish_svg().contains("stroke-dasharray"));

        let mut config = VizConfig::default();
        config.grid.show = true;
        let (mut gridded, area) = frame();
        draw_axes(&mut gridded, &area, &x, &y, &config);
        assert!(gridded.finish_svg().contains(r#"stroke-dasharray="3 3""#));
    }
}
