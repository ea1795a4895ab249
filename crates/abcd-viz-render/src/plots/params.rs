use abcd_viz::{ParamMapArtifact, ParamScanArtifact};

use crate::canvas::Canvas;
use crate::color::{self, Color};
use crate::config::VizConfig;
use crate::header::draw_experiment_header;
use crate::layout::axes::Axis;
use crate::layout::legend::{LegendCorner, LegendEntry, LegendKind};
use crate::layout::margins::PlotArea;
use crate::plots::axes_draw::draw_axes;
use crate::plots::{Frame, draw_legend, empty_svg, error_points, hline, stairs};
use crate::primitives::*;

const COLORBAR_W: f64 = 14.0;
const COLORBAR_GAP: f64 = 10.0;
const COLORBAR_STEPS: usize = 64;

/// Color scale of a map: diverging when centered on zero.
struct ZScale {
    lo: f64,
    hi: f64,
    diverging: bool,
}

impl ZScale {
    fn new(art: &ParamMapArtifact) -> Self {
        let (lo, hi) = match art.zlim {
            Some([lo, hi]) => (lo, hi),
            None => art
                .values
                .iter()
                .flatten()
                .copied()
                .filter(|v| v.is_finite())
                .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                    None => Some((v, v)),
                    Some((a, b)) => Some((a.min(v), b.max(v))),
                })
                .unwrap_or((0.0, 1.0)),
        };
        let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, lo + 0.5) };
        let diverging = (lo + hi).abs() <= 1e-9 * (hi - lo);
        Self { lo, hi, diverging }
    }

    fn color(&self, v: f64) -> Color {
        if self.diverging {
            color::rdbu_r(v / self.hi)
        } else {
            color::viridis((v - self.lo) / (self.hi - self.lo))
        }
    }
}

/// Heat map of one fit coefficient with a color bar.
pub fn render_map(artifact: &ParamMapArtifact, config: &VizConfig) -> crate::Result<String> {
    let (nx, ny) = (artifact.x_edges.len().saturating_sub(1), artifact.y_edges.len().saturating_sub(1));
    if nx == 0 || ny == 0 || artifact.values.is_empty() {
        return Ok(empty_svg("No parameter map"));
    }
    let mut canvas = Canvas::new(config.figure.width, config.figure.height)?;
    let bounds = |e: &[f64]| (e[0], e[e.len() - 1]);
    let (x0, x1) = bounds(&artifact.x_edges);
    let (y0, y1) = bounds(&artifact.y_edges);
    let x = Axis::linear(x0, x1, 6).with_label(artifact.x_label.as_str());
    let y = Axis::linear(y0, y1, 6).with_label(artifact.y_label.as_str());
    let z = ZScale::new(artifact);
    let z_axis = Axis::linear(z.lo, z.hi, 5);

    let tick_style = TextStyle { size: config.font.tick_size, ..Default::default() };
    let z_label_w =
        z_axis.tick_labels.iter().map(|l| canvas.measure_text(l, &tick_style).width).fold(0.0_f64, f64::max);
    let area = PlotArea::auto(&canvas, &y, &x, config, COLORBAR_GAP + COLORBAR_W + z_label_w + 6.0);
    let f = Frame { area, x, y };

    draw_experiment_header(&mut canvas, &f.area, config);

    for (iy, row) in artifact.values.iter().enumerate().take(ny) {
        for (ix, v) in row.iter().enumerate().take(nx) {
            if !v.is_finite() {
                continue;
            }
            let (px0, px1) = (f.px(artifact.x_edges[ix]), f.px(artifact.x_edges[ix + 1]));
            let (py0, py1) = (f.py(artifact.y_edges[iy]), f.py(artifact.y_edges[iy + 1]));
            canvas.rect(px0, py1, px1 - px0, py0 - py1, &Style::filled(z.color(*v)));
        }
    }
    draw_axes(&mut canvas, &f.area, &f.x, &f.y, config);

    // color bar
    let cb_x = f.area.right() + COLORBAR_GAP;
    let step_h = f.area.height / COLORBAR_STEPS as f64;
    for i in 0..COLORBAR_STEPS {
        let t = (i as f64 + 0.5) / COLORBAR_STEPS as f64;
        let yy = f.area.bottom() - (i + 1) as f64 * step_h;
        canvas.rect(cb_x, yy, COLORBAR_W, step_h + 0.3, &Style::filled(z.color(z.lo + t * (z.hi - z.lo))));
    }
    canvas.rect(cb_x, f.area.top, COLORBAR_W, f.area.height, &Style::stroked(Color::BLACK, 0.5));
    let label_style = TextStyle { baseline: TextBaseline::Central, ..tick_style };
    for (v, label) in z_axis.tick_positions.iter().zip(&z_axis.tick_labels) {
        let py = z_axis.data_to_pixel(*v, f.area.bottom(), f.area.top);
        canvas.line(cb_x + COLORBAR_W - 3.0, py, cb_x + COLORBAR_W, py, &LineStyle::solid(Color::BLACK, 0.5));
        canvas.text(cb_x + COLORBAR_W + 3.0, py, label, &label_style);
    }

    let title = TextStyle { size: config.font.label_size, anchor: TextAnchor::Middle, ..Default::default() };
    canvas.text(f.area.left + f.area.width / 2.0, f.area.top - 5.0, &artifact.title, &title);

    Ok(canvas.finish_svg())
}

/// One coefficient along a detector axis, with the inclusive average.
pub fn render_scan(artifact: &ParamScanArtifact, config: &VizConfig) -> crate::Result<String> {
    if artifact.edges.len() < 2 {
        return Ok(empty_svg("No parameter scan"));
    }
    let mut canvas = Canvas::new(config.figure.width, config.figure.height)?;

    let spread = |s: &abcd_viz::BinnedSeries| {
        s.values.iter().zip(&s.errors).flat_map(|(v, e)| [v - e, v + e]).collect::<Vec<_>>()
    };
    let mut ys = spread(&artifact.series);
    if let Some(avg) = &artifact.average {
        ys.extend(spread(avg));
    }
    ys.extend(artifact.line);
    let (lo, hi) = ys
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), v| (a.min(v), b.max(v)));
    let (lo, hi) = if lo < hi { (lo, hi) } else { (-1.0, 1.0) };
    let pad = 0.1 * (hi - lo);

    let (e0, e1) = (artifact.edges[0], artifact.edges[artifact.edges.len() - 1]);
    let x = Axis::linear(e0, e1, 6).with_label(artifact.x_label.as_str());
    let y = Axis::linear(lo - pad, hi + 3.0 * pad, 5).with_label(artifact.param.as_str());
    let area = PlotArea::auto(&canvas, &y, &x, config, 0.0);
    let f = Frame { area, x, y };

    draw_experiment_header(&mut canvas, &f.area, config);
    draw_axes(&mut canvas, &f.area, &f.x, &f.y, config);

    f.clip(&mut canvas);
    if let Some(v) = artifact.line {
        hline(&mut canvas, &f, v, &LineStyle::dashed(config.colors.reference, 0.8));
    }
    let mut entries = Vec::new();
    if let Some(avg) = &artifact.average {
        let color = avg.color.as_deref().and_then(Color::parse).unwrap_or(config.colors.fit);
        stairs(&mut canvas, &f, &artifact.edges, &avg.values, &LineStyle::solid(color, 1.2));
        entries.push(LegendEntry::new(avg.label.as_str(), color, LegendKind::Line(None)));
    }
    error_points(&mut canvas, &f, &artifact.edges, &artifact.series, config.colors.data, 2.5);
    entries.push(LegendEntry::new(artifact.bin_label.as_str(), config.colors.data, LegendKind::Marker));
    canvas.pop_clip();

    draw_legend(&mut canvas, &f.area, &entries, None, LegendCorner::TopRight, config);
    Ok(canvas.finish_svg())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(zlim: Option<[f64; 2]>) -> ParamMapArtifact {
        ParamMapArtifact {
            title: "slope+".into(),
            x_label: "|η|".into(),
            y_label: "p\u{1D1B}".into(),
            x_edges: vec![0.0, 1.0, 2.0],
            y_edges: vec![26.0, 40.0, 56.0],
            values: vec![vec![0.01, -0.01], vec![0.0, f64::NAN]],
            zlim,
        }
    }

    #[test]
    fn symmetric_limits_use_the_diverging_map() {
        let z = ZScale::new(&map(Some([-0.02, 0.02])));
        assert!(z.diverging);
        assert_eq!(z.color(0.0), Color::WHITE);
        let auto = ZScale::new(&map(None));
        assert!(auto.diverging);
        let skewed = ZScale::new(&map(Some([0.0, 1.0])));
        assert!(!skewed.diverging);
    }

    #[test]
    fn nan_cells_are_left_blank() {
        let svg = render_map(&map(None), &VizConfig::default()).unwrap();
        assert!(svg.contains("slope+"));
        assert!(!svg.contains("NaN"));
    }
}
