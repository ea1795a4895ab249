use abcd_viz::FakerateCurveArtifact;

use crate::canvas::Canvas;
use crate::color::Color;
use crate::config::VizConfig;
use crate::header::draw_experiment_header;
use crate::layout::axes::Axis;
use crate::layout::legend::{LegendCorner, LegendEntry, LegendKind};
use crate::layout::margins::PlotArea;
use crate::plots::axes_draw::draw_axes;
use crate::plots::{Frame, corner_text, draw_legend, empty_svg, error_points};
use crate::primitives::*;

pub fn render(artifact: &FakerateCurveArtifact, config: &VizConfig) -> crate::Result<String> {
    if artifact.points.is_empty() && artifact.curves.is_empty() {
        return Ok(empty_svg("No fake-rate data"));
    }
    let mut canvas = Canvas::new(config.figure.width, config.figure.height)?;

    let x = Axis::linear(artifact.xlim[0], artifact.xlim[1], 6).with_label(artifact.x_label.as_str());
    let y = Axis::linear(artifact.ylim[0], artifact.ylim[1], 5).with_label(artifact.y_label.as_str());
    let area = PlotArea::auto(&canvas, &y, &x, config, 0.0);
    let f = Frame { area, x, y };

    draw_experiment_header(&mut canvas, &f.area, config);
    draw_axes(&mut canvas, &f.area, &f.x, &f.y, config);

    f.clip(&mut canvas);
    let threshold = f.px(artifact.threshold);
    canvas.line(threshold, f.area.top, threshold, f.area.bottom(), &LineStyle::dashed(config.colors.reference, 1.0));

    let mut entries = Vec::new();
    for (i, curve) in artifact.curves.iter().enumerate() {
        let color = Color::parse(&curve.color).unwrap_or_else(|| config.palette_color(i));
        let xs: Vec<f64> = curve.band.x.iter().map(|&x| f.px(x)).collect();
        let lo: Vec<f64> = curve.band.lower().iter().map(|&y| f.py(y)).collect();
        let hi: Vec<f64> = curve.band.upper().iter().map(|&y| f.py(y)).collect();
        canvas.fill_between(&xs, &lo, &hi, &Style::filled(color.with_alpha(0.3)));
        let central: Vec<(f64, f64)> =
            curve.band.x.iter().zip(&curve.band.central).map(|(&x, &y)| (f.px(x), f.py(y))).collect();
        canvas.polyline(&central, &LineStyle::solid(color, 1.5));
        entries.push(LegendEntry::new(format!("{} fit", curve.label), color, LegendKind::Line(None)));
    }
    for (i, points) in artifact.points.iter().enumerate() {
        let color = crate::plots::series_color(points, config, i);
        error_points(&mut canvas, &f, &artifact.bin_edges, points, color, 2.5);
        entries.push(LegendEntry::new(points.label.as_str(), color, LegendKind::Marker));
    }
    canvas.pop_clip();

    let mut lines: Vec<&str> = vec![artifact.title.as_str(), artifact.region.as_str()];
    for curve in &artifact.curves {
        lines.push(curve.formula.as_str());
        lines.extend(curve.coefficients.iter().map(String::as_str));
    }
    corner_text(&mut canvas, &f.area, &lines, config);
    draw_legend(&mut canvas, &f.area, &entries, None, LegendCorner::TopRight, config);

    Ok(canvas.finish_svg())
}
