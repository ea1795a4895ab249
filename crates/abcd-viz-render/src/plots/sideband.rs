use abcd_viz::SidebandFitArtifact;

use crate::canvas::Canvas;
use crate::config::VizConfig;
use crate::header::draw_experiment_header;
use crate::layout::axes::Axis;
use crate::layout::legend::{LegendCorner, LegendEntry, LegendKind};
use crate::layout::margins::PlotArea;
use crate::plots::axes_draw::draw_axes;
use crate::plots::{Frame, corner_text, draw_legend, empty_svg, error_points};
use crate::primitives::*;

pub fn render(artifact: &SidebandFitArtifact, config: &VizConfig) -> crate::Result<String> {
    if artifact.values.is_empty() {
        return Ok(empty_svg("No sideband data"));
    }
    let mut canvas = Canvas::new(config.figure.width, config.figure.height)?;

    let x = Axis::linear(artifact.xlim[0], artifact.xlim[1], 6).with_label(artifact.x_label.as_str());
    let y = Axis::linear(artifact.ylim[0], artifact.ylim[1], 5).with_label(artifact.y_label.as_str());
    let area = PlotArea::auto(&canvas, &y, &x, config, 0.0);
    let f = Frame { area, x, y };

    draw_experiment_header(&mut canvas, &f.area, config);
    draw_axes(&mut canvas, &f.area, &f.x, &f.y, config);

    let data = abcd_viz::BinnedSeries {
        label: artifact.region.clone(),
        color: None,
        linestyle: None,
        values: artifact.values.clone(),
        errors: artifact.errors.clone(),
    };
    let mut entries = vec![LegendEntry::new(artifact.region.as_str(), config.colors.data, LegendKind::Marker)];
    let mut summary = Vec::new();

    f.clip(&mut canvas);
    if let Some(fit) = &artifact.fit {
        let xs: Vec<f64> = fit.x.iter().map(|&x| f.px(x)).collect();
        let lo: Vec<f64> = fit.band.lo.iter().map(|&y| f.py(y)).collect();
        let hi: Vec<f64> = fit.band.hi.iter().map(|&y| f.py(y)).collect();
        canvas.fill_between(&xs, &lo, &hi, &Style::filled(config.colors.fit.with_alpha(0.3)));
        let curve: Vec<(f64, f64)> = fit.x.iter().zip(&fit.y).map(|(&x, &y)| (f.px(x), f.py(y))).collect();
        canvas.polyline(&curve, &LineStyle::solid(config.colors.fit, 1.5));
        entries.push(LegendEntry::new(fit.label.as_str(), config.colors.fit, LegendKind::Line(None)));
        entries.push(LegendEntry::new("1\u{03C3} band", config.colors.fit, LegendKind::Band));

        summary.push(format!("\u{03C7}\u{00B2}/ndf = {:.1}/{}", fit.chi2, fit.ndf));
        for (name, p) in ['a', 'b', 'c'].iter().zip(&fit.params) {
            summary.push(format!("{name} = {p:.3}"));
        }
    }
    error_points(&mut canvas, &f, &artifact.edges, &data, config.colors.data, 2.5);
    canvas.pop_clip();

    let mut lines: Vec<&str> = vec![artifact.bin_label.as_str()];
    lines.extend(summary.iter().map(String::as_str));
    corner_text(&mut canvas, &f.area, &lines, config);
    draw_legend(&mut canvas, &f.area, &entries, None, LegendCorner::TopRight, config);

    Ok(canvas.finish_svg())
}
