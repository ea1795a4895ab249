use abcd_viz::Chi2Artifact;

use crate::canvas::Canvas;
use crate::config::VizConfig;
use crate::header::draw_experiment_header;
use crate::layout::axes::Axis;
use crate::layout::legend::{LegendCorner, LegendEntry, LegendKind};
use crate::layout::margins::PlotArea;
use crate::plots::axes_draw::draw_axes;
use crate::plots::{Frame, bars, corner_text, draw_legend, empty_svg};
use crate::primitives::*;

pub fn render(artifact: &Chi2Artifact, config: &VizConfig) -> crate::Result<String> {
    if artifact.density.is_empty() {
        return Ok(empty_svg("No chi-square values"));
    }
    let mut canvas = Canvas::new(config.figure.width, config.figure.height)?;

    let y_max = artifact.density.iter().chain(&artifact.pdf_y).copied().filter(|v| v.is_finite()).fold(0.0_f64, f64::max);
    let x = Axis::linear(artifact.xlim[0], artifact.xlim[1], 6).with_label("\u{03C7}\u{00B2}");
    let y = Axis::linear(0.0, if y_max > 0.0 { y_max * 1.25 } else { 1.0 }, 5).with_label("a.u.");
    let area = PlotArea::auto(&canvas, &y, &x, config, 0.0);
    let f = Frame { area, x, y };

    draw_experiment_header(&mut canvas, &f.area, config);
    draw_axes(&mut canvas, &f.area, &f.x, &f.y, config);

    f.clip(&mut canvas);
    let hist_color = config.palette_color(0);
    let zeros = vec![0.0; artifact.density.len()];
    bars(&mut canvas, &f, &artifact.bin_edges, &zeros, &artifact.density, &Style::filled(hist_color.with_alpha(0.6)));
    let pdf: Vec<(f64, f64)> = artifact
        .pdf_x
        .iter()
        .zip(&artifact.pdf_y)
        .filter(|(_, y)| y.is_finite())
        .map(|(&x, &y)| (f.px(x), f.py(y)))
        .collect();
    canvas.polyline(&pdf, &LineStyle::solid(config.colors.fit, 1.5));
    canvas.pop_clip();

    let ndf = format!("ndf = {}", artifact.ndf);
    let fits = format!("{} fits", artifact.n_fits);
    corner_text(&mut canvas, &f.area, &[&artifact.title, &ndf, &fits], config);

    let mut entries = vec![LegendEntry::new("fits", hist_color.with_alpha(0.6), LegendKind::FilledRect)];
    if !pdf.is_empty() {
        entries.push(LegendEntry::new(
            format!("\u{03C7}\u{00B2}({})", artifact.ndf),
            config.colors.fit,
            LegendKind::Line(None),
        ));
    }
    draw_legend(&mut canvas, &f.area, &entries, None, LegendCorner::TopRight, config);

    Ok(canvas.finish_svg())
}
