use abcd_viz::ClosureArtifact;

use crate::canvas::Canvas;
use crate::config::VizConfig;
use crate::header::draw_experiment_header;
use crate::layout::axes::Axis;
use crate::layout::legend::{LegendCorner, LegendEntry, LegendKind};
use crate::plots::{draw_legend, empty_svg, hline, main_ratio_frames, series_color, stairs};
use crate::primitives::*;

pub fn render(artifact: &ClosureArtifact, config: &VizConfig) -> crate::Result<String> {
    if artifact.series.is_empty() || artifact.edges.len() < 2 {
        return Ok(empty_svg("No closure inputs"));
    }
    let mut canvas = Canvas::new(config.figure.width, config.figure.height * 1.3)?;

    let (e0, e1) = (artifact.edges[0], artifact.edges[artifact.edges.len() - 1]);
    let x = Axis::linear(e0, e1, 6).with_label(artifact.x_label.as_str());
    let y = Axis::linear(artifact.ylim[0], artifact.ylim[1], 5).with_label(artifact.y_label.as_str());
    let r = Axis::linear(artifact.rrange[0], artifact.rrange[1], 3).with_label(artifact.rlabel.as_str());
    let (main, ratio) = main_ratio_frames(&mut canvas, config, x, y, r);
    draw_experiment_header(&mut canvas, &main.area, config);

    let mut entries = Vec::new();
    main.clip(&mut canvas);
    for (i, s) in artifact.series.iter().enumerate() {
        let color = series_color(s, config, i);
        let style = LineStyle::from_shorthand(s.linestyle.as_deref(), color, 1.5);
        stairs(&mut canvas, &main, &artifact.edges, &s.values, &style);
        entries.push(LegendEntry::new(s.label.as_str(), color, LegendKind::Line(style.dash)));
    }
    canvas.pop_clip();

    ratio.clip(&mut canvas);
    hline(&mut canvas, &ratio, 1.0, &LineStyle::dashed(config.colors.reference, 0.6));
    for (i, s) in artifact.ratios.iter().enumerate() {
        let color = series_color(s, config, i);
        let style = LineStyle::from_shorthand(s.linestyle.as_deref(), color, 1.2);
        stairs(&mut canvas, &ratio, &artifact.edges, &s.values, &style);
    }
    canvas.pop_clip();

    draw_legend(&mut canvas, &main.area, &entries, Some(&artifact.title), LegendCorner::TopRight, config);
    Ok(canvas.finish_svg())
}
