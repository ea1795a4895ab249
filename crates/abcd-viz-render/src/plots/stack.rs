use abcd_viz::StackArtifact;

use crate::canvas::Canvas;
use crate::color::Color;
use crate::config::VizConfig;
use crate::header::draw_experiment_header;
use crate::layout::axes::Axis;
use crate::layout::legend::{LegendCorner, LegendEntry, LegendKind};
use crate::plots::{
    BandFill, bars, band_boxes, draw_legend, empty_svg, error_points, hline, main_ratio_frames, series_color,
    stairs,
};
use crate::primitives::*;

const ENVELOPE_ALPHA: f64 = 0.3;

/// Stacked processes with data, variations and a ratio panel.
pub fn render(artifact: &StackArtifact, config: &VizConfig) -> crate::Result<String> {
    let n_bins = artifact.edges.len().saturating_sub(1);
    if n_bins == 0 {
        return Ok(empty_svg("No bins to draw"));
    }
    let mut config = config.clone();
    if artifact.lumi > 0.0 {
        config.experiment.lumi_fb_inv = artifact.lumi;
    }
    let config = &config;
    let mut canvas = Canvas::new(config.figure.width, config.figure.height * 1.3)?;

    let [x0, x1] = artifact.xlim.unwrap_or([artifact.edges[0], artifact.edges[n_bins]]);
    let x = Axis::linear(x0, x1, 6).with_label(artifact.x_label.as_str());
    let y = if artifact.logy {
        Axis::log(artifact.ylim[0], artifact.ylim[1])
    } else {
        Axis::linear(artifact.ylim[0], artifact.ylim[1], 5)
    }
    .with_label(artifact.y_label.as_str());
    let r = Axis::linear(artifact.rrange[0], artifact.rrange[1], 3).with_label(artifact.rlabel.as_str());
    let (main, ratio) = main_ratio_frames(&mut canvas, config, x, y, r);
    draw_experiment_header(&mut canvas, &main.area, config);

    let edges = &artifact.edges;
    let band_fill = |canvas: &mut Canvas| {
        if config.stack.band_hatch {
            let id = canvas.hatch_pattern(config.colors.band, 4.0);
            BandFillOwned::Hatch(id)
        } else {
            BandFillOwned::Shade(config.colors.band.with_alpha(0.4))
        }
    };
    let mut stack_entries = Vec::new();
    let mut other_entries = Vec::new();

    main.clip(&mut canvas);
    let mut cumulative = vec![0.0_f64; n_bins];
    for (i, s) in artifact.stacked.iter().enumerate() {
        let color = series_color(s, config, i);
        let top: Vec<f64> = cumulative.iter().zip(&s.values).map(|(c, v)| c + v).collect();
        if artifact.no_fill {
            stairs(&mut canvas, &main, edges, &top, &LineStyle::solid(color, 1.2));
            stack_entries.push(LegendEntry::new(s.label.as_str(), color, LegendKind::Line(None)));
        } else {
            let style = Style { stroke: Some(Color::BLACK), stroke_width: 0.3, ..Style::filled(color) };
            bars(&mut canvas, &main, edges, &cumulative, &top, &style);
            stack_entries.push(LegendEntry::new(s.label.as_str(), color, LegendKind::FilledRect));
        }
        cumulative = top;
    }
    if let Some(band) = &artifact.band {
        let fill = band_fill(&mut canvas);
        band_boxes(&mut canvas, &main, edges, band, fill.borrowed());
        other_entries.push(LegendEntry::new("Pred. unc.", config.colors.band, LegendKind::Band));
    }
    if let Some(env) = &artifact.fill_between {
        band_boxes(&mut canvas, &main, edges, env, BandFill::Shade(Color::rgb(128, 128, 128).with_alpha(ENVELOPE_ALPHA)));
    }
    for (i, s) in artifact.unstacked.iter().enumerate() {
        let color = series_color(s, config, artifact.stacked.len() + i);
        let style = LineStyle::from_shorthand(s.linestyle.as_deref(), color, 1.2);
        stairs(&mut canvas, &main, edges, &s.values, &style);
        other_entries.push(LegendEntry::new(s.label.as_str(), color, LegendKind::Line(style.dash)));
    }
    let mut entries = Vec::new();
    if let Some(data) = &artifact.data {
        let color = data.color.as_deref().and_then(Color::parse).unwrap_or(config.colors.data);
        error_points(&mut canvas, &main, edges, data, color, 2.5);
        entries.push(LegendEntry::new(data.label.as_str(), color, LegendKind::Marker));
    }
    canvas.pop_clip();

    ratio.clip(&mut canvas);
    if let Some(band) = &artifact.ratio_band {
        let fill = band_fill(&mut canvas);
        band_boxes(&mut canvas, &ratio, edges, band, fill.borrowed());
    }
    if let Some(env) = &artifact.ratio_fill_between {
        band_boxes(&mut canvas, &ratio, edges, env, BandFill::Shade(Color::rgb(128, 128, 128).with_alpha(ENVELOPE_ALPHA)));
    }
    hline(&mut canvas, &ratio, 1.0, &LineStyle::dashed(config.colors.reference, 0.6));
    for (i, s) in artifact.ratio_unstacked.iter().enumerate() {
        let color = series_color(s, config, artifact.stacked.len() + i);
        stairs(&mut canvas, &ratio, edges, &s.values, &LineStyle::from_shorthand(s.linestyle.as_deref(), color, 1.2));
    }
    if let Some(points) = &artifact.ratio {
        let color = points.color.as_deref().and_then(Color::parse).unwrap_or(config.colors.data);
        error_points(&mut canvas, &ratio, edges, points, color, 2.0);
    }
    canvas.pop_clip();

    // legend lists the top of the stack first
    entries.extend(stack_entries.into_iter().rev());
    entries.extend(other_entries);
    draw_legend(&mut canvas, &main.area, &entries, None, LegendCorner::TopRight, config);

    Ok(canvas.finish_svg())
}

enum BandFillOwned {
    Shade(Color),
    Hatch(String),
}

impl BandFillOwned {
    fn borrowed(&self) -> BandFill<'_> {
        match self {
            BandFillOwned::Shade(c) => BandFill::Shade(*c),
            BandFillOwned::Hatch(id) => BandFill::Hatch(id),
        }
    }
}
