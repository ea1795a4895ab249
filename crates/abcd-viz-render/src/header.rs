use crate::canvas::Canvas;
use crate::color::Color;
use crate::config::VizConfig;
use crate::layout::margins::PlotArea;
use crate::primitives::*;

/// Right-hand header text, e.g. `16.8 fb⁻¹ (13 TeV)`.
pub fn lumi_text(config: &VizConfig) -> String {
    let e = &config.experiment;
    let mut parts = Vec::new();
    if e.lumi_fb_inv > 0.0 {
        parts.push(format!("{} fb\u{207B}\u{00B9}", trim_number(e.lumi_fb_inv)));
    }
    if e.sqrt_s_tev > 0.0 {
        parts.push(format!("({} TeV)", trim_number(e.sqrt_s_tev)));
    }
    parts.join(" ")
}

fn trim_number(v: f64) -> String {
    let s = format!("{v:.1}");
    s.strip_suffix(".0").map(str::to_string).unwrap_or(s)
}

/// Experiment label above the frame: bold name, italic status, lumi on the right.
pub fn draw_experiment_header(canvas: &mut Canvas, area: &PlotArea, config: &VizConfig) {
    let y = area.top - 5.0;
    let info = lumi_text(config);
    if !info.is_empty() {
        let info_style = TextStyle {
            size: config.font.label_size,
            anchor: TextAnchor::End,
            ..Default::default()
        };
        canvas.text(area.right(), y, &info, &info_style);
    }

    let e = &config.experiment;
    if e.name.is_empty() {
        return;
    }
    let header_size = config.font.label_size * 1.3;
    let bold = TextStyle {
        size: header_size,
        color: Color::BLACK,
        weight: FontWeight::Bold,
        ..Default::default()
    };
    canvas.text(area.left, y, &e.name, &bold);
    if !e.status.is_empty() {
        let name_w = canvas.measure_text(&e.name, &bold).width;
        let italic = TextStyle {
            size: header_size * 0.8,
            style: FontStyle::Italic,
            ..Default::default()
        };
        canvas.text(area.left + name_w + 5.0, y, &e.status, &italic);
    }
}

/// Space needed above the plot area for the header.
pub fn header_height(config: &VizConfig) -> f64 {
    if config.experiment.name.is_empty() && lumi_text(config).is_empty() {
        12.0
    } else {
        config.font.label_size * 1.3 + 14.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lumi_formatting() {
        let mut c = VizConfig::default();
        c.experiment.lumi_fb_inv = 16.8;
        assert_eq!(lumi_text(&c), "16.8 fb\u{207B}\u{00B9} (13 TeV)");
        c.experiment.lumi_fb_inv = 0.0;
        assert_eq!(lumi_text(&c), "(13 TeV)");
    }
}
