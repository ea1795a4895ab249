use crate::color::Color;
use crate::config::*;

/// Named starting points for [`VizConfig`]; user YAML is layered on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuiltinTheme {
    #[default]
    Cms,
    Atlas,
    Minimal,
}

impl BuiltinTheme {
    /// Case-insensitive; unknown names fall back to CMS.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("atlas") {
            Self::Atlas
        } else if s.eq_ignore_ascii_case("minimal") {
            Self::Minimal
        } else {
            Self::Cms
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Cms => "cms",
            Self::Atlas => "atlas",
            Self::Minimal => "minimal",
        }
    }

    pub fn base_config(self) -> VizConfig {
        let mut c = VizConfig {
            theme: self.name().into(),
            figure: FigureConfig::default(),
            font: FontConfig::default(),
            axes: AxesConfig::default(),
            grid: GridConfig::default(),
            experiment: ExperimentConfig::default(),
            colors: ColorsConfig::default(),
            palette: "cms_petroff6".into(),
            legend: LegendConfig::default(),
            output: OutputConfig::default(),
            stack: StackConfig::default(),
        };
        match self {
            Self::Cms => {}
            Self::Atlas => {
                c.font = FontConfig { size: 11.0, label_size: 12.0, tick_size: 9.5 };
                c.axes.tick_length = 6.0;
                c.experiment.name = "ATLAS".into();
                c.experiment.status = "Internal".into();
                c.palette = "atlas_wong".into();
            }
            Self::Minimal => {
                c.figure = FigureConfig { width: 432.0, height: 324.0 };
                c.font = FontConfig { size: 9.0, label_size: 10.0, tick_size: 8.0 };
                c.axes = AxesConfig {
                    tick_direction: "out".into(),
                    show_top_ticks: false,
                    show_right_ticks: false,
                    tick_length: 4.0,
                    minor_tick_length: 2.0,
                };
                c.grid = GridConfig { show: true, color: Color::hex("#cbd5e1"), alpha: 0.55 };
                c.experiment = ExperimentConfig {
                    name: String::new(),
                    status: String::new(),
                    sqrt_s_tev: 0.0,
                    lumi_fb_inv: 0.0,
                };
                c.palette = "tableau10".into();
                c.stack.band_hatch = false;
            }
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(BuiltinTheme::parse("ATLAS"), BuiltinTheme::Atlas);
        assert_eq!(BuiltinTheme::parse("Minimal"), BuiltinTheme::Minimal);
        assert_eq!(BuiltinTheme::parse("lhcb"), BuiltinTheme::Cms);
    }

    #[test]
    fn presets_keep_their_name() {
        for t in [BuiltinTheme::Cms, BuiltinTheme::Atlas, BuiltinTheme::Minimal] {
            assert_eq!(t.base_config().theme, t.name());
        }
        assert!(BuiltinTheme::Minimal.base_config().experiment.name.is_empty());
        assert!(!BuiltinTheme::Minimal.base_config().stack.band_hatch);
    }
}
