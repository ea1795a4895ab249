use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;

use crate::color::Color;
use crate::theme::BuiltinTheme;

/// Plot appearance, from a built-in theme overlaid with user YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VizConfig {
    pub theme: String,
    pub figure: FigureConfig,
    pub font: FontConfig,
    pub axes: AxesConfig,
    pub grid: GridConfig,
    pub experiment: ExperimentConfig,
    pub colors: ColorsConfig,
    pub palette: String,
    pub legend: LegendConfig,
    pub output: OutputConfig,
    pub stack: StackConfig,
}

impl Default for VizConfig {
    fn default() -> Self {
        BuiltinTheme::Cms.base_config()
    }
}

impl VizConfig {
    pub fn palette_colors(&self) -> Vec<Color> {
        crate::color::palette_colors(&self.palette)
    }

    /// Palette color `i`, cycling.
    pub fn palette_color(&self, i: usize) -> Color {
        let p = self.palette_colors();
        if p.is_empty() { Color::BLACK } else { p[i % p.len()] }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FigureConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for FigureConfig {
    fn default() -> Self {
        Self { width: 576.0, height: 432.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub size: f64,
    pub label_size: f64,
    pub tick_size: f64,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self { size: 10.0, label_size: 11.0, tick_size: 9.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AxesConfig {
    pub tick_direction: String,
    pub show_top_ticks: bool,
    pub show_right_ticks: bool,
    pub tick_length: f64,
    pub minor_tick_length: f64,
}

impl Default for AxesConfig {
    fn default() -> Self {
        Self {
            tick_direction: "in".into(),
            show_top_ticks: true,
            show_right_ticks: true,
            tick_length: 5.0,
            minor_tick_length: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub show: bool,
    pub color: Color,
    pub alpha: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { show: false, color: Color::hex("#cbd5e1"), alpha: 0.55 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub name: String,
    pub status: String,
    pub sqrt_s_tev: f64,
    /// Integrated luminosity; 0 hides it.
    pub lumi_fb_inv: f64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self { name: "CMS".into(), status: "Preliminary".into(), sqrt_s_tev: 13.0, lumi_fb_inv: 0.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    pub data: Color,
    pub band: Color,
    pub fit: Color,
    pub reference: Color,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            data: Color::hex("#000000"),
            band: Color::hex("#808080"),
            fit: Color::hex("#ff0000"),
            reference: Color::hex("#969696"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LegendConfig {
    /// Multiplies the legend text size.
    pub scale: f64,
    pub frame: bool,
}

impl Default for LegendConfig {
    fn default() -> Self {
        Self { scale: 1.0, frame: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dpi: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dpi: 150 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Share of the plot height taken by the ratio panel.
    pub ratio_fraction: f64,
    /// Hatch the prediction uncertainty instead of shading it.
    pub band_hatch: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self { ratio_fraction: 0.3, band_hatch: true }
    }
}

fn merge(base: &mut Value, user: Value) {
    match (base, user) {
        (Value::Mapping(b), Value::Mapping(u)) => {
            for (k, v) in u {
                match b.get_mut(&k) {
                    Some(slot) => merge(slot, v),
                    None => {
                        b.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

/// Resolve a config from optional YAML.
///
/// The `theme` key picks the base (`cms` when absent); every other key
/// given overrides the theme's value. Unknown keys such as `styles` are
/// ignored.
pub fn resolve_config(user_yaml: Option<&str>) -> crate::Result<VizConfig> {
    let Some(yaml) = user_yaml else {
        return Ok(VizConfig::default());
    };
    let cfg_err = |e: serde_yaml_ng::Error| crate::RenderError::Config(e.to_string());
    let user: Value = serde_yaml_ng::from_str(yaml).map_err(cfg_err)?;
    let user = match user {
        Value::Null => return Ok(VizConfig::default()),
        v @ Value::Mapping(_) => v,
        _ => return Err(crate::RenderError::Config("config must be a mapping".into())),
    };
    let theme = user.get("theme").and_then(Value::as_str).unwrap_or("cms");
    let mut base = serde_yaml_ng::to_value(BuiltinTheme::parse(theme).base_config()).map_err(cfg_err)?;
    merge(&mut base, user);
    let config: VizConfig = serde_yaml_ng::from_value(base).map_err(cfg_err)?;
    tracing::debug!(theme = %config.theme, "resolved plot config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_yaml_is_cms() {
        let c = resolve_config(None).unwrap();
        assert_eq!(c.theme, "cms");
        assert_eq!(c.experiment.name, "CMS");
    }

    #[test]
    fn theme_then_overrides() {
        let yaml = "theme: atlas\nexperiment:\n  status: Internal\nfont:\n  size: 14\nstyles:\n  xlabels: {}\n";
        let c = resolve_config(Some(yaml)).unwrap();
        assert_eq!(c.experiment.name, "ATLAS");
        assert_eq!(c.experiment.status, "Internal");
        assert_eq!(c.font.size, 14.0);
        // untouched keys keep the theme value
        assert_eq!(c.font.tick_size, BuiltinTheme::Atlas.base_config().font.tick_size);
    }

    #[test]
    fn bad_color_is_a_config_error() {
        assert!(resolve_config(Some("colors:\n  data: notacolor\n")).is_err());
        assert!(resolve_config(Some("- 1\n- 2\n")).is_err());
    }
}
