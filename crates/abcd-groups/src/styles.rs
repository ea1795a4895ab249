//! Display labels, colors and supergroup definitions.
//!
//! Built-in tables can be extended from the `styles:` section of the plot
//! configuration YAML; entries given there replace the built-in ones.

use std::collections::BTreeMap;

use abcd_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// A group of process groups drawn as one stack entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supergroup {
    /// Name of the merged group.
    pub name: String,
    /// Groups merged into it.
    pub members: Vec<String>,
}

/// Style tables for processes and axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Styles {
    /// Legend labels by group name.
    pub process_labels: BTreeMap<String, String>,
    /// Hex colors by group name.
    pub process_colors: BTreeMap<String, String>,
    /// Axis titles by axis name.
    pub xlabels: BTreeMap<String, String>,
    /// Supergroups per analysis mode, in drawing order.
    pub process_supergroups: BTreeMap<String, Vec<Supergroup>>,
}

fn table(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn supergroups(entries: &[(&str, &[&str])]) -> Vec<Supergroup> {
    entries
        .iter()
        .map(|(name, members)| Supergroup {
            name: name.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
        })
        .collect()
}

impl Default for Styles {
    fn default() -> Self {
        let process_labels = table(&[
            ("Data", "Data"),
            ("Wmunu", "W\u{00B1}\u{2192}\u{03BC}\u{03BD}"),
            ("Wtaunu", "W\u{00B1}\u{2192}\u{03C4}\u{03BD}"),
            ("Zmumu", "Z\u{2192}\u{03BC}\u{03BC}"),
            ("Ztautau", "Z\u{2192}\u{03C4}\u{03C4}"),
            ("Z", "Z"),
            ("Top", "Top"),
            ("Diboson", "Diboson"),
            ("Rare", "Other"),
            ("Other", "Other"),
            ("QCD", "QCD MC"),
            ("Fake", "Nonprompt"),
        ]);
        let process_colors = table(&[
            ("Data", "#000000"),
            ("Wmunu", "#8B0000"),
            ("Wtaunu", "#FFA500"),
            ("Zmumu", "#ADD8E6"),
            ("Ztautau", "#00008B"),
            ("Z", "#ADD8E6"),
            ("Top", "#008000"),
            ("Diboson", "#FFC0CB"),
            ("Rare", "#BEBEBE"),
            ("Other", "#BEBEBE"),
            ("QCD", "#808080"),
            ("Fake", "#808080"),
        ]);
        let xlabels = table(&[
            ("pt", "p\u{1D1B} (GeV)"),
            ("eta", "\u{03B7}"),
            ("abseta", "|\u{03B7}|"),
            ("charge", "charge"),
            ("mt", "m\u{1D1B} (GeV)"),
            ("iso", "I"),
            ("relIso", "I\u{2097}\u{2091}\u{2097}"),
            ("dxy", "d(xy) (cm)"),
            ("passIso", "pass isolation"),
            ("passMT", "pass m\u{1D1B}"),
            ("ptll", "p\u{1D1B}(\u{2113}\u{2113}) (GeV)"),
            ("mll", "m(\u{2113}\u{2113}) (GeV)"),
            ("yll", "y(\u{2113}\u{2113})"),
            ("ptW", "p\u{1D1B}(W) (GeV)"),
        ]);
        let mut process_supergroups = BTreeMap::new();
        process_supergroups.insert(
            "wmass".to_string(),
            supergroups(&[
                ("Wmunu", &["Wmunu"]),
                ("Wtaunu", &["Wtaunu"]),
                ("Z", &["Zmumu", "Ztautau"]),
                ("Rare", &["Top", "Diboson"]),
                ("Fake", &["Fake"]),
                ("QCD", &["QCD"]),
            ]),
        );
        process_supergroups.insert(
            "dilepton".to_string(),
            supergroups(&[
                ("Zmumu", &["Zmumu"]),
                ("Other", &["Ztautau", "Wmunu", "Wtaunu", "Top", "Diboson"]),
                ("Fake", &["Fake"]),
            ]),
        );
        Self { process_labels, process_colors, xlabels, process_supergroups }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    styles: Option<Styles>,
}

impl Styles {
    /// Built-in tables overlaid with the `styles:` section of a config file.
    pub fn from_config_yaml(yaml: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml_ng::from_str(yaml)
            .map_err(|e| Error::Validation(format!("styles config: {e}")))?;
        let mut styles = Self::default();
        if let Some(user) = file.styles {
            styles.merge(user);
        }
        Ok(styles)
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(&mut self, other: Styles) {
        self.process_labels.extend(other.process_labels);
        self.process_colors.extend(other.process_colors);
        self.xlabels.extend(other.xlabels);
        self.process_supergroups.extend(other.process_supergroups);
    }

    /// Legend label, falling back to the group name.
    pub fn label<'a>(&'a self, name: &'a str) -> &'a str {
        self.process_labels.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Group color, if one is defined.
    pub fn color(&self, name: &str) -> Option<&str> {
        self.process_colors.get(name).map(String::as_str)
    }

    /// Axis title, falling back to the axis name.
    pub fn xlabel<'a>(&'a self, axis: &'a str) -> &'a str {
        self.xlabels.get(axis).map(String::as_str).unwrap_or(axis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_section_overrides_builtins() {
        let yaml = r##"
theme: cms
styles:
  process_labels:
    Fake: "Nonprompt (ABCD)"
  xlabels:
    newvar: "my variable"
"##;
        let s = Styles::from_config_yaml(yaml).unwrap();
        assert_eq!(s.label("Fake"), "Nonprompt (ABCD)");
        assert_eq!(s.xlabel("newvar"), "my variable");
        assert_eq!(s.label("Top"), "Top");
        assert_eq!(s.label("unknown"), "unknown");
        assert!(s.process_supergroups.contains_key("wmass"));
    }

    #[test]
    fn config_without_styles_gives_defaults() {
        let s = Styles::from_config_yaml("theme: atlas\n").unwrap();
        assert_eq!(s, Styles::default());
    }
}
