//! Histogram container files (`.json`, `.json.gz`).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::{Error, Histogram, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn default_scale() -> f64 {
    1.0
}

/// Run-level metadata stored alongside the histograms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Analysis mode (e.g. `wmass`, `dilepton`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Integrated luminosity in fb^-1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lumi: Option<f64>,
    /// Everything else, kept verbatim for the run log.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One dataset and its histograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    /// True for collision data.
    #[serde(default)]
    pub is_data: bool,
    /// Process group the dataset belongs to.
    pub group: String,
    /// Normalisation factor applied on load (cross section times luminosity).
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Histograms by name.
    pub hists: BTreeMap<String, Histogram>,
}

/// All datasets of one input file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistContainer {
    /// Run metadata.
    #[serde(default)]
    pub meta: Meta,
    /// Datasets by name.
    pub datasets: BTreeMap<String, DatasetEntry>,
}

impl HistContainer {
    /// Parse a container from (possibly gzip-compressed) bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let container: Self = if bytes.starts_with(&GZIP_MAGIC) {
            let mut raw = Vec::new();
            GzDecoder::new(bytes).read_to_end(&mut raw)?;
            serde_json::from_slice(&raw)?
        } else {
            serde_json::from_slice(bytes)?
        };
        container.validate()?;
        Ok(container)
    }

    /// Load a container file; gzip is detected from the content.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut bytes = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
        let container = Self::from_slice(&bytes)?;
        tracing::debug!(
            path = %path.display(),
            datasets = container.datasets.len(),
            "loaded histogram container"
        );
        Ok(container)
    }

    /// Write the container; paths ending in `.gz` are compressed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = BufWriter::new(File::create(path)?);
        if path.extension().is_some_and(|e| e == "gz") {
            let mut enc = GzEncoder::new(file, Compression::default());
            serde_json::to_writer(&mut enc, self)?;
            enc.finish()?.flush()?;
        } else {
            let mut file = file;
            serde_json::to_writer(&mut file, self)?;
            file.flush()?;
        }
        Ok(())
    }

    /// Check every histogram's storage against its axes.
    pub fn validate(&self) -> Result<()> {
        for (name, ds) in &self.datasets {
            for (hname, h) in &ds.hists {
                h.validate().map_err(|e| {
                    Error::Validation(format!("dataset '{name}', histogram '{hname}': {e}"))
                })?;
            }
        }
        Ok(())
    }

    /// Names of all datasets belonging to `group`.
    pub fn datasets_in_group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.datasets.iter().filter(move |(_, d)| d.group == group).map(|(n, _)| n.as_str())
    }

    /// A histogram of one dataset, already multiplied by the dataset scale.
    pub fn hist(&self, dataset: &str, name: &str) -> Result<Histogram> {
        let ds = self
            .datasets
            .get(dataset)
            .ok_or_else(|| Error::Validation(format!("no dataset '{dataset}' in input")))?;
        let h = ds.hists.get(name).ok_or_else(|| {
            Error::Validation(format!("dataset '{dataset}' has no histogram '{name}'"))
        })?;
        Ok(if ds.scale == 1.0 { h.clone() } else { h.scale(ds.scale) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Axis;

    fn container() -> HistContainer {
        let mut h = Histogram::new(vec![Axis::variable("pt", vec![26.0, 40.0, 56.0])]).unwrap();
        h.fill(&[30.0], 2.0).unwrap();
        let mut hists = BTreeMap::new();
        hists.insert("nominal".to_string(), h);
        let mut datasets = BTreeMap::new();
        datasets.insert(
            "WplusmunuPostVFP".to_string(),
            DatasetEntry { is_data: false, group: "Wmunu".into(), scale: 0.5, hists },
        );
        HistContainer {
            meta: Meta { mode: Some("wmass".into()), lumi: Some(16.8), extra: BTreeMap::new() },
            datasets,
        }
    }

    #[test]
    fn json_and_gzip_round_trip() {
        let dir = std::env::temp_dir().join(format!("abcd_io_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let c = container();
        for name in ["c.json", "c.json.gz"] {
            let p = dir.join(name);
            c.save(&p).unwrap();
            assert_eq!(HistContainer::load(&p).unwrap(), c);
        }
        let gz = std::fs::read(dir.join("c.json.gz")).unwrap();
        assert!(gz.starts_with(&GZIP_MAGIC));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn hist_applies_dataset_scale() {
        let c = container();
        let h = c.hist("WplusmunuPostVFP", "nominal").unwrap();
        assert_eq!(h.values(false), vec![1.0, 0.0]);
        assert!(c.hist("WplusmunuPostVFP", "missing").is_err());
        assert_eq!(c.datasets_in_group("Wmunu").collect::<Vec<_>>(), vec!["WplusmunuPostVFP"]);
    }

    #[test]
    fn bad_storage_is_rejected_on_load() {
        let json = r#"{"datasets":{"d":{"group":"g","hists":{"h":
            {"axes":[{"name":"x","type":"boolean"}],"values":[1.0],"variances":[1.0]}}}}}"#;
        let err = HistContainer::from_slice(json.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("dataset 'd'"));
    }
}
