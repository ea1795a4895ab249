//! Process groups built from the datasets of a histogram container.
//!
//! A group sums the histograms of its member datasets. Histograms pass
//! through a fixed chain when loaded: preselection, optional rebinning,
//! region selection, optional rebinning. The pseudo-group [`FAKE`] is data
//! minus prompt simulation, estimated in the signal region with the simple
//! ABCD method when the ABCD selection is active.

use std::collections::BTreeMap;

use abcd_core::{AxisKind, Error, HistContainer, Histogram, Meta, Result};
use abcd_select::{abcd_axes, fake_hist_simple, signal_hist};

use crate::styles::Styles;

/// Name of the nonprompt pseudo-group.
pub const FAKE: &str = "Fake";
/// Name of the collision-data group.
pub const DATA: &str = "Data";
/// Simulated groups that are not prompt and are never subtracted from data.
pub const NONPROMPT_MC: [&str; 1] = ["QCD"];

/// One process group.
#[derive(Debug, Clone)]
pub struct Group {
    /// Group name.
    pub name: String,
    /// Legend label.
    pub label: String,
    /// Hex color.
    pub color: String,
    /// Member dataset names.
    pub members: Vec<String>,
    /// Whether this is collision data.
    pub is_data: bool,
    /// Whether this is a derived group (fake estimate or summed variation).
    pub derived: bool,
    /// Loaded histograms by name.
    pub hists: BTreeMap<String, Histogram>,
}

impl Group {
    /// Loaded histogram by name.
    pub fn hist(&self, name: &str) -> Result<&Histogram> {
        self.hists.get(name).ok_or_else(|| {
            Error::Validation(format!("group '{}' has no loaded histogram '{}'", self.name, name))
        })
    }
}

/// Global preselection applied before anything else.
#[derive(Debug, Clone, PartialEq)]
pub enum Presel {
    /// Sum the coordinate range `[lo, hi)` of an axis.
    Range {
        /// Axis name.
        axis: String,
        /// Lower edge.
        lo: f64,
        /// Upper edge.
        hi: f64,
    },
    /// Sum an axis completely (boolean axes).
    Integrate {
        /// Axis name.
        axis: String,
    },
}

impl Presel {
    /// Parse `axis=lo,hi` or a bare `axis`.
    pub fn parse(s: &str) -> Result<Self> {
        let Some((axis, range)) = s.split_once('=') else {
            return Ok(Presel::Integrate { axis: s.to_string() });
        };
        let bounds: Vec<f64> = range
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Validation(format!("bad preselection '{s}': {e}")))?;
        let [lo, hi] = bounds[..] else {
            return Err(Error::Validation(format!(
                "preselection '{s}' needs exactly two values, axis=lo,hi"
            )));
        };
        Ok(Presel::Range { axis: axis.to_string(), lo, hi })
    }

    fn apply(&self, h: &Histogram) -> Result<Histogram> {
        match self {
            Presel::Range { axis, lo, hi } => h.integrate(axis, Some(*lo), Some(*hi)),
            Presel::Integrate { axis } => h.sum_axis(axis),
        }
    }
}

/// How histograms are reduced to the plotted region.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Selection {
    /// Signal region of the ABCD plane; [`FAKE`] from the simple ABCD estimate.
    #[default]
    Abcd,
    /// Fixed bins, e.g. `passIso=0,passMT=1`.
    Bins(Vec<(String, usize)>),
    /// No selection.
    None,
}

impl Selection {
    /// Parse `none` or a comma separated `axis=index` list.
    pub fn parse(s: &str) -> Result<Self> {
        if s == "none" {
            return Ok(Selection::None);
        }
        let mut bins = Vec::new();
        for item in s.split(',') {
            let (axis, value) = item.split_once('=').ok_or_else(|| {
                Error::Validation(format!("selection '{item}' must look like axis=index"))
            })?;
            let idx = value.trim().parse::<usize>().map_err(|e| {
                Error::Validation(format!("selection '{item}': index must be an integer ({e})"))
            })?;
            bins.push((axis.trim().to_string(), idx));
        }
        Ok(Selection::Bins(bins))
    }
}

/// Per-variable rebinning (`--rebin`, `--absval`, `--axlim`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RebinAction {
    /// Variables the lists below refer to, in order.
    pub vars: Vec<String>,
    /// `[lo0, hi0, lo1, hi1, ...]`; trailing variables may be omitted.
    pub axlim: Vec<f64>,
    /// Merge factor per variable; trailing variables may be omitted.
    pub rebin: Vec<usize>,
    /// Fold to `|x|` per variable; trailing variables may be omitted.
    pub absval: Vec<bool>,
}

impl RebinAction {
    /// Check list lengths against the variables.
    pub fn validate(&self) -> Result<()> {
        if self.axlim.len() % 2 != 0 {
            return Err(Error::Validation(format!(
                "--axlim needs pairs of values, got {}",
                self.axlim.len()
            )));
        }
        let n = self.vars.len();
        if self.axlim.len() / 2 > n || self.rebin.len() > n || self.absval.len() > n {
            return Err(Error::Validation(format!(
                "more rebinning options than variables {:?}",
                self.vars
            )));
        }
        Ok(())
    }

    /// Whether any operation is requested.
    pub fn is_empty(&self) -> bool {
        self.axlim.is_empty() && self.rebin.is_empty() && !self.absval.iter().any(|&a| a)
    }

    /// Apply to one histogram: `|x|`, then range restriction, then merging.
    pub fn apply(&self, h: &Histogram) -> Result<Histogram> {
        let mut out = h.clone();
        for (i, var) in self.vars.iter().enumerate() {
            if self.absval.get(i).copied().unwrap_or(false) {
                out = out.abs_axis(var)?;
            }
            if let (Some(&lo), Some(&hi)) = (self.axlim.get(2 * i), self.axlim.get(2 * i + 1)) {
                out = out.restrict(var, lo, hi)?;
            }
            if let Some(&factor) = self.rebin.get(i)
                && factor > 1
            {
                out = out.rebin_factor(var, factor)?;
            }
        }
        Ok(out)
    }
}

/// A summed-process variation added next to the nominal stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Variation {
    /// Histogram to read (empty = nominal).
    pub hist_name: String,
    /// Group name under which the sum is stored.
    pub name: String,
    /// Legend label.
    pub label: String,
    /// Hex color.
    pub color: String,
    /// Optional `(axis, entry)` to select on the variation histogram.
    pub select: Option<(String, String)>,
}

/// All process groups of one input file.
pub struct Datagroups {
    container: HistContainer,
    styles: Styles,
    groups: Vec<Group>,
    presel: Vec<Presel>,
    rebin: Option<RebinAction>,
    rebin_before_selection: bool,
    selection: Selection,
    fake_integration_axes: Vec<String>,
}

impl Datagroups {
    /// Group datasets by their `group` field.
    ///
    /// With `filter`, only the listed groups are kept (in any order);
    /// otherwise every group except those in `exclude`. [`FAKE`] is added
    /// when data and prompt simulation are present.
    pub fn new(
        container: HistContainer,
        styles: Styles,
        filter: Option<&[String]>,
        exclude: &[&str],
    ) -> Result<Self> {
        let mut by_name: BTreeMap<String, Group> = BTreeMap::new();
        for (ds_name, ds) in &container.datasets {
            let g = by_name.entry(ds.group.clone()).or_insert_with(|| Group {
                name: ds.group.clone(),
                label: styles.label(&ds.group).to_string(),
                color: styles.color(&ds.group).unwrap_or("#808080").to_string(),
                members: Vec::new(),
                is_data: ds.is_data,
                derived: false,
                hists: BTreeMap::new(),
            });
            if g.is_data != ds.is_data {
                return Err(Error::Validation(format!(
                    "group '{}' mixes data and simulation (dataset '{}')",
                    g.name, ds_name
                )));
            }
            g.members.push(ds_name.clone());
        }

        let has_data = by_name.values().any(|g| g.is_data);
        let has_prompt = by_name.values().any(|g| !g.is_data && !NONPROMPT_MC.contains(&g.name.as_str()));
        let mut groups: Vec<Group> = Vec::new();
        // data first, then simulation in name order
        let (data, mc): (Vec<Group>, Vec<Group>) = by_name.into_values().partition(|g| g.is_data);
        groups.extend(data);
        groups.extend(mc);
        if has_data && has_prompt {
            groups.push(Group {
                name: FAKE.to_string(),
                label: styles.label(FAKE).to_string(),
                color: styles.color(FAKE).unwrap_or("#808080").to_string(),
                members: Vec::new(),
                is_data: false,
                derived: true,
                hists: BTreeMap::new(),
            });
        }

        groups.retain(|g| match filter {
            Some(f) => f.iter().any(|n| n == &g.name),
            None => !exclude.contains(&g.name.as_str()),
        });
        if let Some(f) = filter {
            for name in f {
                if !groups.iter().any(|g| &g.name == name) {
                    tracing::warn!(group = %name, "requested group not found in input");
                }
            }
        }
        tracing::info!(groups = ?groups.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(), "datagroups");

        Ok(Self {
            container,
            styles,
            groups,
            presel: Vec::new(),
            rebin: None,
            rebin_before_selection: false,
            selection: Selection::Abcd,
            fake_integration_axes: Vec::new(),
        })
    }

    /// Run metadata of the input.
    pub fn meta(&self) -> &Meta {
        &self.container.meta
    }

    /// Analysis mode from the metadata.
    pub fn mode(&self) -> Option<&str> {
        self.container.meta.mode.as_deref()
    }

    /// Integrated luminosity from the metadata (1 if absent).
    pub fn lumi(&self) -> f64 {
        self.container.meta.lumi.unwrap_or(1.0)
    }

    /// Style tables in use.
    pub fn styles(&self) -> &Styles {
        &self.styles
    }

    /// Groups in their current order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Group by name.
    pub fn group(&self, name: &str) -> Result<&Group> {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| Error::Validation(format!("no group '{name}'")))
    }

    /// Group names in order.
    pub fn names(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.name.clone()).collect()
    }

    /// Set the global preselection.
    pub fn set_presel(&mut self, presel: Vec<Presel>) {
        self.presel = presel;
    }

    /// Set the rebinning applied before or after the region selection.
    pub fn set_rebin_action(&mut self, action: RebinAction, before_selection: bool) -> Result<()> {
        action.validate()?;
        self.rebin = (!action.is_empty()).then_some(action);
        self.rebin_before_selection = before_selection;
        Ok(())
    }

    /// Set the region selection.
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    /// Axes summed when forming the simple ABCD fake-rate factor.
    pub fn set_fake_integration_axes(&mut self, axes: Vec<String>) {
        self.fake_integration_axes = axes;
    }

    /// Merge `old` groups into one group `new_name` placed at the first old group.
    pub fn merge_groups(&mut self, old: &[String], new_name: &str) {
        let Some(pos) = self.groups.iter().position(|g| old.contains(&g.name)) else {
            return;
        };
        let mut merged = Group {
            name: new_name.to_string(),
            label: self.styles.label(new_name).to_string(),
            color: self.styles.color(new_name).unwrap_or("#808080").to_string(),
            members: Vec::new(),
            is_data: false,
            derived: false,
            hists: BTreeMap::new(),
        };
        let mut kept = Vec::with_capacity(self.groups.len());
        for g in std::mem::take(&mut self.groups) {
            if old.contains(&g.name) {
                merged.is_data |= g.is_data;
                merged.derived |= g.derived;
                merged.members.extend(g.members);
            } else {
                kept.push(g);
            }
        }
        // groups before `pos` are never merged, so the slot is unchanged
        kept.insert(pos, merged);
        self.groups = kept;
    }

    /// Merge groups according to the supergroups of the input's mode.
    pub fn apply_supergroups(&mut self) {
        let Some(mode) = self.mode().map(str::to_string) else {
            tracing::warn!("input has no mode, proceed without merging groups");
            return;
        };
        let Some(supers) = self.styles.process_supergroups.get(&mode).cloned() else {
            tracing::warn!(%mode, "no supergroups for mode, proceed without merging groups");
            return;
        };
        for sg in supers {
            self.merge_groups(&sg.members, &sg.name);
        }
    }

    fn read(&self, dataset: &str, name: &str) -> Result<Histogram> {
        let mut h = self.container.hist(dataset, name)?;
        for p in &self.presel {
            h = p.apply(&h)?;
        }
        if self.rebin_before_selection
            && let Some(r) = &self.rebin
        {
            h = r.apply(&h)?;
        }
        Ok(h)
    }

    fn finish(&self, h: Histogram) -> Result<Histogram> {
        match &self.rebin {
            Some(r) if !self.rebin_before_selection => r.apply(&h),
            _ => Ok(h),
        }
    }

    fn select_region(&self, h: &Histogram) -> Result<Histogram> {
        match &self.selection {
            Selection::Abcd => match abcd_axes(h) {
                Ok(axes) => signal_hist(h, &axes),
                Err(_) => Ok(h.clone()),
            },
            Selection::Bins(bins) => {
                let mut out = h.clone();
                for (axis, idx) in bins {
                    if out.has_axis(axis) {
                        out = out.select(axis, *idx)?;
                    }
                }
                Ok(out)
            }
            Selection::None => Ok(h.clone()),
        }
    }

    fn sum_members<'a>(
        &self,
        members: impl IntoIterator<Item = &'a String>,
        name: &str,
        fallback: Option<&str>,
    ) -> Result<Option<Histogram>> {
        let mut total: Option<Histogram> = None;
        for ds in members {
            let has = self.container.datasets.get(ds).is_some_and(|d| d.hists.contains_key(name));
            let h = match (has, fallback) {
                (true, _) => self.read(ds, name)?,
                (false, Some(fb)) => self.read(ds, fb)?,
                (false, None) => self.read(ds, name)?,
            };
            total = Some(match total {
                None => h,
                Some(t) => t.add(&h)?,
            });
        }
        Ok(total)
    }

    /// Datasets of data and of prompt simulation, from all input groups.
    fn data_and_prompt(&self) -> (Vec<String>, Vec<String>) {
        let mut data = Vec::new();
        let mut prompt = Vec::new();
        for (name, ds) in &self.container.datasets {
            if ds.is_data {
                data.push(name.clone());
            } else if !NONPROMPT_MC.contains(&ds.group.as_str()) {
                prompt.push(name.clone());
            }
        }
        (data, prompt)
    }

    /// Data minus prompt simulation, then reduced to the plotted region.
    fn fake_hist(&self, name: &str, fallback: Option<&str>) -> Result<Option<Histogram>> {
        let (data, prompt) = self.data_and_prompt();
        let data_name = fallback.unwrap_or(name);
        let Some(d) = self.sum_members(&data, data_name, None)? else {
            return Ok(None);
        };
        let diff = match self.sum_members(&prompt, name, fallback)? {
            Some(p) => d.sub(&p)?,
            None => d,
        };
        let h = match &self.selection {
            Selection::Abcd => {
                let axes = abcd_axes(&diff)?;
                let int_axes: Vec<&str> = self.fake_integration_axes.iter().map(String::as_str).collect();
                fake_hist_simple(&diff, &axes, &int_axes)?
            }
            _ => self.select_region(&diff)?,
        };
        Ok(Some(h))
    }

    /// Load `read_name` for every group and store it under `store_as`.
    ///
    /// Missing histograms are an error.
    pub fn load_hists(&mut self, read_name: &str, store_as: &str) -> Result<()> {
        let mut loaded: Vec<(usize, Histogram)> = Vec::new();
        for (i, g) in self.groups.iter().enumerate() {
            let h = if g.name == FAKE {
                self.fake_hist(read_name, None)?
            } else {
                self.sum_members(&g.members, read_name, None)?
                    .map(|h| self.select_region(&h))
                    .transpose()?
            };
            if let Some(h) = h {
                loaded.push((i, self.finish(h)?));
            } else {
                tracing::warn!(group = %g.name, "no datasets to load");
            }
        }
        for (i, h) in loaded {
            self.groups[i].hists.insert(store_as.to_string(), h);
        }
        tracing::info!(hist = %read_name, stored = %store_as, "loaded histograms for datagroups");
        Ok(())
    }

    /// Add a group summing every simulated group not in `exclude`.
    ///
    /// Datasets without the variation histogram fall back to `nominal`; data
    /// always uses `nominal`. The result is stored under `store_as`.
    pub fn add_summed_variation(
        &mut self,
        variation: &Variation,
        nominal: &str,
        store_as: &str,
        exclude: &[String],
    ) -> Result<()> {
        let read = if variation.hist_name.is_empty() { nominal } else { &variation.hist_name };
        let mut total: Option<Histogram> = None;
        for g in &self.groups {
            if g.is_data || exclude.contains(&g.name) {
                continue;
            }
            let h = if g.name == FAKE {
                self.fake_hist(read, Some(nominal))?
            } else {
                self.sum_members(&g.members, read, Some(nominal))?
                    .map(|h| self.select_region(&h))
                    .transpose()?
            };
            let Some(h) = h else { continue };
            let h = match &variation.select {
                Some((axis, entry)) if h.has_axis(axis) => select_entry(&h, axis, entry)?,
                _ => h,
            };
            let h = self.finish(h)?;
            total = Some(match total {
                None => h,
                Some(t) => t.add(&h)?,
            });
        }
        let h = total.ok_or_else(|| {
            Error::Validation(format!("variation '{}' has no simulated groups to sum", variation.name))
        })?;
        let mut hists = BTreeMap::new();
        hists.insert(store_as.to_string(), h);
        self.groups.push(Group {
            name: variation.name.clone(),
            label: variation.label.clone(),
            color: variation.color.clone(),
            members: Vec::new(),
            is_data: false,
            derived: true,
            hists,
        });
        tracing::info!(variation = %variation.name, hist = %read, "added summed variation");
        Ok(())
    }

    /// Order groups by decreasing yield of `hist_name`; data stays first.
    pub fn sort_by_yields(&mut self, hist_name: &str) {
        let yield_of = |g: &Group| g.hists.get(hist_name).map(|h| h.total(true).0).unwrap_or(0.0);
        self.groups.sort_by(|a, b| {
            b.is_data
                .cmp(&a.is_data)
                .then_with(|| yield_of(b).total_cmp(&yield_of(a)))
        });
    }
}

/// Select a category label, or a bin index when `entry` is an integer.
pub fn select_entry(h: &Histogram, axis: &str, entry: &str) -> Result<Histogram> {
    let ax = h.axis(axis)?;
    if let AxisKind::Category { .. } = ax.kind
        && ax.label_index(entry).is_some()
    {
        return h.select_label(axis, entry);
    }
    let idx = entry.parse::<usize>().map_err(|_| {
        Error::Validation(format!("entry '{entry}' is neither a label nor an index of axis '{axis}'"))
    })?;
    h.select(axis, idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use abcd_core::{Axis, DatasetEntry};
    use approx::assert_relative_eq;

    fn hist(scale: f64) -> Histogram {
        let mut h = Histogram::new(vec![
            Axis::variable("pt", vec![26.0, 40.0, 56.0]),
            Axis::boolean("passMT"),
            Axis::boolean("passIso"),
        ])
        .unwrap();
        for (pt, mt, iso, w) in [
            (30.0, 0.0, 0.0, 40.0),
            (30.0, 0.0, 1.0, 10.0),
            (30.0, 1.0, 0.0, 8.0),
            (30.0, 1.0, 1.0, 3.0),
            (45.0, 1.0, 1.0, 6.0),
        ] {
            h.fill(&[pt, mt, iso], w * scale).unwrap();
        }
        h
    }

    fn container() -> HistContainer {
        let mut c = HistContainer::default();
        c.meta.mode = Some("wmass".into());
        for (name, group, is_data, scale) in [
            ("SingleMuon", "Data", true, 2.0),
            ("WplusmunuPostVFP", "Wmunu", false, 0.5),
            ("ZmumuPostVFP", "Zmumu", false, 0.25),
            ("ZtautauPostVFP", "Ztautau", false, 0.25),
            ("QCDmuEnrichPt15", "QCD", false, 0.1),
        ] {
            let mut hists = BTreeMap::new();
            hists.insert("nominal".to_string(), hist(scale));
            if !is_data {
                hists.insert("nominal_up".to_string(), hist(scale * 1.1));
            }
            c.datasets.insert(
                name.to_string(),
                DatasetEntry { is_data, group: group.into(), scale: 1.0, hists },
            );
        }
        c
    }

    #[test]
    fn groups_and_fake_pseudo_group() {
        let g = Datagroups::new(container(), Styles::default(), None, &["QCD"]).unwrap();
        assert_eq!(g.names(), vec!["Data", "Wmunu", "Zmumu", "Ztautau", "Fake"]);
        let g = Datagroups::new(container(), Styles::default(), Some(&["Fake".to_string()]), &[])
            .unwrap();
        assert_eq!(g.names(), vec!["Fake"]);
    }

    #[test]
    fn abcd_selection_and_fake_estimate() {
        let mut g = Datagroups::new(container(), Styles::default(), None, &[]).unwrap();
        g.set_fake_integration_axes(vec!["pt".into()]);
        g.load_hists("nominal", "nominal").unwrap();
        let w = g.group("Wmunu").unwrap().hist("nominal").unwrap();
        assert_eq!(w.axis_names(), vec!["pt"]);
        assert_eq!(w.values(false), vec![1.5, 3.0]);

        // data - prompt = (2 - 0.5 - 0.25 - 0.25) * base = 1 * base
        let fake = g.group("Fake").unwrap().hist("nominal").unwrap();
        // factor B/A summed over pt = 10/40, C per pt bin = [8, 0]
        assert_relative_eq!(fake.values(false)[0], 8.0 * 0.25, epsilon = 1e-9);
        assert_relative_eq!(fake.values(false)[1], 0.0);
    }

    #[test]
    fn bin_selection_and_supergroups() {
        let mut g = Datagroups::new(container(), Styles::default(), None, &["QCD"]).unwrap();
        g.apply_supergroups();
        assert_eq!(g.names(), vec!["Data", "Wmunu", "Z", "Fake"]);
        g.set_selection(Selection::parse("passIso=0,passMT=1").unwrap());
        g.load_hists("nominal", "nominal").unwrap();
        let z = g.group("Z").unwrap().hist("nominal").unwrap();
        assert_eq!(z.values(false), vec![8.0 * 0.5, 0.0]);
        g.sort_by_yields("nominal");
        assert_eq!(g.names()[0], "Data");
    }

    #[test]
    fn summed_variation_uses_variation_hists() {
        let mut g = Datagroups::new(container(), Styles::default(), None, &["QCD", "Fake"]).unwrap();
        g.load_hists("nominal", "nominal").unwrap();
        let var = Variation {
            hist_name: "nominal_up".into(),
            name: "up".into(),
            label: "Up".into(),
            color: "#FF0000".into(),
            select: None,
        };
        g.add_summed_variation(&var, "nominal", "nominal", &["Data".to_string()]).unwrap();
        let up = g.group("up").unwrap().hist("nominal").unwrap();
        let sum: f64 = ["Wmunu", "Zmumu", "Ztautau"]
            .iter()
            .map(|n| g.group(n).unwrap().hist("nominal").unwrap().total(true).0)
            .sum();
        assert_relative_eq!(up.total(true).0, 1.1 * sum, epsilon = 1e-9);
    }

    #[test]
    fn parse_presel_and_rebin_validation() {
        assert_eq!(
            Presel::parse("pt=30,40").unwrap(),
            Presel::Range { axis: "pt".into(), lo: 30.0, hi: 40.0 }
        );
        assert_eq!(Presel::parse("passIso").unwrap(), Presel::Integrate { axis: "passIso".into() });
        assert!(Presel::parse("pt=30").is_err());
        let bad = RebinAction { vars: vec!["pt".into()], axlim: vec![1.0], ..Default::default() };
        assert!(bad.validate().is_err());
        assert!(Selection::parse("passIso=x").is_err());
        assert_eq!(Selection::parse("none").unwrap(), Selection::None);
    }
}
