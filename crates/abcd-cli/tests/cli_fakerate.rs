use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use abcd_core::{Axis, DatasetEntry, HistContainer, Histogram, Meta};

const MT_EDGES: [f64; 11] = [0.0, 2.0, 5.0, 9.0, 14.0, 20.0, 27.0, 40.0, 50.0, 70.0, 120.0];
const ISO_EDGES: [f64; 6] = [0.0, 0.15, 0.2, 0.25, 0.3, 0.5];

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_abcd"))
}

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("abcd_cli_{}_{}_{}", std::process::id(), nanos, name));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn centers(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
}

/// Falling pT spectrum, factorized in (mt, iso) with the given shapes.
fn process(mt_shape: impl Fn(f64) -> f64, iso_shape: &[f64], norm: f64) -> Histogram {
    let mut h = Histogram::new(vec![
        Axis::variable("eta", vec![0.0, 2.4]),
        Axis::variable("pt", vec![26.0, 32.0, 38.0, 44.0]),
        Axis::variable("charge", vec![-2.0, 0.0, 2.0]),
        Axis::variable("mt", MT_EDGES.to_vec()),
        Axis::variable("iso", ISO_EDGES.to_vec()),
    ])
    .unwrap();
    let pt = centers(&[26.0, 32.0, 38.0, 44.0]);
    let mt = centers(&MT_EDGES);
    for (ip, p) in pt.iter().enumerate() {
        for ic in 0..2 {
            for (im, m) in mt.iter().enumerate() {
                for (ii, s) in iso_shape.iter().enumerate() {
                    let v = norm * (-0.1 * (p - 26.0)).exp() * mt_shape(*m) * s;
                    h.set_bin(&[0, ip, ic, im, ii], v, v).unwrap();
                }
            }
        }
    }
    h
}

fn dataset(is_data: bool, group: &str, h: Histogram) -> DatasetEntry {
    let mut hists = BTreeMap::new();
    hists.insert("nominal".to_string(), h);
    DatasetEntry { is_data, group: group.to_string(), scale: 1.0, hists }
}

/// QCD, W and their sum as data, written to `dir/input.json.gz`.
fn write_fixture(dir: &Path) -> PathBuf {
    let qcd = process(|m| (-m / 30.0).exp(), &[1.0, 2.0, 2.0, 2.0, 3.0], 2000.0);
    let w = process(|m| 0.1 + m / 40.0, &[10.0, 1.0, 0.5, 0.3, 0.2], 500.0);
    let data = qcd.add(&w).unwrap();
    let mut datasets = BTreeMap::new();
    datasets.insert("QCDmuEnriched".to_string(), dataset(false, "QCD", qcd));
    datasets.insert("WplusmunuPostVFP".to_string(), dataset(false, "Wmunu", w));
    datasets.insert("SingleMuon".to_string(), dataset(true, "Data", data));
    let meta = Meta { mode: Some("wmass".into()), lumi: Some(16.8), ..Meta::default() };
    let container = HistContainer { meta, datasets };
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join("input.json.gz");
    container.save(&path).unwrap();
    path
}

#[test]
fn fakerate_writes_closure_chi2_and_fit_plots() {
    let dir = tmp_dir("fakerate");
    let input = write_fixture(&dir);

    let out = run(&[
        "fakerate",
        input.to_string_lossy().as_ref(),
        "--proc-filters",
        "QCD",
        "-o",
        dir.to_string_lossy().as_ref(),
        "-f",
        "plots",
        "-v",
        "2",
    ]);
    assert!(out.status.success(), "fakerate should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));

    let plots = dir.join("plots");
    for f in ["QCD_closureABCD.png", "QCD_closureABCD.pdf", "QCD_chi2.png", "QCD_chi2.log", "index.html"] {
        assert!(plots.join(f).exists(), "missing {f}");
    }
    assert!(plots.join("plots_mt_QCD/fit_charge1_eta0_pt2.png").exists());
    assert!(plots.join("plots_2D_QCD/offset_0.png").exists());
    assert!(plots.join("plots_2D_QCD/unc_slope_1.pdf").exists());
    assert!(plots.join("plots_1D_QCD/quad_pt/quad_charge0_pt1.png").exists());
    assert!(plots.join("distributions_sideband/plot_sideband_axy_charge1_eta0.png").exists());

    let log: serde_json::Value =
        serde_json::from_slice(&std::fs::read(plots.join("QCD_chi2.log")).unwrap()).unwrap();
    assert_eq!(log["tool"], "abcd");
    assert_eq!(log["command"], "fakerate");
    assert_eq!(log["input"]["sha256"].as_str().unwrap().len(), 64);
    assert_eq!(log["meta"]["mode"], "wmass");

    let index = std::fs::read_to_string(plots.join("index.html")).unwrap();
    assert!(index.contains("QCD_closureABCD.png"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn fakerate_postfix_and_artifacts() {
    let dir = tmp_dir("fakerate_postfix");
    let input = write_fixture(&dir);

    let out = run(&[
        "fakerate",
        input.to_string_lossy().as_ref(),
        "--proc-filters",
        "QCD",
        "--smoothing-axis-name",
        "pt",
        "--smoothing-order",
        "1",
        "1",
        "0",
        "-o",
        dir.to_string_lossy().as_ref(),
        "-f",
        "smooth",
        "-p",
        "v1",
        "--save-artifacts",
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let plots = dir.join("smooth");
    assert!(plots.join("QCD_chi2_v1.png").exists());
    assert!(plots.join("QCD_chi2_v1.json").exists());
    assert!(plots.join("plots_1D_QCD/params/offset_offset_charge0_v1.png").exists());
    assert!(plots.join("plots_1D_QCD/params/slope_slope_charge1_v1.png").exists());
    assert!(!plots.join("plots_2D_QCD").exists());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn fakerate_rejects_short_smoothing_order() {
    let dir = tmp_dir("fakerate_bad");
    let input = write_fixture(&dir);

    let out = run(&[
        "fakerate",
        input.to_string_lossy().as_ref(),
        "--smoothing-axis-name",
        "pt",
        "--smoothing-order",
        "1",
        "-o",
        dir.to_string_lossy().as_ref(),
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--smoothing-order"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn fakerate_exact_sideband_fit_still_writes_plots() {
    let dir = tmp_dir("fakerate_ndf0");
    let input = write_fixture(&dir);

    let out = run(&[
        "fakerate",
        input.to_string_lossy().as_ref(),
        "--proc-filters",
        "QCD",
        "--x-bins-sideband",
        "0",
        "14",
        "27",
        "40",
        "--x-order",
        "2",
        "-o",
        dir.to_string_lossy().as_ref(),
        "-f",
        "exact",
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let plots = dir.join("exact");
    assert!(plots.join("QCD_chi2.png").exists());
    assert!(plots.join("QCD_closureABCD.png").exists());
    assert!(plots.join("plots_mt_QCD/fit_charge0_eta0_pt0.png").exists());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn fakerate_fails_on_missing_process() {
    let dir = tmp_dir("fakerate_missing");
    let input = write_fixture(&dir);

    let out = run(&[
        "fakerate",
        input.to_string_lossy().as_ref(),
        "--proc-filters",
        "QCD",
        "Bogus",
        "-o",
        dir.to_string_lossy().as_ref(),
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Bogus"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn fakerate_rejects_smoothing_along_eta() {
    let dir = tmp_dir("fakerate_smooth_eta");
    let input = write_fixture(&dir);

    let out = run(&[
        "fakerate",
        input.to_string_lossy().as_ref(),
        "--proc-filters",
        "QCD",
        "--smoothing-axis-name",
        "eta",
        "-o",
        dir.to_string_lossy().as_ref(),
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--smoothing-axis-name"));

    std::fs::remove_dir_all(&dir).ok();
}
