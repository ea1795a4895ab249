use abcd_core::{Axis, Histogram};
use abcd_viz::{Chi2Artifact, ClosureArtifact, ClosureInput};
use abcd_viz_render::config::{VizConfig, resolve_config};
use abcd_viz_render::{KINDS, RenderError, render_svg, render_to_bytes};
use serde_json::json;

fn assert_svg(svg: &str) {
    assert!(svg.starts_with("<svg"), "not an svg: {}", &svg[..svg.len().min(80)]);
    assert!(svg.trim_end().ends_with("</svg>"));
    assert!(!svg.contains("NaN"));
    assert!(!svg.contains("inf"));
}

fn stack_json() -> String {
    json!({
        "x_label": "p\u{1D1B} (GeV)",
        "y_label": "Events/GeV",
        "rlabel": "Data/Pred.",
        "rrange": [0.9, 1.1],
        "edges": [26.0, 30.0, 40.0, 56.0],
        "logy": false,
        "ylim": [0.0, 130.0],
        "lumi": 16.8,
        "no_fill": false,
        "stacked": [
            {"label": "Nonprompt", "color": "#808080", "values": [10.0, 8.0, 2.0], "errors": [1.0, 1.0, 0.5]},
            {"label": "W\u{00B1}\u{2192}\u{03BC}\u{03BD}", "color": "#8B0000", "values": [80.0, 60.0, 20.0], "errors": [2.0, 2.0, 1.0]}
        ],
        "unstacked": [
            {"label": "pdf up", "color": "#1f77b4", "linestyle": "--", "values": [91.0, 69.0, 22.5], "errors": [0.0, 0.0, 0.0]}
        ],
        "data": {"label": "Data", "values": [92.0, 67.0, 23.0], "errors": [9.6, 8.2, 4.8]},
        "band": {"lo": [88.0, 66.0, 21.0], "hi": [92.0, 70.0, 23.0]},
        "ratio": {"label": "Data", "values": [1.02, 0.98, 1.05], "errors": [0.1, 0.1, 0.2]},
        "ratio_unstacked": [
            {"label": "pdf up", "color": "#1f77b4", "linestyle": "--", "values": [1.01, 1.01, 1.02], "errors": [0.0, 0.0, 0.0]}
        ],
        "ratio_band": {"lo": [0.98, 0.97, 0.95], "hi": [1.02, 1.03, 1.05]},
        "yields": []
    })
    .to_string()
}

#[test]
fn stack_renders_labels_and_lumi() {
    let svg = render_svg(&stack_json(), "stack", &VizConfig::default()).unwrap();
    assert_svg(&svg);
    assert!(svg.contains("Nonprompt"));
    assert!(svg.contains("pdf up"));
    assert!(svg.contains("Data/Pred."));
    assert!(svg.contains("16.8 fb"));
    // hatched uncertainty band by default
    assert!(svg.contains("<pattern"));
}

#[test]
fn log_stack_without_hatch() {
    let mut v: serde_json::Value = serde_json::from_str(&stack_json()).unwrap();
    v["logy"] = json!(true);
    v["ylim"] = json!([1.0, 10000.0]);
    let config = resolve_config(Some("stack:\n  band_hatch: false\n")).unwrap();
    let svg = render_svg(&v.to_string(), "stack", &config).unwrap();
    assert_svg(&svg);
    assert!(!svg.contains("<pattern"));
    assert!(svg.contains("10\u{00B3}"));
}

#[test]
fn chi2_histogram_renders() {
    let values: Vec<f64> = (0..200).map(|i| 5.0 + (i % 20) as f64 * 0.5).collect();
    let art = Chi2Artifact::from_values("QCD", &values, 8, None).unwrap();
    let svg = render_svg(&serde_json::to_string(&art).unwrap(), "chi2", &VizConfig::default()).unwrap();
    assert_svg(&svg);
    assert!(svg.contains("ndf = 8"));
    assert!(svg.contains("200 fits"));
}

#[test]
fn chi2_without_degrees_of_freedom_has_no_density_curve() {
    let art = Chi2Artifact::from_values("QCD", &[0.0, 0.0, 1e-9], 0, Some((0.0, 5.0))).unwrap();
    let svg = render_svg(&serde_json::to_string(&art).unwrap(), "chi2", &VizConfig::default()).unwrap();
    assert_svg(&svg);
    assert!(svg.contains("ndf = 0"));
    assert!(!svg.contains("<polyline"));
}

#[test]
fn closure_renders_ratio_title() {
    let pred = |scale: f64| {
        let mut h = Histogram::new(vec![Axis::variable("pt", vec![26.0, 40.0, 56.0])]).unwrap();
        h.fill(&[30.0], 10.0 * scale).unwrap();
        h.fill(&[50.0], 5.0 * scale).unwrap();
        h
    };
    let inputs = vec![
        ClosureInput { label: "QCD MC".into(), color: "#808080".into(), hist: pred(1.0) },
        ClosureInput { label: "ABCD".into(), color: "#ff0000".into(), hist: pred(1.1) },
    ];
    let art = ClosureArtifact::build("Closure", "p\u{1D1B} (GeV)", [0.5, 1.5], &inputs).unwrap();
    let svg = render_svg(&serde_json::to_string(&art).unwrap(), "closure", &VizConfig::default()).unwrap();
    assert_svg(&svg);
    assert!(svg.contains("1/QCD MC"));
    assert!(svg.contains("ABCD"));
}

#[test]
fn empty_artifacts_give_placeholders() {
    let map = json!({
        "title": "offset", "x_label": "x", "y_label": "y",
        "x_edges": [], "y_edges": [], "values": []
    });
    let svg = render_svg(&map.to_string(), "param_map", &VizConfig::default()).unwrap();
    assert!(svg.contains("No parameter map"));
}

#[test]
fn unknown_kind_and_bad_json() {
    assert!(matches!(
        render_svg("{}", "pie", &VizConfig::default()),
        Err(RenderError::UnknownKind(_))
    ));
    assert!(matches!(
        render_svg("{", "stack", &VizConfig::default()),
        Err(RenderError::Deserialize(_))
    ));
    assert!(KINDS.contains(&"sideband_fit"));
}

#[cfg(feature = "png")]
#[test]
fn png_has_signature() {
    let bytes = render_to_bytes(&stack_json(), "stack", "png", &VizConfig::default()).unwrap();
    assert_eq!(&bytes[..4], b"\x89PNG");
}

#[cfg(feature = "pdf")]
#[test]
fn pdf_has_header() {
    let bytes = render_to_bytes(&stack_json(), "stack", "pdf", &VizConfig::default()).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn svg_bytes_roundtrip_text() {
    let bytes = render_to_bytes(&stack_json(), "stack", "svg", &VizConfig::default()).unwrap();
    assert!(String::from_utf8(bytes).unwrap().contains("Events/GeV"));
}
