//! Plot directories, rendered files and run logs.

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use abcd_core::Meta;
use abcd_groups::{Styles, YieldTable};
use abcd_viz_render::config::VizConfig;

use crate::PlotArgs;

/// Everything a command needs besides its own arguments.
pub struct PlotContext {
    pub args: PlotArgs,
    pub config: VizConfig,
    pub styles: Styles,
    pub command: String,
    /// Full command line as JSON, written to the run logs.
    pub invocation: serde_json::Value,
}

impl PlotContext {
    /// `name`, with `_{postfix}` when a postfix is set.
    pub fn outfile(&self, name: &str) -> String {
        match self.args.postfix.as_deref() {
            Some(p) if !p.is_empty() => format!("{name}_{p}"),
            _ => name.to_string(),
        }
    }

    /// `outpath/outfolder/sub`, created if needed.
    pub fn plot_dir(&self, sub: &str) -> Result<PathBuf> {
        let folder = if sub.is_empty() {
            self.args.outfolder.clone()
        } else {
            format!("{}/{}", self.args.outfolder.trim_end_matches('/'), sub)
        };
        make_plot_dir(&self.args.outpath, &folder)
    }
}

/// Create `outpath/folder` (and parents).
pub fn make_plot_dir(outpath: &Path, folder: &str) -> Result<PathBuf> {
    let dir = outpath.join(folder);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating plot directory {}", dir.display()))?;
    Ok(dir)
}

/// Render `artifact` to `dir/name.pdf` and `dir/name.png`.
///
/// With `--save-artifacts` the artifact itself goes to `dir/name.json`.
pub fn save_pdf_and_png<T: Serialize>(
    ctx: &PlotContext,
    dir: &Path,
    name: &str,
    kind: &str,
    artifact: &T,
) -> Result<()> {
    let json = serde_json::to_string(artifact)?;
    for ext in ["pdf", "png"] {
        let path = dir.join(format!("{name}.{ext}"));
        abcd_viz_render::render_to_file(&json, kind, &path, &ctx.config)
            .with_context(|| format!("rendering {}", path.display()))?;
    }
    if ctx.args.save_artifacts {
        std::fs::write(dir.join(format!("{name}.json")), serde_json::to_string_pretty(artifact)?)?;
    }
    tracing::info!(dir = %dir.display(), name, kind, "saved plot");
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    let out = h.finalize();
    let mut s = String::with_capacity(64);
    for b in out {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[derive(Debug, Clone, Serialize)]
struct InputMeta {
    path: String,
    sha256: String,
}

#[derive(Debug, Clone, Serialize)]
struct RunLog<'a> {
    tool: &'static str,
    tool_version: &'static str,
    created_unix_ms: u128,
    command: &'a str,
    args: &'a serde_json::Value,
    input: InputMeta,
    meta: &'a Meta,
    yields: &'a [YieldTable],
}

/// Write `dir/name.log` and regenerate `dir/index.html`.
///
/// The log is JSON: command line, checksum of the input file, the input's
/// metadata and the yield tables. Readable copies of the tables follow
/// in `dir/name_yields.txt` when there are any.
pub fn write_index_and_log(
    ctx: &PlotContext,
    dir: &Path,
    name: &str,
    input: &Path,
    meta: &Meta,
    yields: &[YieldTable],
) -> Result<()> {
    let bytes =
        std::fs::read(input).with_context(|| format!("reading input {}", input.display()))?;
    let created_unix_ms = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
    let log = RunLog {
        tool: "abcd",
        tool_version: env!("CARGO_PKG_VERSION"),
        created_unix_ms,
        command: &ctx.command,
        args: &ctx.invocation,
        input: InputMeta { path: input.display().to_string(), sha256: sha256_hex(&bytes) },
        meta,
        yields,
    };
    std::fs::write(dir.join(format!("{name}.log")), serde_json::to_string_pretty(&log)? + "\n")?;
    if !yields.is_empty() {
        let text: String = yields.iter().map(|t| format!("{t}\n")).collect();
        std::fs::write(dir.join(format!("{name}_yields.txt")), text)?;
    }
    write_index(dir)
}

/// Regenerate `dir/index.html` with every PNG in the directory.
pub fn write_index(dir: &Path) -> Result<()> {
    let mut pngs: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".png"))
        .collect();
    pngs.sort();
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>plots</title>\n\
         <style>div.pic{display:inline-block;margin:8px;text-align:center}\
         img{width:400px}</style>\n</head>\n<body>\n",
    );
    for png in &pngs {
        let stem = png.trim_end_matches(".png");
        html.push_str(&format!(
            "<div class=\"pic\"><a href=\"{stem}.pdf\"><img src=\"{png}\"></a><br>{stem}</div>\n"
        ));
    }
    html.push_str("</body>\n</html>\n");
    std::fs::write(dir.join("index.html"), html)?;
    tracing::debug!(dir = %dir.display(), plots = pngs.len(), "wrote index.html");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn index_lists_pngs_in_order() {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let dir = std::env::temp_dir().join(format!("abcd_index_{}_{}", std::process::id(), nanos));
        std::fs::create_dir_all(&dir).unwrap();
        for f in ["b.png", "a.png", "a.pdf", "notes.txt"] {
            std::fs::write(dir.join(f), b"x").unwrap();
        }
        write_index(&dir).unwrap();
        let html = std::fs::read_to_string(dir.join("index.html")).unwrap();
        let a = html.find("src=\"a.png\"").unwrap();
        let b = html.find("src=\"b.png\"").unwrap();
        assert!(a < b);
        assert!(!html.contains("notes"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
