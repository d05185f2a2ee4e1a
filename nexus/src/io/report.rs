//! Run report persistence under `<dir>/<run_id>/`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::engine::RunResult;
use crate::io::config::write_atomic;

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub dir: PathBuf,
    pub result_path: PathBuf,
    pub iterations_dir: PathBuf,
    pub output_path: PathBuf,
}

impl ReportPaths {
    pub fn new(root: &Path, run_id: &str) -> Self {
        let dir = root.join(run_id);
        Self {
            result_path: dir.join("result.json"),
            iterations_dir: dir.join("iterations"),
            output_path: dir.join("output.md"),
            dir,
        }
    }

    pub fn iteration_path(&self, iteration: u32) -> PathBuf {
        self.iterations_dir.join(format!("{iteration}.json"))
    }
}

/// Write `result.json`, one `iterations/<n>.json` per pass and, when the run
/// produced content, `output.md`.
pub fn write_run_report(root: &Path, result: &RunResult) -> Result<ReportPaths> {
    let paths = ReportPaths::new(root, result.run_id());

    // Snapshots first so result.json only appears once the report is complete.
    for snapshot in result.state().history() {
        write_json(&paths.iteration_path(snapshot.iteration), snapshot)?;
    }
    if let Some(output) = result.terminal_output() {
        let mut buf = output.to_string();
        buf.push('\n');
        write_atomic(&paths.output_path, &buf)?;
    }
    write_json(&paths.result_path, result)?;
    Ok(paths)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    buf.push('\n');
    write_atomic(path, &buf)
}
