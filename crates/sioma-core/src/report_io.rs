use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::time_utils::current_unix_timestamp_ms;

/// Serializes `report` as pretty JSON and publishes it at `path` by renaming
/// a sibling temp file, so a reader polling `path` sees the previous report
/// or the new one in full. Returns the number of bytes written.
pub fn write_json_report<T: Serialize + ?Sized>(path: &Path, report: &T) -> Result<usize> {
    let report_dir = report_parent_dir(path)?;
    let mut payload =
        serde_json::to_string_pretty(report).context("failed to encode report as JSON")?;
    payload.push('\n');

    std::fs::create_dir_all(&report_dir)
        .with_context(|| format!("failed to create report directory {}", report_dir.display()))?;
    let staging_path = report_dir.join(format!(
        ".{}.partial-{}-{}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("summary.json"),
        std::process::id(),
        current_unix_timestamp_ms()
    ));
    std::fs::write(&staging_path, &payload)
        .with_context(|| format!("failed to stage report {}", staging_path.display()))?;

    if let Err(error) = std::fs::rename(&staging_path, path) {
        let _ = std::fs::remove_file(&staging_path);
        return Err(error).with_context(|| format!("failed to publish report {}", path.display()));
    }
    Ok(payload.len())
}

fn report_parent_dir(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        bail!("report path cannot be empty");
    }
    if path.is_dir() {
        bail!("report path '{}' is a directory", path.display());
    }
    Ok(path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}
