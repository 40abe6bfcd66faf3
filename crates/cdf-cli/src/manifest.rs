//! Run manifests written beside command outputs.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub run_id: String,
    pub command: String,
    pub version: String,
    pub timestamp: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,
    pub outputs: Vec<String>,
    pub params: Vec<Param>,
    /// Command-specific summary, e.g. the feature run report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

/// Outcome of the run being recorded.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub status: String,
    pub duration_ms: Option<u128>,
    pub report: Option<Value>,
}

pub fn record_manifest(
    output: &Path,
    command: &str,
    params: &[(&str, &str)],
    outcome: RunOutcome,
) -> Result<PathBuf> {
    let run_id = Uuid::new_v4().to_string();
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    fs::create_dir_all(&dir)?;
    let manifest = ManifestEntry {
        run_id: run_id.clone(),
        command: command.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        status: outcome.status,
        duration_ms: outcome.duration_ms,
        outputs: vec![output.display().to_string()],
        params: params
            .iter()
            .map(|(k, v)| Param {
                name: k.to_string(),
                value: v.to_string(),
            })
            .collect(),
        report: outcome.report,
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    let path = dir.join(format!("run-{run_id}.json"));
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

pub fn read_manifest(path: &Path) -> Result<ManifestEntry> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let manifest = serde_json::from_str(&json)?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn manifest_lands_beside_output() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("features.csv");
        let path = record_manifest(
            &out,
            "features",
            &[("input", "raw.csv")],
            RunOutcome {
                status: "success".into(),
                duration_ms: Some(12),
                report: Some(json!({"rows": 3})),
            },
        )
        .unwrap();
        assert_eq!(path.parent(), Some(dir.path()));

        let manifest = read_manifest(&path).unwrap();
        assert_eq!(manifest.command, "features");
        assert_eq!(manifest.params[0].value, "raw.csv");
        assert_eq!(manifest.report, Some(json!({"rows": 3})));
        assert!(path.ends_with(format!("run-{}.json", manifest.run_id)));
    }
}
