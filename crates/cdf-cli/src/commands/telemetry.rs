use std::{path::Path, time::Instant};

use cdf_cli::manifest::{record_manifest, RunOutcome};
use serde_json::Value;
use tracing::{info, warn};

/// Record a manifest for a finished run. Failing to write it is logged,
/// never fatal.
pub fn record_run_timed(
    out: &Path,
    command: &str,
    params: &[(&str, &str)],
    start: Instant,
    result: &anyhow::Result<Value>,
) {
    let outcome = RunOutcome {
        status: if result.is_ok() { "success" } else { "failure" }.to_string(),
        duration_ms: Some(start.elapsed().as_millis()),
        report: result.as_ref().ok().cloned(),
    };
    match record_manifest(out, command, params, outcome) {
        Ok(path) => info!(manifest = %path.display(), "recorded run manifest"),
        Err(err) => warn!(error = %err, "failed to record run manifest"),
    }
}
