use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use cdf_core::PipelineConfig;
use cdf_ts::{
    feature_table_to_frame, read_frame, record_store_from_frame, write_frame_staged,
    FeaturePipeline,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::commands::telemetry::record_run_timed;
use crate::commands::util::{parse_partitions, parse_threads};

pub struct FeatureArgs<'a> {
    pub input: &'a Path,
    pub out: &'a Path,
    pub out_partitions: Option<&'a String>,
    pub threads: Option<&'a str>,
    pub no_synthetic: bool,
}

pub fn handle(args: FeatureArgs<'_>, mut config: PipelineConfig) -> Result<()> {
    let start = Instant::now();
    if let Some(spec) = args.threads {
        config.threads = parse_threads(spec)?;
    }
    if args.no_synthetic {
        config.synthetic.enabled = false;
    }
    let partition_spec = args.out_partitions.map(String::as_str).unwrap_or("");
    let input = args.input.display().to_string();
    let out = args.out.display().to_string();

    let result = build_features(&args, config);
    record_run_timed(
        args.out,
        "features",
        &[
            ("input", input.as_str()),
            ("out", out.as_str()),
            ("out_partitions", partition_spec),
        ],
        start,
        &result,
    );
    result.map(|_| ())
}

fn build_features(args: &FeatureArgs<'_>, config: PipelineConfig) -> Result<Value> {
    info!(input = %args.input.display(), "building features");
    let frame = read_frame(args.input)?;
    let store = record_store_from_frame(&frame)?;
    let output = FeaturePipeline::new(config)?.run(&store)?;
    for finding in output.report.diagnostics.iter() {
        warn!(source = %finding.source, subject = %finding.subject, "{}", finding.message);
    }

    let mut features = feature_table_to_frame(&output.table)?;
    let partitions = parse_partitions(args.out_partitions);
    let written = write_frame_staged(&mut features, args.out, "features", &partitions)?;
    info!(
        rows = output.report.rows,
        columns = output.report.columns,
        out = %written.display(),
        "wrote feature table"
    );
    serde_json::to_value(&output.report).context("serializing run report")
}
