//! Feature pipeline driver.
//!
//! Stages run in a fixed order over one immutable [`RecordStore`]:
//!
//! 1. partition by (region, resource_type)
//! 2. two-pass gap fill of missing raw inputs
//! 3. calendar fields
//! 4. lag and rolling windows per series
//! 5. per-resource-type ratios
//! 6. seeded exogenous columns (optional)
//! 7. two-pass gap fill of the temporal columns
//! 8. indicator and label columns
//!
//! Both fill passes land in one [`CompletenessReport`], raw inputs first.
//!
//! Any stage error aborts the run; nothing is returned but the error.

use cdf_core::{CdfError, CdfResult, Diagnostics, PipelineConfig, RecordStore};
use serde::Serialize;
use tracing::{debug, info};

use crate::calendar::calendar_columns;
use crate::derived::derived_columns;
use crate::encode::categorical_columns;
use crate::partition::{partition_records, Partitions};
use crate::reconcile::{reconcile, reconcile_inputs, CompletenessReport};
use crate::synthetic::synthetic_columns;
use crate::table::{Column, FeatureTable, Stage};
use crate::temporal::temporal_columns;

/// Run statistics returned alongside the feature table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub rows: usize,
    pub series: usize,
    pub columns: usize,
    pub completeness: CompletenessReport,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: FeatureTable,
    pub report: RunReport,
}

#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    config: PipelineConfig,
}

impl FeaturePipeline {
    pub fn new(config: PipelineConfig) -> CdfResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, store: &RecordStore) -> CdfResult<PipelineOutput> {
        let mut records = store.records()?;
        let partitions = partition_records(&records);
        info!(
            rows = records.len(),
            series = partitions.len(),
            "starting feature pipeline"
        );
        let mut diagnostics = partitions.duplicate_dates(&records);
        let mut completeness =
            reconcile_inputs(&mut records, &partitions, self.config.fill_scope);

        let mut table = FeatureTable::new(records);
        let calendar = calendar_columns(table.records());
        append_stage(&mut table, Stage::Calendar, calendar)?;

        let temporal = temporal_columns(table.records(), &partitions, &self.config)?;
        append_stage(&mut table, Stage::Temporal, temporal)?;

        let (derived, derived_diag) = derived_columns(table.records());
        diagnostics.merge(derived_diag);
        append_stage(&mut table, Stage::Derived, derived)?;

        if self.config.synthetic.enabled {
            let synthetic = synthetic_columns(table.height(), &self.config.synthetic);
            append_stage(&mut table, Stage::Synthetic, synthetic)?;
        }

        completeness.merge(reconcile(&mut table, &partitions, self.config.fill_scope));
        diagnostics.merge(completeness.diagnostics());

        let categorical = categorical_columns(table.records());
        append_stage(&mut table, Stage::Categorical, categorical)?;

        check_rows(&table, &partitions)?;
        let report = RunReport {
            rows: table.height(),
            series: partitions.len(),
            columns: table.columns().len(),
            completeness,
            diagnostics,
        };
        info!(
            rows = report.rows,
            columns = report.columns,
            remaining_nulls = report.completeness.remaining(),
            findings = report.diagnostics.len(),
            "feature pipeline finished"
        );
        Ok(PipelineOutput { table, report })
    }
}

fn append_stage(
    table: &mut FeatureTable,
    stage: Stage,
    columns: Vec<Column>,
) -> CdfResult<()> {
    let added = columns.len();
    table.append(stage, columns)?;
    debug!(stage = stage.as_str(), added, "stage complete");
    Ok(())
}

fn check_rows(table: &FeatureTable, partitions: &Partitions) -> CdfResult<()> {
    if partitions.row_count() != table.height() {
        return Err(CdfError::Other(format!(
            "row count changed: {} partitioned, {} in table",
            partitions.row_count(),
            table.height()
        )));
    }
    Ok(())
}
