//! Missing-value reconciler.
//!
//! Two deterministic passes: backward fill (take the next non-null value),
//! then forward fill (take the previous non-null value). With
//! [`FillScope::Table`] the passes walk the whole table in row order, so a
//! gap at the start of one series can borrow a value from a neighbouring
//! series. [`FillScope::Partition`] walks each series in date order instead.
//!
//! The passes run twice per pipeline: once over the raw inputs listed in
//! [`FILLED_INPUTS`], before any ratio is derived from them, and once over
//! the temporal columns. In feature columns only gaps (`None`) are filled;
//! `NaN` sentinels are values. In raw inputs `NaN` marks a missing cell.

use cdf_core::{Diagnostics, FillScope, FindingSource, Metric, Record};
use serde::Serialize;
use tracing::{debug, warn};

use crate::partition::Partitions;
use crate::table::{ColumnData, FeatureTable, Stage};

/// Raw metrics whose missing cells are filled before the derived stage.
///
/// `usage_cpu` is absent: a missing CPU value aborts the temporal stage.
pub const FILLED_INPUTS: [Metric; 3] = [
    Metric::UsageStorage,
    Metric::EconomicIndex,
    Metric::CloudMarketDemand,
];

/// Fill counts for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnCompleteness {
    pub column: String,
    pub backward_filled: usize,
    pub forward_filled: usize,
    pub remaining: usize,
}

/// Outcome of a reconciliation pass, one entry per column walked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompletenessReport {
    pub columns: Vec<ColumnCompleteness>,
}

impl CompletenessReport {
    /// Nulls left after both passes, summed over all columns.
    pub fn remaining(&self) -> usize {
        self.columns.iter().map(|c| c.remaining).sum()
    }

    pub fn filled(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.backward_filled + c.forward_filled)
            .sum()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnCompleteness> {
        self.columns.iter().find(|c| c.column == name)
    }

    /// Append the entries of `other` after this report's own.
    pub fn merge(&mut self, other: CompletenessReport) {
        self.columns.extend(other.columns);
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let mut diag = Diagnostics::new();
        for column in self.columns.iter().filter(|c| c.remaining > 0) {
            diag.record(
                FindingSource::Reconcile,
                column.column.as_str(),
                format!("{} value(s) still null after fill", column.remaining),
            );
        }
        diag
    }
}

/// Backward fill over `order` (positions into `values`). Returns the count filled.
pub fn backward_fill(values: &mut [Option<f64>], order: &[usize]) -> usize {
    let mut next = None;
    let mut filled = 0;
    for &i in order.iter().rev() {
        match values[i] {
            Some(v) => next = Some(v),
            None if next.is_some() => {
                values[i] = next;
                filled += 1;
            }
            None => {}
        }
    }
    filled
}

/// Forward fill over `order` (positions into `values`). Returns the count filled.
pub fn forward_fill(values: &mut [Option<f64>], order: &[usize]) -> usize {
    let mut prev = None;
    let mut filled = 0;
    for &i in order {
        match values[i] {
            Some(v) => prev = Some(v),
            None if prev.is_some() => {
                values[i] = prev;
                filled += 1;
            }
            None => {}
        }
    }
    filled
}

/// Row orders the passes walk under `scope`.
fn fill_orders(height: usize, partitions: &Partitions, scope: FillScope) -> Vec<Vec<usize>> {
    match scope {
        FillScope::Table => vec![(0..height).collect()],
        FillScope::Partition => partitions.iter().map(|(_, rows)| rows.to_vec()).collect(),
    }
}

fn fill_column(name: &str, values: &mut [Option<f64>], orders: &[Vec<usize>]) -> ColumnCompleteness {
    let mut backward_filled = 0;
    let mut forward_filled = 0;
    for order in orders {
        backward_filled += backward_fill(values, order);
    }
    for order in orders {
        forward_filled += forward_fill(values, order);
    }
    let remaining = values.iter().filter(|v| v.is_none()).count();
    if remaining > 0 {
        warn!(column = name, remaining, "nulls remain after reconciliation");
    }
    ColumnCompleteness {
        column: name.to_string(),
        backward_filled,
        forward_filled,
        remaining,
    }
}

/// Fill missing raw inputs in place.
///
/// Cells still missing after both passes stay `NaN` and are counted in the
/// report.
pub fn reconcile_inputs(
    records: &mut [Record],
    partitions: &Partitions,
    scope: FillScope,
) -> CompletenessReport {
    let orders = fill_orders(records.len(), partitions, scope);
    let mut report = CompletenessReport::default();
    for metric in FILLED_INPUTS {
        let mut values: Vec<Option<f64>> = records
            .iter()
            .map(|r| Some(r.metric(metric)).filter(|v| !v.is_nan()))
            .collect();
        let completeness = fill_column(metric.column(), &mut values, &orders);
        if completeness.backward_filled + completeness.forward_filled > 0 {
            for (record, value) in records.iter_mut().zip(values) {
                if let Some(slot) = record.float_metric_mut(metric) {
                    *slot = value.unwrap_or(f64::NAN);
                }
            }
        }
        report.columns.push(completeness);
    }
    debug!(
        filled = report.filled(),
        remaining = report.remaining(),
        ?scope,
        "reconciled raw inputs"
    );
    report
}

/// Fill gaps in every temporal column of `table`.
pub fn reconcile(
    table: &mut FeatureTable,
    partitions: &Partitions,
    scope: FillScope,
) -> CompletenessReport {
    let orders = fill_orders(table.height(), partitions, scope);
    let mut report = CompletenessReport::default();
    for column in table.owned_by_mut(Stage::Temporal) {
        let ColumnData::Float(values) = &mut column.data else {
            continue;
        };
        report
            .columns
            .push(fill_column(&column.name, values, &orders));
    }
    debug!(
        filled = report.filled(),
        remaining = report.remaining(),
        ?scope,
        "reconciled temporal columns"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition_records;
    use crate::table::Column;
    use cdf_core::{Category, Record, Region, ResourceType};
    use chrono::NaiveDate;

    fn record(day: u32, region: &str) -> Record {
        Record {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            region: Region::parse(region).unwrap(),
            resource_type: ResourceType::Vm,
            usage_cpu: 0.0,
            usage_storage: 0.0,
            users_active: 0,
            holiday: false,
            economic_index: 0.0,
            cloud_market_demand: 0.0,
        }
    }

    fn table_with(records: Vec<Record>, lag: Vec<Option<f64>>) -> FeatureTable {
        let mut table = FeatureTable::new(records);
        table
            .append(
                Stage::Temporal,
                vec![Column::float("usage_cpu_lag1", Stage::Temporal, lag)],
            )
            .unwrap();
        table
    }

    fn lag_values(table: &FeatureTable) -> Vec<Option<f64>> {
        table.column("usage_cpu_lag1").unwrap().floats().unwrap().to_vec()
    }

    #[test]
    fn backward_then_forward() {
        let mut values = vec![None, Some(10.0), None, Some(20.0), None];
        let order: Vec<usize> = (0..values.len()).collect();
        assert_eq!(backward_fill(&mut values, &order), 2);
        assert_eq!(values, vec![Some(10.0), Some(10.0), Some(20.0), Some(20.0), None]);
        assert_eq!(forward_fill(&mut values, &order), 1);
        assert_eq!(values[4], Some(20.0));
    }

    #[test]
    fn nan_sentinel_is_not_a_gap() {
        let mut values = vec![Some(f64::NAN), None];
        let order = vec![0, 1];
        backward_fill(&mut values, &order);
        forward_fill(&mut values, &order);
        assert!(values[1].unwrap().is_nan());
    }

    #[test]
    fn table_scope_can_leak_across_series() {
        // west's first row sits after east's last row in table order.
        let records = vec![record(1, "east"), record(2, "east"), record(1, "west")];
        let mut table = table_with(records.clone(), vec![None, Some(10.0), None]);
        let parts = partition_records(&records);
        let report = reconcile(&mut table, &parts, FillScope::Table);
        // west's gap takes east's value via the forward pass.
        assert_eq!(lag_values(&table), vec![Some(10.0), Some(10.0), Some(10.0)]);
        assert_eq!(report.remaining(), 0);
    }

    #[test]
    fn partition_scope_stays_inside_series() {
        let records = vec![record(1, "east"), record(2, "east"), record(1, "west")];
        let mut table = table_with(records.clone(), vec![None, Some(10.0), None]);
        let parts = partition_records(&records);
        let report = reconcile(&mut table, &parts, FillScope::Partition);
        assert_eq!(lag_values(&table), vec![Some(10.0), Some(10.0), None]);
        assert_eq!(report.remaining(), 1);
        assert_eq!(report.diagnostics().len(), 1);
    }

    #[test]
    fn fully_null_column_is_reported() {
        let records = vec![record(1, "east"), record(2, "east")];
        let mut table = table_with(records.clone(), vec![None, None]);
        let parts = partition_records(&records);
        let report = reconcile(&mut table, &parts, FillScope::Table);
        assert_eq!(report.columns[0].remaining, 2);
        assert_eq!(report.filled(), 0);
    }

    #[test]
    fn missing_inputs_are_filled_in_place() {
        let mut records = vec![record(1, "east"), record(2, "east"), record(3, "east")];
        records[0].economic_index = f64::NAN;
        records[1].usage_storage = f64::NAN;
        records[2].usage_storage = 300.0;
        records[2].economic_index = 1.5;
        let parts = partition_records(&records);
        let report = reconcile_inputs(&mut records, &parts, FillScope::Partition);

        assert_eq!(records[1].usage_storage, 300.0);
        assert_eq!(records[0].economic_index, 0.0);
        let storage = report.column("usage_storage").unwrap();
        assert_eq!((storage.backward_filled, storage.forward_filled), (1, 0));
        assert_eq!(report.column("economic_index").unwrap().backward_filled, 1);
        assert_eq!(report.column("cloud_market_demand").unwrap().remaining, 0);
        assert_eq!(report.remaining(), 0);
    }

    #[test]
    fn unfillable_input_stays_nan_and_is_reported() {
        let mut records = vec![record(1, "east"), record(1, "west")];
        records[1].cloud_market_demand = f64::NAN;
        let parts = partition_records(&records);
        let report = reconcile_inputs(&mut records, &parts, FillScope::Partition);

        assert!(records[1].cloud_market_demand.is_nan());
        assert_eq!(report.remaining(), 1);
        let diag = report.diagnostics();
        assert_eq!(diag.iter().next().unwrap().subject, "cloud_market_demand");

        // table scope borrows east's value instead.
        let mut records = vec![record(1, "east"), record(1, "west")];
        records[1].cloud_market_demand = f64::NAN;
        let report = reconcile_inputs(&mut records, &parts, FillScope::Table);
        assert_eq!(records[1].cloud_market_demand, 0.0);
        assert_eq!(report.column("cloud_market_demand").unwrap().forward_filled, 1);
    }
}
