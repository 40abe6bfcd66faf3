//! # cdf-core: data model for cloud usage telemetry
//!
//! Shared types for the feature pipeline (`cdf-ts`) and the aggregation query
//! layer (`cdf-query`).
//!
//! ## Data model
//!
//! - [`Observation`]: one telemetry row (date, region, resource type, usage
//!   metrics, holiday flag, market indicators). Grouping keys may be null as
//!   loaded; the partitioner rejects such rows.
//! - [`RecordStore`]: the ordered, immutable table of observations a pipeline
//!   run reads from.
//! - [`Record`]: an observation whose grouping keys are known to be present.
//! - [`Region`] / [`ResourceType`]: tagged-variant categories with separate
//!   indicator-key and label projections (see [`category`]).
//!
//! ## Modules
//!
//! - [`config`] - pipeline and query settings loaded from TOML
//! - [`diagnostics`] - non-fatal issues recorded during a run
//! - [`error`] - the [`CdfError`] taxonomy

use chrono::NaiveDate;
use serde::Serialize;

pub mod category;
pub mod config;
pub mod diagnostics;
pub mod error;

pub use category::{Category, Region, ResourceType};
pub use config::{CdfConfig, FillScope, PipelineConfig, QueryConfig, SyntheticConfig};
pub use diagnostics::{Diagnostics, Finding, FindingSource};
pub use error::{CdfError, CdfResult};

/// Calendar date format used on every input and output edge.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Numeric metric columns carried by every observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    UsageCpu,
    UsageStorage,
    UsersActive,
    EconomicIndex,
    CloudMarketDemand,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::UsageCpu,
        Metric::UsageStorage,
        Metric::UsersActive,
        Metric::EconomicIndex,
        Metric::CloudMarketDemand,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Metric::UsageCpu => "usage_cpu",
            Metric::UsageStorage => "usage_storage",
            Metric::UsersActive => "users_active",
            Metric::EconomicIndex => "economic_index",
            Metric::CloudMarketDemand => "cloud_market_demand",
        }
    }

    pub fn from_column(name: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.column() == name)
    }
}

/// One telemetry row as loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub region: Option<Region>,
    pub resource_type: Option<ResourceType>,
    /// CPU usage in percent. Non-numeric input is carried as `NaN` and
    /// rejected by the temporal stage.
    pub usage_cpu: f64,
    /// Storage usage. A missing value is carried as `NaN` until the pipeline
    /// fills it; the same holds for the two market indicators.
    pub usage_storage: f64,
    pub users_active: u64,
    pub holiday: bool,
    pub economic_index: f64,
    pub cloud_market_demand: f64,
}

impl Observation {
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::UsageCpu => self.usage_cpu,
            Metric::UsageStorage => self.usage_storage,
            Metric::UsersActive => self.users_active as f64,
            Metric::EconomicIndex => self.economic_index,
            Metric::CloudMarketDemand => self.cloud_market_demand,
        }
    }
}

/// An observation with both grouping keys present.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub date: NaiveDate,
    pub region: Region,
    pub resource_type: ResourceType,
    pub usage_cpu: f64,
    pub usage_storage: f64,
    pub users_active: u64,
    pub holiday: bool,
    pub economic_index: f64,
    pub cloud_market_demand: f64,
}

impl Record {
    /// Resolve the grouping keys of the observation at `row`.
    pub fn resolve(row: usize, obs: &Observation) -> CdfResult<Record> {
        let region = obs.region.clone().ok_or(CdfError::Partition {
            row,
            column: "region",
        })?;
        let resource_type = obs.resource_type.clone().ok_or(CdfError::Partition {
            row,
            column: "resource_type",
        })?;
        Ok(Record {
            date: obs.date,
            region,
            resource_type,
            usage_cpu: obs.usage_cpu,
            usage_storage: obs.usage_storage,
            users_active: obs.users_active,
            holiday: obs.holiday,
            economic_index: obs.economic_index,
            cloud_market_demand: obs.cloud_market_demand,
        })
    }

    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::UsageCpu => self.usage_cpu,
            Metric::UsageStorage => self.usage_storage,
            Metric::UsersActive => self.users_active as f64,
            Metric::EconomicIndex => self.economic_index,
            Metric::CloudMarketDemand => self.cloud_market_demand,
        }
    }

    /// Mutable slot of a floating-point metric; `users_active` is a count
    /// and has none.
    pub fn float_metric_mut(&mut self, metric: Metric) -> Option<&mut f64> {
        match metric {
            Metric::UsageCpu => Some(&mut self.usage_cpu),
            Metric::UsageStorage => Some(&mut self.usage_storage),
            Metric::UsersActive => None,
            Metric::EconomicIndex => Some(&mut self.economic_index),
            Metric::CloudMarketDemand => Some(&mut self.cloud_market_demand),
        }
    }
}

/// Ordered, immutable table of observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    rows: Vec<Observation>,
}

impl RecordStore {
    pub fn new(rows: Vec<Observation>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolve every row's grouping keys, failing on the first null.
    pub fn records(&self) -> CdfResult<Vec<Record>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(row, obs)| Record::resolve(row, obs))
            .collect()
    }
}

impl FromIterator<Observation> for RecordStore {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(region: Option<&str>, resource: Option<&str>) -> Observation {
        Observation {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            region: region.and_then(Region::parse),
            resource_type: resource.and_then(ResourceType::parse),
            usage_cpu: 10.0,
            usage_storage: 100.0,
            users_active: 5,
            holiday: false,
            economic_index: 1.0,
            cloud_market_demand: 0.5,
        }
    }

    #[test]
    fn records_resolve_keys() {
        let store: RecordStore = vec![obs(Some("EAST US"), Some("VM"))].into_iter().collect();
        let records = store.records().unwrap();
        assert_eq!(records[0].region, Region::EastUs);
        assert_eq!(records[0].resource_type, ResourceType::Vm);
    }

    #[test]
    fn null_key_reports_row_and_column() {
        let store = RecordStore::new(vec![
            obs(Some("EAST US"), Some("VM")),
            obs(Some("WEST US"), None),
        ]);
        match store.records() {
            Err(CdfError::Partition { row, column }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "resource_type");
            }
            other => panic!("expected partition error, got {other:?}"),
        }
    }

    #[test]
    fn metric_columns_roundtrip() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_column(metric.column()), Some(metric));
        }
        assert_eq!(Metric::from_column("usage_gpu"), None);
    }

    #[test]
    fn only_float_metrics_are_writable() {
        let mut record = Record::resolve(0, &obs(Some("east"), Some("vm"))).unwrap();
        *record.float_metric_mut(Metric::EconomicIndex).unwrap() = 2.5;
        assert_eq!(record.economic_index, 2.5);
        assert!(record.float_metric_mut(Metric::UsersActive).is_none());
    }
}
