//! Derived metric engine: utilization and efficiency ratios.
//!
//! Normalization constants are the maximum observed value per resource type
//! across the whole table (not per series), recomputed on every run.

use std::collections::BTreeMap;

use cdf_core::{Category, Diagnostics, FindingSource, Record, ResourceType};

use crate::table::{Column, Stage};

/// `numerator / denominator`, or the `NaN` sentinel when the denominator is zero.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        f64::NAN
    } else {
        numerator / denominator
    }
}

/// Maximum of `value` per resource type, skipping `NaN`.
pub fn max_by_resource_type(
    records: &[Record],
    value: impl Fn(&Record) -> f64,
) -> BTreeMap<ResourceType, f64> {
    let mut maxima: BTreeMap<ResourceType, f64> = BTreeMap::new();
    for record in records {
        let v = value(record);
        if v.is_nan() {
            continue;
        }
        maxima
            .entry(record.resource_type.clone())
            .and_modify(|m| *m = m.max(v))
            .or_insert(v);
    }
    maxima
}

/// `cpu_total`, `cpu_utilization`, `storage_allocated`, `storage_efficiency`.
///
/// A resource type whose maximum is zero yields `NaN` ratios for all its
/// rows; each such type is reported in the returned diagnostics. A storage
/// value still missing after the input fill leaves `storage_efficiency`
/// empty for that row, so it never reads as the zero-maximum sentinel.
pub fn derived_columns(records: &[Record]) -> (Vec<Column>, Diagnostics) {
    let mut diag = Diagnostics::new();
    let cpu_max = max_by_resource_type(records, |r| r.usage_cpu);
    let storage_max = max_by_resource_type(records, |r| r.usage_storage);

    for (metric, maxima) in [("usage_cpu", &cpu_max), ("usage_storage", &storage_max)] {
        for (resource_type, max) in maxima {
            if *max == 0.0 {
                diag.record(
                    FindingSource::Derived,
                    resource_type.label(),
                    format!("maximum {metric} is 0; ratio set to NaN"),
                );
            }
        }
    }

    let lookup = |maxima: &BTreeMap<ResourceType, f64>, record: &Record| {
        maxima
            .get(&record.resource_type)
            .copied()
            .unwrap_or(f64::NAN)
    };

    let mut cpu_total = Vec::with_capacity(records.len());
    let mut cpu_utilization = Vec::with_capacity(records.len());
    let mut storage_allocated = Vec::with_capacity(records.len());
    let mut storage_efficiency = Vec::with_capacity(records.len());
    for record in records {
        let cpu = lookup(&cpu_max, record);
        let storage = lookup(&storage_max, record);
        cpu_total.push(Some(cpu));
        cpu_utilization.push(Some(ratio(record.usage_cpu, cpu)));
        storage_allocated.push(Some(storage));
        storage_efficiency.push(
            Some(record.usage_storage)
                .filter(|v| !v.is_nan())
                .map(|v| ratio(v, storage)),
        );
    }

    let columns = vec![
        Column::float("cpu_total", Stage::Derived, cpu_total),
        Column::float("cpu_utilization", Stage::Derived, cpu_utilization),
        Column::float("storage_allocated", Stage::Derived, storage_allocated),
        Column::float("storage_efficiency", Stage::Derived, storage_efficiency),
    ];
    (columns, diag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdf_core::Region;
    use chrono::NaiveDate;

    fn record(region: Region, resource_type: ResourceType, cpu: f64, storage: f64) -> Record {
        Record {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            region,
            resource_type,
            usage_cpu: cpu,
            usage_storage: storage,
            users_active: 0,
            holiday: false,
            economic_index: 0.0,
            cloud_market_demand: 0.0,
        }
    }

    fn values(columns: &[Column], name: &str) -> Vec<f64> {
        columns
            .iter()
            .find(|c| c.name == name)
            .and_then(Column::floats)
            .unwrap()
            .iter()
            .map(|v| v.unwrap())
            .collect()
    }

    #[test]
    fn normalizes_by_resource_type_across_regions() {
        let records = vec![
            record(Region::EastUs, ResourceType::Vm, 20.0, 50.0),
            record(Region::WestUs, ResourceType::Vm, 80.0, 100.0),
            record(Region::EastUs, ResourceType::Storage, 5.0, 400.0),
        ];
        let (columns, diag) = derived_columns(&records);
        assert!(diag.is_empty());
        assert_eq!(values(&columns, "cpu_total"), vec![80.0, 80.0, 5.0]);
        assert_eq!(values(&columns, "cpu_utilization"), vec![0.25, 1.0, 1.0]);
        assert_eq!(values(&columns, "storage_efficiency"), vec![0.5, 1.0, 1.0]);
        for u in values(&columns, "cpu_utilization") {
            assert!((0.0..=1.0).contains(&u));
        }
    }

    #[test]
    fn zero_maximum_yields_nan_sentinel() {
        let records = vec![
            record(Region::EastUs, ResourceType::Container, 0.0, 10.0),
            record(Region::WestUs, ResourceType::Container, 0.0, 20.0),
        ];
        let (columns, diag) = derived_columns(&records);
        assert!(values(&columns, "cpu_utilization").iter().all(|v| v.is_nan()));
        assert_eq!(values(&columns, "storage_efficiency"), vec![0.5, 1.0]);
        assert_eq!(diag.len(), 1);
    }

    #[test]
    fn missing_storage_is_empty_not_sentinel() {
        let records = vec![
            record(Region::EastUs, ResourceType::Vm, 10.0, f64::NAN),
            record(Region::WestUs, ResourceType::Vm, 20.0, 40.0),
        ];
        let (columns, _) = derived_columns(&records);
        let efficiency = columns
            .iter()
            .find(|c| c.name == "storage_efficiency")
            .and_then(Column::floats)
            .unwrap();
        assert_eq!(efficiency.to_vec(), vec![None, Some(1.0)]);
    }

    #[test]
    fn ratio_sentinel() {
        assert!(ratio(1.0, 0.0).is_nan());
        assert_eq!(ratio(1.0, 4.0), 0.25);
    }
}
