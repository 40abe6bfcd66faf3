//! Group partitioner: splits the record store into per-series row lists.

use std::collections::BTreeMap;
use std::fmt;

use cdf_core::{
    CdfResult, Category, Diagnostics, FindingSource, Record, RecordStore, Region, ResourceType,
};
use tracing::debug;

/// Key of one series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    pub region: Region,
    pub resource_type: ResourceType,
}

impl SeriesKey {
    pub fn of(record: &Record) -> Self {
        Self {
            region: record.region.clone(),
            resource_type: record.resource_type.clone(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region.label(), self.resource_type.label())
    }
}

/// Row indices of every series, each list sorted by date ascending.
///
/// Ties on the same date keep the original input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partitions {
    groups: BTreeMap<SeriesKey, Vec<usize>>,
    rows: usize,
}

impl Partitions {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of rows across all series.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&[usize]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SeriesKey, &[usize])> {
        self.groups.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Report series that repeat a date. Duplicates are a caller error and
    /// are not removed.
    pub fn duplicate_dates(&self, records: &[Record]) -> Diagnostics {
        let mut diag = Diagnostics::new();
        for (key, rows) in self.iter() {
            let repeats = rows
                .windows(2)
                .filter(|pair| records[pair[0]].date == records[pair[1]].date)
                .count();
            if repeats > 0 {
                diag.record(
                    FindingSource::Partition,
                    key.to_string(),
                    format!("{repeats} repeated date(s) within series"),
                );
            }
        }
        diag
    }
}

/// Partition the store by (region, resource_type).
///
/// Fails with a partition error naming the first row whose region or
/// resource type is null.
pub fn partition(store: &RecordStore) -> CdfResult<Partitions> {
    let records = store.records()?;
    Ok(partition_records(&records))
}

/// Partition rows whose keys are already resolved.
pub fn partition_records(records: &[Record]) -> Partitions {
    let mut groups: BTreeMap<SeriesKey, Vec<usize>> = BTreeMap::new();
    for (index, record) in records.iter().enumerate() {
        groups.entry(SeriesKey::of(record)).or_default().push(index);
    }
    for rows in groups.values_mut() {
        // Stable sort: equal dates stay in input order.
        rows.sort_by_key(|&i| records[i].date);
    }
    debug!(series = groups.len(), rows = records.len(), "partitioned records");
    Partitions {
        groups,
        rows: records.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdf_core::{CdfError, Observation};
    use chrono::NaiveDate;

    fn obs(day: u32, region: &str, resource: &str, cpu: f64) -> Observation {
        Observation {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            region: Region::parse(region),
            resource_type: ResourceType::parse(resource),
            usage_cpu: cpu,
            usage_storage: 0.0,
            users_active: 0,
            holiday: false,
            economic_index: 0.0,
            cloud_market_demand: 0.0,
        }
    }

    #[test]
    fn every_row_lands_in_exactly_one_series() {
        let store = RecordStore::new(vec![
            obs(3, "east", "vm", 1.0),
            obs(1, "west", "vm", 2.0),
            obs(1, "east", "vm", 3.0),
            obs(2, "east", "storage", 4.0),
        ]);
        let parts = partition(&store).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.row_count(), 4);

        let mut seen: Vec<usize> = parts.iter().flat_map(|(_, rows)| rows.to_vec()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn series_are_sorted_by_date() {
        let store = RecordStore::new(vec![
            obs(3, "east", "vm", 1.0),
            obs(1, "east", "vm", 2.0),
            obs(2, "east", "vm", 3.0),
        ]);
        let parts = partition(&store).unwrap();
        let key = SeriesKey {
            region: Region::Other("east".into()),
            resource_type: ResourceType::Vm,
        };
        assert_eq!(parts.get(&key).unwrap(), &[1, 2, 0]);
    }

    #[test]
    fn equal_dates_keep_input_order() {
        let store = RecordStore::new(vec![
            obs(2, "east", "vm", 1.0),
            obs(1, "east", "vm", 2.0),
            obs(2, "east", "vm", 3.0),
            obs(1, "east", "vm", 4.0),
        ]);
        let first = partition(&store).unwrap();
        let second = partition(&store).unwrap();
        assert_eq!(first, second);
        let (_, rows) = first.iter().next().unwrap();
        assert_eq!(rows, &[1, 3, 0, 2]);

        let records = store.records().unwrap();
        assert_eq!(first.duplicate_dates(&records).len(), 1);
    }

    #[test]
    fn null_region_is_a_partition_error() {
        let store = RecordStore::new(vec![obs(1, "east", "vm", 1.0), obs(2, "", "vm", 1.0)]);
        let err = partition(&store).unwrap_err();
        assert!(matches!(
            err,
            CdfError::Partition {
                row: 1,
                column: "region"
            }
        ));
    }

    #[test]
    fn series_key_displays_labels() {
        let key = SeriesKey {
            region: Region::SoutheastAsia,
            resource_type: ResourceType::Container,
        };
        assert_eq!(key.to_string(), "Southeast Asia/Container");
    }
}
