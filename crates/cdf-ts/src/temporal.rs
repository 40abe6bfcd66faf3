//! Temporal feature engine: lag and rolling-window columns of `usage_cpu`.
//!
//! Each series is computed on its own, in chronological order, and the
//! results are scattered back into table positions by row index. A window or
//! lag therefore never reads a value from another series. Series are
//! independent, so they are fanned out over a rayon pool.

use cdf_core::{CdfError, CdfResult, PipelineConfig, Record};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::debug;

use crate::partition::{Partitions, SeriesKey};
use crate::table::{Column, Stage};

pub fn lag_column(k: usize) -> String {
    format!("usage_cpu_lag{k}")
}

pub fn rolling_mean_column(w: usize) -> String {
    format!("cpu_roll_mean_{w}")
}

pub fn rolling_max_column(w: usize) -> String {
    format!("cpu_roll_max_{w}")
}

pub fn rolling_min_column(w: usize) -> String {
    format!("cpu_roll_min_{w}")
}

/// `values[i - k]` when it exists inside the series, otherwise null.
pub fn lag(values: &[f64], k: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| i.checked_sub(k).map(|j| values[j]))
        .collect()
}

/// Trailing window statistics with a minimum of one observed point.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingStats {
    pub mean: Vec<f64>,
    pub max: Vec<f64>,
    pub min: Vec<f64>,
}

/// Mean/max/min over `values[max(0, i-w+1)..=i]` for every `i`.
pub fn rolling(values: &[f64], window: usize) -> RollingStats {
    let mut stats = RollingStats {
        mean: Vec::with_capacity(values.len()),
        max: Vec::with_capacity(values.len()),
        min: Vec::with_capacity(values.len()),
    };
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let slice = &values[start..=i];
        let sum: f64 = slice.iter().sum();
        stats.mean.push(sum / slice.len() as f64);
        stats.max.push(slice.iter().copied().fold(f64::NEG_INFINITY, f64::max));
        stats.min.push(slice.iter().copied().fold(f64::INFINITY, f64::min));
    }
    stats
}

/// Series-local feature vectors, in the series' chronological order.
struct SeriesFeatures<'a> {
    rows: &'a [usize],
    lags: Vec<Vec<Option<f64>>>,
    rolling: Vec<RollingStats>,
}

fn compute_series<'a>(
    key: &SeriesKey,
    rows: &'a [usize],
    records: &[Record],
    config: &PipelineConfig,
) -> CdfResult<SeriesFeatures<'a>> {
    if rows.is_empty() {
        return Err(CdfError::feature(key.to_string(), "series has no rows"));
    }
    let mut values = Vec::with_capacity(rows.len());
    for &row in rows {
        let record = &records[row];
        if !record.usage_cpu.is_finite() {
            return Err(CdfError::feature(
                key.to_string(),
                format!(
                    "usage_cpu is not numeric at row {row} ({})",
                    record.date
                ),
            ));
        }
        values.push(record.usage_cpu);
    }

    Ok(SeriesFeatures {
        rows,
        lags: config.lags.iter().map(|&k| lag(&values, k)).collect(),
        rolling: config.windows.iter().map(|&w| rolling(&values, w)).collect(),
    })
}

/// Compute lag and rolling columns for every series and merge them back by
/// row index. The output columns have exactly `records.len()` rows.
pub fn temporal_columns(
    records: &[Record],
    partitions: &Partitions,
    config: &PipelineConfig,
) -> CdfResult<Vec<Column>> {
    let threads = if config.threads == 0 {
        num_cpus::get()
    } else {
        config.threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|err| CdfError::Other(format!("building rayon pool: {err}")))?;

    let series: Vec<(&SeriesKey, &[usize])> = partitions.iter().collect();
    let computed: Vec<SeriesFeatures> = pool.install(|| {
        series
            .par_iter()
            .map(|&(key, rows)| compute_series(key, rows, records, config))
            .collect::<CdfResult<Vec<_>>>()
    })?;
    debug!(series = computed.len(), threads, "computed temporal features");

    let height = records.len();
    let mut lag_out = vec![vec![None; height]; config.lags.len()];
    let mut mean_out = vec![vec![None; height]; config.windows.len()];
    let mut max_out = vec![vec![None; height]; config.windows.len()];
    let mut min_out = vec![vec![None; height]; config.windows.len()];

    for features in &computed {
        for (pos, &row) in features.rows.iter().enumerate() {
            for (l, values) in features.lags.iter().enumerate() {
                lag_out[l][row] = values[pos];
            }
            for (w, stats) in features.rolling.iter().enumerate() {
                mean_out[w][row] = Some(stats.mean[pos]);
                max_out[w][row] = Some(stats.max[pos]);
                min_out[w][row] = Some(stats.min[pos]);
            }
        }
    }

    let mut columns = Vec::with_capacity(config.lags.len() + 3 * config.windows.len());
    for (&k, values) in config.lags.iter().zip(lag_out) {
        columns.push(Column::float(lag_column(k), Stage::Temporal, values));
    }
    let rolled = config
        .windows
        .iter()
        .zip(mean_out.into_iter().zip(max_out.into_iter().zip(min_out)));
    for (&w, (mean, (max, min))) in rolled {
        columns.push(Column::float(rolling_mean_column(w), Stage::Temporal, mean));
        columns.push(Column::float(rolling_max_column(w), Stage::Temporal, max));
        columns.push(Column::float(rolling_min_column(w), Stage::Temporal, min));
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition_records;
    use cdf_core::{Category, Region, ResourceType};
    use chrono::NaiveDate;

    fn record(day: u32, region: &str, cpu: f64) -> Record {
        Record {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            region: Region::parse(region).unwrap(),
            resource_type: ResourceType::Vm,
            usage_cpu: cpu,
            usage_storage: 0.0,
            users_active: 0,
            holiday: false,
            economic_index: 0.0,
            cloud_market_demand: 0.0,
        }
    }

    fn floats<'a>(columns: &'a [Column], name: &str) -> &'a [Option<f64>] {
        columns
            .iter()
            .find(|c| c.name == name)
            .and_then(Column::floats)
            .unwrap()
    }

    #[test]
    fn lag_shifts_within_series() {
        assert_eq!(lag(&[10.0, 20.0, 30.0], 1), vec![None, Some(10.0), Some(20.0)]);
        assert_eq!(lag(&[10.0, 20.0], 3), vec![None, None]);
    }

    #[test]
    fn rolling_uses_min_one_point() {
        let stats = rolling(&[10.0, 20.0, 30.0], 7);
        assert_eq!(stats.mean, vec![10.0, 15.0, 20.0]);
        assert_eq!(stats.max, vec![10.0, 20.0, 30.0]);
        assert_eq!(stats.min, vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn rolling_window_trails() {
        let stats = rolling(&[1.0, 5.0, 3.0, 9.0], 2);
        assert_eq!(stats.mean, vec![1.0, 3.0, 4.0, 6.0]);
        assert_eq!(stats.max, vec![1.0, 5.0, 5.0, 9.0]);
        assert_eq!(stats.min, vec![1.0, 1.0, 3.0, 3.0]);
    }

    #[test]
    fn interleaved_series_do_not_leak() {
        // east and west rows alternate in table order.
        let records = vec![
            record(1, "east", 10.0),
            record(1, "west", 100.0),
            record(2, "east", 20.0),
            record(2, "west", 200.0),
            record(3, "east", 30.0),
        ];
        let parts = partition_records(&records);
        let config = PipelineConfig {
            threads: 2,
            ..PipelineConfig::default()
        };
        let columns = temporal_columns(&records, &parts, &config).unwrap();

        assert_eq!(
            floats(&columns, "usage_cpu_lag1"),
            &[None, None, Some(10.0), Some(100.0), Some(20.0)]
        );
        assert_eq!(
            floats(&columns, "cpu_roll_mean_7"),
            &[Some(10.0), Some(100.0), Some(15.0), Some(150.0), Some(20.0)]
        );
        for column in &columns {
            assert_eq!(column.len(), records.len());
        }
    }

    #[test]
    fn unsorted_input_is_windowed_chronologically() {
        let records = vec![
            record(3, "east", 30.0),
            record(1, "east", 10.0),
            record(2, "east", 20.0),
        ];
        let parts = partition_records(&records);
        let columns = temporal_columns(&records, &parts, &PipelineConfig::default()).unwrap();
        assert_eq!(
            floats(&columns, "usage_cpu_lag1"),
            &[Some(20.0), None, Some(10.0)]
        );
        assert_eq!(
            floats(&columns, "cpu_roll_max_30"),
            &[Some(30.0), Some(10.0), Some(20.0)]
        );
    }

    #[test]
    fn non_numeric_cpu_names_the_series() {
        let records = vec![record(1, "east", 10.0), record(2, "east", f64::NAN)];
        let parts = partition_records(&records);
        let err = temporal_columns(&records, &parts, &PipelineConfig::default()).unwrap_err();
        match err {
            CdfError::FeatureComputation { partition, message } => {
                assert_eq!(partition, "east/VM");
                assert!(message.contains("row 1"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn thread_count_does_not_change_results() {
        let records: Vec<Record> = (1..=20)
            .map(|d| record(d, if d % 2 == 0 { "east" } else { "west" }, d as f64))
            .collect();
        let parts = partition_records(&records);
        let single = PipelineConfig {
            threads: 1,
            ..PipelineConfig::default()
        };
        let many = PipelineConfig {
            threads: 4,
            ..PipelineConfig::default()
        };
        assert_eq!(
            temporal_columns(&records, &parts, &single).unwrap(),
            temporal_columns(&records, &parts, &many).unwrap()
        );
    }
}
