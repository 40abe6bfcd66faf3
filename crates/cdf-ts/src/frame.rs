//! Conversion between polars frames and the pipeline's typed tables.
//!
//! Input columns are looked up by name and coerced: numerics through a
//! `Float64` cast (unparseable text becomes null), dates from `YYYY-MM-DD`
//! with an optional time suffix, `holiday` from booleans, integers or
//! `true/false/yes/no/1/0` strings.

use anyhow::{anyhow, bail, Context, Result};
use cdf_core::{
    Category, Metric, Observation, Record, RecordStore, Region, ResourceType, DATE_FORMAT,
};
use chrono::NaiveDate;
use polars::prelude::*;

use crate::table::{ColumnData, FeatureTable};

pub const DATE_COLUMN: &str = "date";
pub const REGION_COLUMN: &str = "region";
pub const RESOURCE_TYPE_COLUMN: &str = "resource_type";
pub const HOLIDAY_COLUMN: &str = "holiday";

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .with_context(|| format!("input is missing column '{name}'"))
}

/// Numeric column as `Option<f64>` per row.
pub fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = column(df, name)?
        .cast(&DataType::Float64)
        .with_context(|| format!("casting column '{name}' to Float64"))?;
    Ok(series.f64()?.into_iter().collect())
}

/// Text column as `Option<String>` per row; non-text columns are cast.
pub fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = column(df, name)?
        .cast(&DataType::Utf8)
        .with_context(|| format!("casting column '{name}' to Utf8"))?;
    Ok(series
        .utf8()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Boolean column accepting native booleans, integers or flag strings.
/// Nulls read as `false`.
pub fn flag_column(df: &DataFrame, name: &str) -> Result<Vec<bool>> {
    let series = column(df, name)?;
    match series.dtype() {
        DataType::Boolean => Ok(series
            .bool()?
            .into_iter()
            .map(|v| v.unwrap_or(false))
            .collect()),
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| match v {
                None => Ok(false),
                Some(raw) => parse_flag(raw)
                    .ok_or_else(|| anyhow!("row {row}: '{raw}' is not a valid {name} flag")),
            })
            .collect(),
        _ => {
            let ints = series
                .cast(&DataType::Float64)
                .with_context(|| format!("casting column '{name}' to Float64"))?;
            Ok(ints
                .f64()?
                .into_iter()
                .map(|v| v.map_or(false, |v| v != 0.0))
                .collect())
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "no" | "0" | "0.0" => Some(false),
        "true" | "yes" | "1" | "1.0" => Some(true),
        _ => None,
    }
}

/// Parse `YYYY-MM-DD`, ignoring any time suffix after a space or `T`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().split([' ', 'T']).next()?;
    NaiveDate::parse_from_str(day, DATE_FORMAT).ok()
}

/// Build the record store from an input frame.
///
/// Null or blank region / resource type values are kept as `None` so the
/// partitioner can reject them by row. Non-numeric metrics load as `NaN`.
/// `users_active` must be a non-negative whole number.
pub fn record_store_from_frame(df: &DataFrame) -> Result<RecordStore> {
    let height = df.height();
    let dates = text_column(df, DATE_COLUMN)?;
    let regions = text_column(df, REGION_COLUMN)?;
    let resource_types = text_column(df, RESOURCE_TYPE_COLUMN)?;
    let cpu = float_column(df, "usage_cpu")?;
    let storage = float_column(df, "usage_storage")?;
    let users = float_column(df, "users_active")?;
    let holiday = flag_column(df, HOLIDAY_COLUMN)?;
    let economic = float_column(df, "economic_index")?;
    let demand = float_column(df, "cloud_market_demand")?;

    let mut rows = Vec::with_capacity(height);
    for row in 0..height {
        let date = dates[row]
            .as_deref()
            .and_then(parse_date)
            .ok_or_else(|| anyhow!("row {row}: invalid or missing date {:?}", dates[row]))?;
        let users_active = match users[row] {
            Some(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => v as u64,
            Some(v) => bail!("row {row}: users_active must be a non-negative whole count, got {v}"),
            None => bail!("row {row}: users_active is missing"),
        };
        rows.push(Observation {
            date,
            region: regions[row].as_deref().and_then(Region::parse),
            resource_type: resource_types[row].as_deref().and_then(ResourceType::parse),
            usage_cpu: cpu[row].unwrap_or(f64::NAN),
            usage_storage: storage[row].unwrap_or(f64::NAN),
            users_active,
            holiday: holiday[row],
            economic_index: economic[row].unwrap_or(f64::NAN),
            cloud_market_demand: demand[row].unwrap_or(f64::NAN),
        });
    }
    Ok(RecordStore::new(rows))
}

/// Raw metric values with `NaN` written as null.
fn metric_values(records: &[Record], metric: Metric) -> Vec<Option<f64>> {
    records
        .iter()
        .map(|r| Some(r.metric(metric)).filter(|v| !v.is_nan()))
        .collect()
}

/// Flatten a feature table into a frame: observation columns first, then
/// every feature column in stage order. Raw metrics the pipeline could not
/// fill are written as nulls.
pub fn feature_table_to_frame(table: &FeatureTable) -> Result<DataFrame> {
    let records = table.records();
    let mut series = vec![
        Series::new(
            DATE_COLUMN,
            records
                .iter()
                .map(|r| r.date.format(DATE_FORMAT).to_string())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            REGION_COLUMN,
            records
                .iter()
                .map(|r| r.region.key().to_string())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            RESOURCE_TYPE_COLUMN,
            records
                .iter()
                .map(|r| r.resource_type.key().to_string())
                .collect::<Vec<_>>(),
        ),
        Series::new("usage_cpu", metric_values(records, Metric::UsageCpu)),
        Series::new("usage_storage", metric_values(records, Metric::UsageStorage)),
        Series::new(
            "users_active",
            records
                .iter()
                .map(|r| r.users_active as i64)
                .collect::<Vec<_>>(),
        ),
        Series::new(
            HOLIDAY_COLUMN,
            records.iter().map(|r| r.holiday).collect::<Vec<_>>(),
        ),
        Series::new("economic_index", metric_values(records, Metric::EconomicIndex)),
        Series::new(
            "cloud_market_demand",
            metric_values(records, Metric::CloudMarketDemand),
        ),
    ];
    for column in table.columns() {
        let name = column.name.as_str();
        series.push(match &column.data {
            ColumnData::Float(values) => Series::new(name, values.clone()),
            ColumnData::Int(values) => Series::new(name, values.clone()),
            ColumnData::Text(values) => Series::new(name, values.clone()),
        });
    }
    DataFrame::new(series).context("assembling feature frame")
}
