//! Read-only table the query layer works against.
//!
//! Each row carries the grouping keys as display labels (`East US`, `VM`),
//! so query output and filter matching use the same strings the dashboard
//! shows.

use anyhow::Result;
use cdf_core::{Category, Metric, Record, Region, ResourceType};
use cdf_ts::encode::{
    category_of_indicator, decode_labels, REGION_LABEL_COLUMN, RESOURCE_TYPE_LABEL_COLUMN,
};
use cdf_ts::frame::{
    flag_column, float_column, parse_date, text_column, DATE_COLUMN, HOLIDAY_COLUMN,
    REGION_COLUMN, RESOURCE_TYPE_COLUMN,
};
use cdf_ts::FeatureTable;
use chrono::NaiveDate;
use polars::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow {
    pub date: NaiveDate,
    pub region: String,
    pub resource_type: String,
    pub holiday: bool,
    pub usage_cpu: f64,
    pub usage_storage: f64,
    pub users_active: f64,
    pub economic_index: f64,
    pub cloud_market_demand: f64,
}

impl QueryRow {
    pub fn from_record(record: &Record) -> Self {
        Self {
            date: record.date,
            region: record.region.label().to_string(),
            resource_type: record.resource_type.label().to_string(),
            holiday: record.holiday,
            usage_cpu: record.usage_cpu,
            usage_storage: record.usage_storage,
            users_active: record.users_active as f64,
            economic_index: record.economic_index,
            cloud_market_demand: record.cloud_market_demand,
        }
    }

    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::UsageCpu => self.usage_cpu,
            Metric::UsageStorage => self.usage_storage,
            Metric::UsersActive => self.users_active,
            Metric::EconomicIndex => self.economic_index,
            Metric::CloudMarketDemand => self.cloud_market_demand,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTable {
    rows: Vec<QueryRow>,
}

impl QueryTable {
    pub fn new(rows: Vec<QueryRow>) -> Self {
        Self { rows }
    }

    pub fn from_records(records: &[Record]) -> Self {
        Self::new(records.iter().map(QueryRow::from_record).collect())
    }

    pub fn from_features(table: &FeatureTable) -> Self {
        Self::from_records(table.records())
    }

    /// Load a persisted feature table (or a plain observation table).
    ///
    /// Labels come from the `Region`/`ResourceType` columns when present,
    /// then from raw `region`/`resource_type` values, and finally from the
    /// indicator columns.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let height = df.height();
        let dates = text_column(df, DATE_COLUMN)?;
        let regions = labels::<Region>(df, REGION_LABEL_COLUMN, REGION_COLUMN)?;
        let resource_types =
            labels::<ResourceType>(df, RESOURCE_TYPE_LABEL_COLUMN, RESOURCE_TYPE_COLUMN)?;
        let holiday = flag_column(df, HOLIDAY_COLUMN)?;
        let metrics = Metric::ALL
            .iter()
            .map(|m| float_column(df, m.column()))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = Vec::with_capacity(height);
        for row in 0..height {
            let date = dates[row]
                .as_deref()
                .and_then(parse_date)
                .ok_or_else(|| anyhow::anyhow!("row {row}: invalid or missing date"))?;
            let value = |m: usize| metrics[m][row].unwrap_or(f64::NAN);
            rows.push(QueryRow {
                date,
                region: regions[row].clone(),
                resource_type: resource_types[row].clone(),
                holiday: holiday[row],
                usage_cpu: value(0),
                usage_storage: value(1),
                users_active: value(2),
                economic_index: value(3),
                cloud_market_demand: value(4),
            });
        }
        Ok(Self::new(rows))
    }

    pub fn rows(&self) -> &[QueryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Display labels for one category, from the label column, the raw column
/// or the indicator columns, in that order of preference. Label and raw text
/// both pass through [`Category::parse`], so `EAST US` reads as `East US`.
fn labels<C: Category>(df: &DataFrame, label_column: &str, raw_column: &str) -> Result<Vec<String>> {
    let names = df.get_column_names();
    let text = [label_column, raw_column]
        .into_iter()
        .find(|column| names.contains(column));
    if let Some(column) = text {
        return Ok(text_column(df, column)?
            .into_iter()
            .map(|raw| {
                raw.as_deref()
                    .and_then(C::parse)
                    .map(|c| c.label().to_string())
                    .unwrap_or_default()
            })
            .collect());
    }

    let mut indicators = Vec::new();
    for name in names {
        if category_of_indicator::<C>(name).is_none() {
            continue;
        }
        let flags = float_column(df, name)?
            .into_iter()
            .map(|v| v.map_or(false, |v| v != 0.0))
            .collect();
        indicators.push((name.to_string(), flags));
    }
    Ok(decode_labels::<C>(&indicators, df.height()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DataFrame {
        df![
            "date" => &["2024-01-01", "2024-01-02"],
            "usage_cpu" => &[10.0, 20.0],
            "usage_storage" => &[1.0, 2.0],
            "users_active" => &[3i64, 4],
            "holiday" => &[0i64, 1],
            "economic_index" => &[1.0, 1.0],
            "cloud_market_demand" => &[0.5, 0.5],
        ]
        .unwrap()
    }

    #[test]
    fn prefers_label_columns() {
        let mut df = base();
        df.with_column(Series::new("Region", &["East US", "West US"])).unwrap();
        df.with_column(Series::new("region", &["ignored", "ignored"])).unwrap();
        df.with_column(Series::new("ResourceType", &["VM", "Storage"])).unwrap();
        let table = QueryTable::from_frame(&df).unwrap();
        assert_eq!(table.rows()[1].region, "West US");
        assert_eq!(table.rows()[1].resource_type, "Storage");
        assert!(table.rows()[1].holiday);
    }

    #[test]
    fn raw_values_are_labelled() {
        let mut df = base();
        df.with_column(Series::new("region", &["EAST US", "southeast asia"])).unwrap();
        df.with_column(Series::new("resource_type", &["vm", "Container"])).unwrap();
        let table = QueryTable::from_frame(&df).unwrap();
        assert_eq!(table.rows()[0].region, "East US");
        assert_eq!(table.rows()[1].region, "Southeast Asia");
        assert_eq!(table.rows()[0].resource_type, "VM");
    }

    #[test]
    fn label_columns_are_normalized() {
        let mut df = base();
        df.with_column(Series::new("Region", &["EAST US", "west-us"])).unwrap();
        df.with_column(Series::new("ResourceType", &["vm", ""])).unwrap();
        let table = QueryTable::from_frame(&df).unwrap();
        assert_eq!(table.rows()[0].region, "East US");
        assert_eq!(table.rows()[1].region, "West US");
        assert_eq!(table.rows()[0].resource_type, "VM");
        assert_eq!(table.rows()[1].resource_type, "");
    }

    #[test]
    fn indicators_are_decoded_when_labels_are_absent() {
        let mut df = base();
        df.with_column(Series::new("region_EAST US", &[1i32, 0])).unwrap();
        df.with_column(Series::new("region_WEST US", &[0i32, 0])).unwrap();
        df.with_column(Series::new("resource_type_VM", &[1i32, 1])).unwrap();
        let table = QueryTable::from_frame(&df).unwrap();
        assert_eq!(table.rows()[0].region, "East US");
        assert_eq!(table.rows()[1].region, "");
        assert_eq!(table.rows()[1].resource_type, "VM");
    }
}
