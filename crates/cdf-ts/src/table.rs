//! The feature table produced by a pipeline run.
//!
//! Rows keep the input order. Feature columns are appended stage by stage and
//! are tagged with the [`Stage`] that owns them; only the owner (and the
//! reconciler, for temporal gaps) ever writes a column.

use cdf_core::{CdfError, CdfResult, Record};

/// Pipeline stage owning a feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Calendar,
    Temporal,
    Derived,
    Synthetic,
    Categorical,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Calendar => "calendar",
            Stage::Temporal => "temporal",
            Stage::Derived => "derived",
            Stage::Synthetic => "synthetic",
            Stage::Categorical => "categorical",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// `None` is a gap; `Some(NaN)` is the division sentinel.
    Float(Vec<Option<f64>>),
    Int(Vec<i32>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Float(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Int(_) | ColumnData::Text(_) => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub owner: Stage,
    pub data: ColumnData,
}

impl Column {
    pub fn float(name: impl Into<String>, owner: Stage, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            owner,
            data: ColumnData::Float(values),
        }
    }

    pub fn int(name: impl Into<String>, owner: Stage, values: Vec<i32>) -> Self {
        Self {
            name: name.into(),
            owner,
            data: ColumnData::Int(values),
        }
    }

    pub fn text(name: impl Into<String>, owner: Stage, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            owner,
            data: ColumnData::Text(values),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn floats(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn ints(&self) -> Option<&[i32]> {
        match &self.data {
            ColumnData::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn texts(&self) -> Option<&[String]> {
        match &self.data {
            ColumnData::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Feature-engineered table: one row per input observation.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    records: Vec<Record>,
    columns: Vec<Column>,
}

impl FeatureTable {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            columns: Vec::new(),
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn height(&self) -> usize {
        self.records.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Columns owned by one stage, in insertion order.
    pub fn owned_by(&self, stage: Stage) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(move |c| c.owner == stage)
    }

    pub(crate) fn owned_by_mut(&mut self, stage: Stage) -> impl Iterator<Item = &mut Column> {
        self.columns.iter_mut().filter(move |c| c.owner == stage)
    }

    /// Append a stage's columns. Every column must match the table height
    /// and carry a fresh name.
    pub fn append(&mut self, stage: Stage, columns: Vec<Column>) -> CdfResult<()> {
        for column in &columns {
            if column.len() != self.height() {
                return Err(CdfError::Other(format!(
                    "{} stage produced column '{}' with {} rows, expected {}",
                    stage.as_str(),
                    column.name,
                    column.len(),
                    self.height()
                )));
            }
            if column.owner != stage {
                return Err(CdfError::Other(format!(
                    "column '{}' is owned by the {} stage, not {}",
                    column.name,
                    column.owner.as_str(),
                    stage.as_str()
                )));
            }
            if self.column(&column.name).is_some() {
                return Err(CdfError::Other(format!(
                    "column '{}' already exists",
                    column.name
                )));
            }
        }
        self.columns.extend(columns);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdf_core::{Region, ResourceType};
    use chrono::NaiveDate;

    fn record(day: u32) -> Record {
        Record {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            region: Region::EastUs,
            resource_type: ResourceType::Vm,
            usage_cpu: 1.0,
            usage_storage: 1.0,
            users_active: 1,
            holiday: false,
            economic_index: 0.0,
            cloud_market_demand: 0.0,
        }
    }

    #[test]
    fn append_rejects_height_mismatch() {
        let mut table = FeatureTable::new(vec![record(1), record(2)]);
        let err = table
            .append(
                Stage::Temporal,
                vec![Column::float("usage_cpu_lag1", Stage::Temporal, vec![None])],
            )
            .unwrap_err();
        assert!(err.to_string().contains("usage_cpu_lag1"));
    }

    #[test]
    fn append_rejects_foreign_owner() {
        let mut table = FeatureTable::new(vec![record(1)]);
        let result = table.append(
            Stage::Derived,
            vec![Column::int("month", Stage::Calendar, vec![1])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn owned_by_filters_columns() {
        let mut table = FeatureTable::new(vec![record(1)]);
        table
            .append(
                Stage::Calendar,
                vec![Column::int("month", Stage::Calendar, vec![1])],
            )
            .unwrap();
        table
            .append(
                Stage::Temporal,
                vec![Column::float("usage_cpu_lag1", Stage::Temporal, vec![None])],
            )
            .unwrap();
        let names: Vec<_> = table.owned_by(Stage::Temporal).map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["usage_cpu_lag1"]);
        assert_eq!(table.column("usage_cpu_lag1").unwrap().data.null_count(), 1);
    }
}
