//! Query model: the wire request and its validated, typed form.

use std::collections::BTreeMap;
use std::fmt;

use cdf_core::{CdfError, CdfResult, Category, Metric, Region, ResourceType, DATE_FORMAT};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::table::QueryRow;

/// Field a query may group by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupField {
    Date,
    Region,
    ResourceType,
    Holiday,
}

impl GroupField {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupField::Date => "date",
            GroupField::Region => "region",
            GroupField::ResourceType => "resource_type",
            GroupField::Holiday => "holiday",
        }
    }

    pub fn parse(raw: &str) -> CdfResult<Self> {
        match raw {
            "date" => Ok(GroupField::Date),
            "region" => Ok(GroupField::Region),
            "resource_type" | "resourceType" => Ok(GroupField::ResourceType),
            "holiday" => Ok(GroupField::Holiday),
            other => Err(CdfError::Aggregation(format!(
                "unknown groupBy field '{other}'; use date, region, resource_type or holiday"
            ))),
        }
    }
}

/// Statistic applied to one metric within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stat {
    Mean,
    Max,
    Min,
    Std,
    Sum,
    Count,
}

impl Stat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stat::Mean => "mean",
            Stat::Max => "max",
            Stat::Min => "min",
            Stat::Std => "std",
            Stat::Sum => "sum",
            Stat::Count => "count",
        }
    }

    pub fn parse(raw: &str) -> CdfResult<Self> {
        match raw {
            "mean" => Ok(Stat::Mean),
            "max" => Ok(Stat::Max),
            "min" => Ok(Stat::Min),
            "std" => Ok(Stat::Std),
            "sum" => Ok(Stat::Sum),
            "count" => Ok(Stat::Count),
            other => Err(CdfError::Aggregation(format!(
                "unsupported statistic '{other}'; use mean, max, min, std, sum or count"
            ))),
        }
    }
}

/// Output column name of an aggregate, e.g. `usage_cpu_mean`.
pub fn aggregate_column(metric: Metric, stat: Stat) -> String {
    format!("{}_{}", metric.column(), stat.as_str())
}

/// Ratio of two aggregate columns, multiplied by `scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ratio {
    pub name: String,
    pub numerator: String,
    pub denominator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl Ratio {
    pub fn new(name: &str, numerator: &str, denominator: &str) -> Self {
        Self {
            name: name.to_string(),
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
            scale: None,
        }
    }

    pub fn scaled(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }
}

/// Filters as they arrive on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holiday: Option<bool>,
    /// Metric on the x axis of the `correlation-scatter` view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_axis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis: Option<String>,
}

/// Aggregation request as it arrives on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryRequest {
    pub group_by: Vec<String>,
    pub aggregate: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ratios: Vec<Ratio>,
    pub filters: FilterSpec,
}

/// Validated filters. Region and resource type compare by label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub region: Option<String>,
    pub resource_type: Option<String>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub holiday: Option<bool>,
}

fn parse_filter_date(field: &str, raw: &Option<String>) -> CdfResult<Option<NaiveDate>> {
    raw.as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            cdf_ts::frame::parse_date(s).ok_or_else(|| {
                CdfError::Aggregation(format!("{field} '{s}' is not a {DATE_FORMAT} date"))
            })
        })
        .transpose()
}

impl Filters {
    pub fn from_spec(spec: &FilterSpec) -> CdfResult<Self> {
        let filters = Self {
            region: spec
                .region
                .as_deref()
                .and_then(Region::parse)
                .map(|r| r.label().to_string()),
            resource_type: spec
                .resource_type
                .as_deref()
                .and_then(ResourceType::parse)
                .map(|r| r.label().to_string()),
            date_start: parse_filter_date("dateStart", &spec.date_start)?,
            date_end: parse_filter_date("dateEnd", &spec.date_end)?,
            holiday: spec.holiday,
        };
        Ok(filters)
    }

    /// Inclusive on both date bounds.
    pub fn matches(&self, row: &QueryRow) -> bool {
        self.region.as_ref().map_or(true, |r| *r == row.region)
            && self
                .resource_type
                .as_ref()
                .map_or(true, |t| *t == row.resource_type)
            && self.date_start.map_or(true, |d| row.date >= d)
            && self.date_end.map_or(true, |d| row.date <= d)
            && self.holiday.map_or(true, |h| h == row.holiday)
    }
}

/// Validated aggregation query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub group_by: Vec<GroupField>,
    /// Metrics in canonical order, each with its stats in request order.
    pub aggregates: Vec<(Metric, Vec<Stat>)>,
    pub ratios: Vec<Ratio>,
    pub filters: Filters,
}

impl Query {
    pub fn aggregate_columns(&self) -> Vec<String> {
        self.aggregates
            .iter()
            .flat_map(|(metric, stats)| stats.iter().map(|s| aggregate_column(*metric, *s)))
            .collect()
    }
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group_by(mut self, field: GroupField) -> Self {
        self.group_by.push(field.as_str().to_string());
        self
    }

    pub fn aggregate(mut self, metric: Metric, stats: &[Stat]) -> Self {
        self.aggregate
            .entry(metric.column().to_string())
            .or_default()
            .extend(stats.iter().map(|s| s.as_str().to_string()));
        self
    }

    pub fn ratio(mut self, ratio: Ratio) -> Self {
        self.ratios.push(ratio);
        self
    }

    pub fn filters(mut self, filters: FilterSpec) -> Self {
        self.filters = filters;
        self
    }

    /// Validate field names, statistics, ratios and filters.
    pub fn validate(&self) -> CdfResult<Query> {
        let mut group_by = Vec::with_capacity(self.group_by.len());
        for raw in &self.group_by {
            let field = GroupField::parse(raw)?;
            if group_by.contains(&field) {
                return Err(CdfError::Aggregation(format!(
                    "groupBy field '{raw}' is repeated"
                )));
            }
            group_by.push(field);
        }

        if self.aggregate.is_empty() {
            return Err(CdfError::Aggregation(
                "aggregate must name at least one field".into(),
            ));
        }
        let mut aggregates: BTreeMap<Metric, Vec<Stat>> = BTreeMap::new();
        for (field, stats) in &self.aggregate {
            let metric = Metric::from_column(field).ok_or_else(|| {
                CdfError::Aggregation(format!("unknown aggregate field '{field}'"))
            })?;
            if stats.is_empty() {
                return Err(CdfError::Aggregation(format!(
                    "aggregate field '{field}' has no statistics"
                )));
            }
            let entry = aggregates.entry(metric).or_default();
            for raw in stats {
                let stat = Stat::parse(raw)?;
                if !entry.contains(&stat) {
                    entry.push(stat);
                }
            }
        }
        let aggregates: Vec<(Metric, Vec<Stat>)> = aggregates.into_iter().collect();

        let query = Query {
            group_by,
            aggregates,
            ratios: self.ratios.clone(),
            filters: Filters::from_spec(&self.filters)?,
        };

        let columns = query.aggregate_columns();
        for ratio in &query.ratios {
            for operand in [&ratio.numerator, &ratio.denominator] {
                if !columns.contains(operand) {
                    return Err(CdfError::Aggregation(format!(
                        "ratio '{}' references '{operand}', which is not an aggregate column",
                        ratio.name
                    )));
                }
            }
            if columns.contains(&ratio.name) {
                return Err(CdfError::Aggregation(format!(
                    "ratio '{}' collides with an aggregate column",
                    ratio.name
                )));
            }
        }
        Ok(query)
    }
}

impl fmt::Display for QueryRequest {
    /// Canonical JSON form, used as the cache key.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(fmt::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_request() {
        let request: QueryRequest = serde_json::from_str(
            r#"{
                "groupBy": ["region", "resourceType"],
                "aggregate": {"usage_cpu": ["mean", "std"], "users_active": ["sum"]},
                "filters": {"region": "east us", "dateStart": "2024-01-01", "holiday": false}
            }"#,
        )
        .unwrap();
        let query = request.validate().unwrap();
        assert_eq!(query.group_by, vec![GroupField::Region, GroupField::ResourceType]);
        assert_eq!(
            query.aggregate_columns(),
            vec!["usage_cpu_mean", "usage_cpu_std", "users_active_sum"]
        );
        assert_eq!(query.filters.region.as_deref(), Some("East US"));
        assert_eq!(
            query.filters.date_start,
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(query.filters.holiday, Some(false));
    }

    #[test]
    fn unknown_names_are_aggregation_errors() {
        let mut bad_field = QueryRequest::new().aggregate(Metric::UsageCpu, &[Stat::Mean]);
        bad_field.group_by.push("zone".into());
        assert!(matches!(bad_field.validate(), Err(CdfError::Aggregation(_))));

        let mut bad_stat = QueryRequest::new();
        bad_stat
            .aggregate
            .insert("usage_cpu".into(), vec!["median".into()]);
        let err = bad_stat.validate().unwrap_err();
        assert!(err.to_string().contains("median"));

        let mut bad_metric = QueryRequest::new();
        bad_metric
            .aggregate
            .insert("usage_gpu".into(), vec!["mean".into()]);
        assert!(bad_metric.validate().is_err());
    }

    #[test]
    fn ratio_operands_must_be_aggregated() {
        let request = QueryRequest::new()
            .aggregate(Metric::UsageCpu, &[Stat::Mean])
            .ratio(Ratio::new("cpu_per_user", "usage_cpu_mean", "users_active_mean"));
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("users_active_mean"));
    }

    #[test]
    fn bad_filter_date_is_rejected() {
        let request = QueryRequest::new()
            .aggregate(Metric::UsageCpu, &[Stat::Mean])
            .filters(FilterSpec {
                date_end: Some("last tuesday".into()),
                ..FilterSpec::default()
            });
        assert!(matches!(request.validate(), Err(CdfError::Aggregation(_))));
    }

    #[test]
    fn inclusive_date_bounds() {
        let filters = Filters {
            date_start: NaiveDate::from_ymd_opt(2024, 1, 2),
            date_end: NaiveDate::from_ymd_opt(2024, 1, 2),
            ..Filters::default()
        };
        let row = QueryRow {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            region: "East US".into(),
            resource_type: "VM".into(),
            holiday: false,
            usage_cpu: 1.0,
            usage_storage: 1.0,
            users_active: 1.0,
            economic_index: 1.0,
            cloud_market_demand: 1.0,
        };
        assert!(filters.matches(&row));
    }
}
