//! Named dashboard views.
//!
//! Most views are preset aggregation queries. `kpis`, `correlations`,
//! `correlation-scatter`, `holiday-distribution`, `holiday-calendar`,
//! `filter-options` and `summary` are computed directly from the filtered
//! rows. Every view honours the caller's filters.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use cdf_core::{CdfError, CdfResult, Metric};
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use serde_json::{json, Value};

use crate::engine::{execute, safe_ratio};
use crate::query::{FilterSpec, Filters, GroupField, QueryRequest, Ratio, Stat};
use crate::response::{Cell, QueryOutput};
use crate::stats;
use crate::table::{QueryRow, QueryTable};

/// Days covered by the sparkline view, counting back from the latest date.
pub const SPARKLINE_DAYS: i64 = 30;

const USAGE: [Metric; 3] = [Metric::UsageCpu, Metric::UsageStorage, Metric::UsersActive];

/// Scatter axes used when the caller names none.
pub const DEFAULT_SCATTER_AXES: (Metric, Metric) = (Metric::EconomicIndex, Metric::UsageCpu);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardView {
    Kpis,
    Sparklines,
    TimeSeries,
    RegionalTrends,
    ResourceTrends,
    ResourceUtilization,
    RegionalComparison,
    RegionalHeatmap,
    RegionalDistribution,
    ResourceDistribution,
    ResourceEfficiency,
    Correlations,
    CorrelationScatter,
    CorrelationBubble,
    HolidayAnalysis,
    HolidayDistribution,
    HolidayCalendar,
    EngagementTrends,
    EngagementEfficiency,
    EngagementBubble,
    FilterOptions,
    Summary,
}

impl DashboardView {
    pub const ALL: [DashboardView; 22] = [
        DashboardView::Kpis,
        DashboardView::Sparklines,
        DashboardView::TimeSeries,
        DashboardView::RegionalTrends,
        DashboardView::ResourceTrends,
        DashboardView::ResourceUtilization,
        DashboardView::RegionalComparison,
        DashboardView::RegionalHeatmap,
        DashboardView::RegionalDistribution,
        DashboardView::ResourceDistribution,
        DashboardView::ResourceEfficiency,
        DashboardView::Correlations,
        DashboardView::CorrelationScatter,
        DashboardView::CorrelationBubble,
        DashboardView::HolidayAnalysis,
        DashboardView::HolidayDistribution,
        DashboardView::HolidayCalendar,
        DashboardView::EngagementTrends,
        DashboardView::EngagementEfficiency,
        DashboardView::EngagementBubble,
        DashboardView::FilterOptions,
        DashboardView::Summary,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DashboardView::Kpis => "kpis",
            DashboardView::Sparklines => "sparklines",
            DashboardView::TimeSeries => "time-series",
            DashboardView::RegionalTrends => "regional-trends",
            DashboardView::ResourceTrends => "resource-trends",
            DashboardView::ResourceUtilization => "resource-utilization",
            DashboardView::RegionalComparison => "regional-comparison",
            DashboardView::RegionalHeatmap => "regional-heatmap",
            DashboardView::RegionalDistribution => "regional-distribution",
            DashboardView::ResourceDistribution => "resource-distribution",
            DashboardView::ResourceEfficiency => "resource-efficiency",
            DashboardView::Correlations => "correlations",
            DashboardView::CorrelationScatter => "correlation-scatter",
            DashboardView::CorrelationBubble => "correlation-bubble",
            DashboardView::HolidayAnalysis => "holiday-analysis",
            DashboardView::HolidayDistribution => "holiday-distribution",
            DashboardView::HolidayCalendar => "holiday-calendar",
            DashboardView::EngagementTrends => "engagement-trends",
            DashboardView::EngagementEfficiency => "engagement-efficiency",
            DashboardView::EngagementBubble => "engagement-bubble",
            DashboardView::FilterOptions => "filter-options",
            DashboardView::Summary => "summary",
        }
    }

    /// Aggregation behind a grouped view; `None` for the computed views.
    pub fn preset(&self) -> Option<QueryRequest> {
        let means = |request: QueryRequest, metrics: &[Metric]| {
            metrics
                .iter()
                .fold(request, |r, m| r.aggregate(*m, &[Stat::Mean]))
        };
        let by = |fields: &[GroupField]| {
            fields
                .iter()
                .fold(QueryRequest::new(), |r, f| r.group_by(*f))
        };
        let request = match self {
            DashboardView::Sparklines => means(by(&[GroupField::Date]), &USAGE),
            DashboardView::TimeSeries => means(by(&[GroupField::Date]), &Metric::ALL),
            DashboardView::RegionalTrends => {
                means(by(&[GroupField::Date, GroupField::Region]), &USAGE)
            }
            DashboardView::ResourceTrends | DashboardView::ResourceUtilization => {
                means(by(&[GroupField::Date, GroupField::ResourceType]), &USAGE)
            }
            DashboardView::RegionalComparison => USAGE.iter().fold(
                by(&[GroupField::Region]),
                |r, m| r.aggregate(*m, &[Stat::Mean, Stat::Max, Stat::Min, Stat::Std]),
            ),
            DashboardView::RegionalHeatmap => {
                means(by(&[GroupField::Region, GroupField::ResourceType]), &USAGE)
            }
            DashboardView::RegionalDistribution => USAGE
                .iter()
                .fold(by(&[GroupField::Region]), |r, m| r.aggregate(*m, &[Stat::Sum])),
            DashboardView::ResourceDistribution => USAGE.iter().fold(
                by(&[GroupField::ResourceType]),
                |r, m| r.aggregate(*m, &[Stat::Mean, Stat::Sum]),
            ),
            DashboardView::ResourceEfficiency => means(by(&[GroupField::ResourceType]), &USAGE)
                .ratio(Ratio::new(
                    "cpu_per_user",
                    "usage_cpu_mean",
                    "users_active_mean",
                ))
                .ratio(Ratio::new(
                    "storage_per_user",
                    "usage_storage_mean",
                    "users_active_mean",
                )),
            DashboardView::CorrelationBubble => means(
                by(&[GroupField::Region, GroupField::ResourceType]),
                &Metric::ALL,
            ),
            DashboardView::HolidayAnalysis => USAGE.iter().fold(
                by(&[GroupField::Holiday]),
                |r, m| r.aggregate(*m, &[Stat::Mean, Stat::Std, Stat::Count]),
            ),
            DashboardView::EngagementTrends => means(by(&[GroupField::Date]), &USAGE)
                .ratio(Ratio::new(
                    "cpu_per_user",
                    "usage_cpu_mean",
                    "users_active_mean",
                ))
                .ratio(Ratio::new(
                    "storage_per_user",
                    "usage_storage_mean",
                    "users_active_mean",
                )),
            DashboardView::EngagementEfficiency => {
                means(by(&[GroupField::Region, GroupField::ResourceType]), &USAGE)
                    .ratio(Ratio::new(
                        "cpu_efficiency",
                        "users_active_mean",
                        "usage_cpu_mean",
                    ))
                    // Storage is normalised per 100 units.
                    .ratio(
                        Ratio::new(
                            "storage_efficiency",
                            "users_active_mean",
                            "usage_storage_mean",
                        )
                        .scaled(100.0),
                    )
            }
            DashboardView::EngagementBubble => {
                means(by(&[GroupField::Region, GroupField::ResourceType]), &USAGE)
            }
            DashboardView::Kpis
            | DashboardView::Correlations
            | DashboardView::CorrelationScatter
            | DashboardView::HolidayDistribution
            | DashboardView::HolidayCalendar
            | DashboardView::FilterOptions
            | DashboardView::Summary => return None,
        };
        Some(request)
    }
}

impl fmt::Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DashboardView {
    type Err = CdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DashboardView::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| CdfError::Aggregation(format!("unknown dashboard view '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Peak {
    pub value: f64,
    pub date: NaiveDate,
    pub region: String,
    pub resource_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HolidayImpact {
    /// Relative difference of holiday vs regular mean CPU, in percent.
    pub percentage: f64,
    pub holiday_avg_cpu: f64,
    pub regular_avg_cpu: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub peak_cpu: Option<Peak>,
    pub peak_storage: Option<Peak>,
    pub peak_users: Option<Peak>,
    pub avg_cpu: f64,
    pub avg_storage: f64,
    pub avg_users: f64,
    pub total_regions: usize,
    pub total_resource_types: usize,
    pub data_points: usize,
    pub date_range: Option<DateRange>,
    pub holiday_impact: HolidayImpact,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationCell {
    pub row: &'static str,
    pub column: &'static str,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub regions: Vec<String>,
    pub resource_types: Vec<String>,
    pub date_range: Option<DateRange>,
    pub metrics: Vec<&'static str>,
}

/// Describe-style statistics of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    #[serde(rename = "25%")]
    pub p25: f64,
    #[serde(rename = "50%")]
    pub p50: f64,
    #[serde(rename = "75%")]
    pub p75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub total_records: usize,
    pub date_range_days: i64,
    pub regions_count: usize,
    pub resource_types_count: usize,
    pub holiday_records: usize,
    pub regular_records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub metrics: BTreeMap<&'static str, Describe>,
    pub dataset_info: DatasetInfo,
}

/// Usage metrics of one raw row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsagePoint {
    pub usage_cpu: f64,
    pub usage_storage: f64,
    pub users_active: f64,
}

/// Raw usage rows split by the holiday flag, in table order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HolidayDistribution {
    pub holiday_data: Vec<UsagePoint>,
    pub regular_data: Vec<UsagePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ViewOutput {
    Rows(QueryOutput),
    Kpis(Kpis),
    Correlations(Vec<CorrelationCell>),
    HolidayDistribution(HolidayDistribution),
    FilterOptions(FilterOptions),
    Summary(DataSummary),
}

impl ViewOutput {
    pub fn rows(&self) -> Option<&QueryOutput> {
        match self {
            ViewOutput::Rows(output) => Some(output),
            _ => None,
        }
    }

    /// Grouped views go out as `{rows: [...]}`, the rest as plain objects.
    pub fn to_json(&self) -> Value {
        match self {
            ViewOutput::Rows(output) => json!({ "rows": output }),
            other => serde_json::to_value(other).unwrap_or(Value::Null),
        }
    }
}

fn metric_values(rows: &[&QueryRow], metric: Metric) -> Vec<f64> {
    rows.iter().map(|r| r.metric(metric)).collect()
}

fn date_range(rows: &[&QueryRow]) -> Option<DateRange> {
    let start = rows.iter().map(|r| r.date).min()?;
    let end = rows.iter().map(|r| r.date).max()?;
    Some(DateRange {
        start,
        end,
        days: (end - start).num_days(),
    })
}

fn distinct<'a>(rows: &[&'a QueryRow], label: impl Fn(&'a QueryRow) -> &'a str) -> BTreeSet<&'a str> {
    rows.iter()
        .map(|r| label(r))
        .filter(|l| !l.is_empty())
        .collect()
}

fn peak(rows: &[&QueryRow], metric: Metric) -> Option<Peak> {
    let values = metric_values(rows, metric);
    stats::argmax(&values).map(|i| Peak {
        value: values[i],
        date: rows[i].date,
        region: rows[i].region.clone(),
        resource_type: rows[i].resource_type.clone(),
    })
}

pub fn kpis(rows: &[&QueryRow]) -> Kpis {
    let cpu_where = |holiday: bool| -> Vec<f64> {
        rows.iter()
            .filter(|r| r.holiday == holiday)
            .map(|r| r.usage_cpu)
            .collect()
    };
    let holiday_avg_cpu = stats::mean(&cpu_where(true));
    let regular_avg_cpu = stats::mean(&cpu_where(false));

    Kpis {
        peak_cpu: peak(rows, Metric::UsageCpu),
        peak_storage: peak(rows, Metric::UsageStorage),
        peak_users: peak(rows, Metric::UsersActive),
        avg_cpu: stats::mean(&metric_values(rows, Metric::UsageCpu)),
        avg_storage: stats::mean(&metric_values(rows, Metric::UsageStorage)),
        avg_users: stats::mean(&metric_values(rows, Metric::UsersActive)),
        total_regions: distinct(rows, |r| r.region.as_str()).len(),
        total_resource_types: distinct(rows, |r| r.resource_type.as_str()).len(),
        data_points: rows.len(),
        date_range: date_range(rows),
        holiday_impact: HolidayImpact {
            percentage: safe_ratio(holiday_avg_cpu - regular_avg_cpu, regular_avg_cpu) * 100.0,
            holiday_avg_cpu,
            regular_avg_cpu,
        },
    }
}

/// Pairwise Pearson correlation of every metric, row-major.
pub fn correlations(rows: &[&QueryRow]) -> Vec<CorrelationCell> {
    let columns: Vec<Vec<f64>> = Metric::ALL
        .iter()
        .map(|m| metric_values(rows, *m))
        .collect();
    let mut cells = Vec::with_capacity(Metric::ALL.len() * Metric::ALL.len());
    for (i, row_metric) in Metric::ALL.iter().enumerate() {
        for (j, column_metric) in Metric::ALL.iter().enumerate() {
            cells.push(CorrelationCell {
                row: row_metric.column(),
                column: column_metric.column(),
                correlation: stats::pearson(&columns[i], &columns[j]),
            });
        }
    }
    cells
}

fn scatter_axis(raw: Option<&str>, default: Metric) -> CdfResult<Metric> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(name) => Metric::from_column(name)
            .ok_or_else(|| CdfError::Aggregation(format!("unknown scatter axis '{name}'"))),
    }
}

/// Scatter axes named in `filters`, falling back to [`DEFAULT_SCATTER_AXES`].
pub fn scatter_axes(filters: &FilterSpec) -> CdfResult<(Metric, Metric)> {
    let (x_default, y_default) = DEFAULT_SCATTER_AXES;
    Ok((
        scatter_axis(filters.x_axis.as_deref(), x_default)?,
        scatter_axis(filters.y_axis.as_deref(), y_default)?,
    ))
}

/// Per-region means of the two axis metrics, with the row count as
/// `data_points`. Equal axes share one column.
pub fn correlation_scatter(rows: &[&QueryRow], x: Metric, y: Metric) -> QueryOutput {
    let mut regions: BTreeMap<&str, Vec<&QueryRow>> = BTreeMap::new();
    for row in rows {
        regions.entry(row.region.as_str()).or_default().push(*row);
    }
    let axes: Vec<Metric> = if x == y { vec![x] } else { vec![x, y] };

    let mut columns = vec!["region".to_string()];
    columns.extend(axes.iter().map(|m| format!("{}_avg", m.column())));
    columns.push("data_points".to_string());
    let rows = regions
        .into_iter()
        .map(|(region, group)| {
            let mut cells = vec![Cell::Text(region.to_string())];
            cells.extend(
                axes.iter()
                    .map(|m| Cell::Number(stats::mean(&metric_values(&group, *m)))),
            );
            cells.push(Cell::Count(group.len() as u64));
            cells
        })
        .collect();
    QueryOutput { columns, rows }
}

pub fn holiday_distribution(rows: &[&QueryRow]) -> HolidayDistribution {
    let mut split = HolidayDistribution::default();
    for row in rows {
        let point = UsagePoint {
            usage_cpu: row.usage_cpu,
            usage_storage: row.usage_storage,
            users_active: row.users_active,
        };
        if row.holiday {
            split.holiday_data.push(point);
        } else {
            split.regular_data.push(point);
        }
    }
    split
}

/// Mean CPU per calendar day of the year, with `holiday` set to 1 when any
/// row of that day is a holiday. Days from different years share a cell.
pub fn holiday_calendar(rows: &[&QueryRow]) -> QueryOutput {
    let mut days: BTreeMap<(u32, u32), (String, Vec<f64>, bool)> = BTreeMap::new();
    for row in rows {
        let (_, cpu, holiday) = days
            .entry((row.date.month(), row.date.day()))
            .or_insert_with(|| (row.date.format("%B").to_string(), Vec::new(), false));
        cpu.push(row.usage_cpu);
        *holiday |= row.holiday;
    }

    let columns = ["month", "month_name", "day", "usage_cpu", "holiday"]
        .into_iter()
        .map(str::to_string)
        .collect();
    let rows = days
        .into_iter()
        .map(|((month, day), (month_name, cpu, holiday))| {
            vec![
                Cell::Count(u64::from(month)),
                Cell::Text(month_name),
                Cell::Count(u64::from(day)),
                Cell::Number(stats::mean(&cpu)),
                Cell::Count(u64::from(holiday)),
            ]
        })
        .collect();
    QueryOutput { columns, rows }
}

pub fn filter_options(rows: &[&QueryRow]) -> FilterOptions {
    FilterOptions {
        regions: distinct(rows, |r| r.region.as_str())
            .into_iter()
            .map(str::to_string)
            .collect(),
        resource_types: distinct(rows, |r| r.resource_type.as_str())
            .into_iter()
            .map(str::to_string)
            .collect(),
        date_range: date_range(rows),
        metrics: Metric::ALL.iter().map(|m| m.column()).collect(),
    }
}

pub fn describe(values: &[f64]) -> Describe {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);
    Describe {
        count: sorted.len(),
        mean: stats::mean(&sorted),
        std: stats::std(&sorted),
        min: stats::min(&sorted),
        p25: stats::quantile(&sorted, 0.25),
        p50: stats::quantile(&sorted, 0.5),
        p75: stats::quantile(&sorted, 0.75),
        max: stats::max(&sorted),
    }
}

pub fn summary(rows: &[&QueryRow]) -> DataSummary {
    let holiday_records = rows.iter().filter(|r| r.holiday).count();
    DataSummary {
        metrics: Metric::ALL
            .iter()
            .map(|m| (m.column(), describe(&metric_values(rows, *m))))
            .collect(),
        dataset_info: DatasetInfo {
            total_records: rows.len(),
            date_range_days: date_range(rows).map_or(0, |r| r.days),
            regions_count: distinct(rows, |r| r.region.as_str()).len(),
            resource_types_count: distinct(rows, |r| r.resource_type.as_str()).len(),
            holiday_records,
            regular_records: rows.len() - holiday_records,
        },
    }
}

/// Mean of the two efficiency ratios, per row.
fn add_overall_efficiency(output: &mut QueryOutput) {
    let overall = (0..output.len())
        .map(|row| {
            let cpu = output.number(row, "cpu_efficiency").unwrap_or(f64::NAN);
            let storage = output.number(row, "storage_efficiency").unwrap_or(f64::NAN);
            Cell::Number((cpu + storage) / 2.0)
        })
        .collect();
    output.push_column("overall_efficiency", overall);
}

/// Restrict `filters` to the last [`SPARKLINE_DAYS`] days present in `table`.
fn sparkline_filters(table: &QueryTable, filters: &FilterSpec) -> CdfResult<Option<FilterSpec>> {
    let parsed = Filters::from_spec(filters)?;
    let Some(latest) = table
        .rows()
        .iter()
        .filter(|r| parsed.matches(r))
        .map(|r| r.date)
        .max()
    else {
        return Ok(None);
    };
    let window_start = latest - Duration::days(SPARKLINE_DAYS - 1);
    let start = parsed.date_start.map_or(window_start, |d| d.max(window_start));
    Ok(Some(FilterSpec {
        date_start: Some(start.format(cdf_core::DATE_FORMAT).to_string()),
        ..filters.clone()
    }))
}

pub fn render(view: DashboardView, table: &QueryTable, filters: &FilterSpec) -> CdfResult<ViewOutput> {
    if let Some(preset) = view.preset() {
        let filters = if view == DashboardView::Sparklines {
            match sparkline_filters(table, filters)? {
                Some(windowed) => windowed,
                None => return Ok(ViewOutput::Rows(QueryOutput::default())),
            }
        } else {
            filters.clone()
        };
        let query = preset.filters(filters).validate()?;
        let mut output = execute(table, &query);
        if view == DashboardView::EngagementEfficiency {
            add_overall_efficiency(&mut output);
        }
        return Ok(ViewOutput::Rows(output));
    }

    let parsed = Filters::from_spec(filters)?;
    let rows: Vec<&QueryRow> = table.rows().iter().filter(|r| parsed.matches(r)).collect();
    Ok(match view {
        DashboardView::Kpis => ViewOutput::Kpis(kpis(&rows)),
        DashboardView::Correlations => ViewOutput::Correlations(correlations(&rows)),
        DashboardView::CorrelationScatter => {
            let (x, y) = scatter_axes(filters)?;
            ViewOutput::Rows(correlation_scatter(&rows, x, y))
        }
        DashboardView::HolidayDistribution => {
            ViewOutput::HolidayDistribution(holiday_distribution(&rows))
        }
        DashboardView::HolidayCalendar => ViewOutput::Rows(holiday_calendar(&rows)),
        DashboardView::FilterOptions => ViewOutput::FilterOptions(filter_options(&rows)),
        DashboardView::Summary => ViewOutput::Summary(summary(&rows)),
        other => {
            return Err(CdfError::Aggregation(format!(
                "view '{other}' has no direct renderer"
            )))
        }
    })
}
