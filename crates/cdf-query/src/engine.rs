//! Grouped aggregation over a [`QueryTable`].
//!
//! Filters are applied first. Surviving rows are bucketed by the requested
//! group fields in a `BTreeMap`, so each distinct key combination appears
//! exactly once and output rows come out sorted by key.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::query::{aggregate_column, GroupField, Query, Stat};
use crate::response::{Cell, QueryOutput};
use crate::stats;
use crate::table::{QueryRow, QueryTable};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum KeyPart {
    Date(NaiveDate),
    Label(String),
    Flag(bool),
}

impl KeyPart {
    fn of(field: GroupField, row: &QueryRow) -> Self {
        match field {
            GroupField::Date => KeyPart::Date(row.date),
            GroupField::Region => KeyPart::Label(row.region.clone()),
            GroupField::ResourceType => KeyPart::Label(row.resource_type.clone()),
            GroupField::Holiday => KeyPart::Flag(row.holiday),
        }
    }

    fn into_cell(self) -> Cell {
        match self {
            KeyPart::Date(d) => Cell::Date(d),
            KeyPart::Label(s) => Cell::Text(s),
            KeyPart::Flag(b) => Cell::Bool(b),
        }
    }
}

/// `numerator / denominator`, `NaN` for a zero denominator.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        f64::NAN
    } else {
        numerator / denominator
    }
}

pub fn execute(table: &QueryTable, query: &Query) -> QueryOutput {
    let mut groups: BTreeMap<Vec<KeyPart>, Vec<&QueryRow>> = BTreeMap::new();
    for row in table.rows().iter().filter(|r| query.filters.matches(r)) {
        let key = query
            .group_by
            .iter()
            .map(|field| KeyPart::of(*field, row))
            .collect();
        groups.entry(key).or_default().push(row);
    }

    let aggregate_columns = query.aggregate_columns();
    let mut columns: Vec<String> = query
        .group_by
        .iter()
        .map(|f| f.as_str().to_string())
        .collect();
    columns.extend(aggregate_columns.iter().cloned());
    columns.extend(query.ratios.iter().map(|r| r.name.clone()));

    let mut rows = Vec::with_capacity(groups.len());
    for (key, members) in groups {
        let mut cells: Vec<Cell> = key.into_iter().map(KeyPart::into_cell).collect();
        let mut values = BTreeMap::new();
        for (metric, stat_list) in &query.aggregates {
            let series: Vec<f64> = members.iter().map(|r| r.metric(*metric)).collect();
            for stat in stat_list {
                let value = stats::compute(*stat, &series);
                values.insert(aggregate_column(*metric, *stat), value);
                cells.push(match stat {
                    Stat::Count => Cell::Count(value as u64),
                    _ => Cell::Number(value),
                });
            }
        }
        for ratio in &query.ratios {
            let numerator = values.get(&ratio.numerator).copied().unwrap_or(f64::NAN);
            let denominator = values.get(&ratio.denominator).copied().unwrap_or(f64::NAN);
            let value = safe_ratio(numerator, denominator) * ratio.scale.unwrap_or(1.0);
            cells.push(Cell::Number(value));
        }
        rows.push(cells);
    }
    QueryOutput { columns, rows }
}
