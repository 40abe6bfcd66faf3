//! Calendar-derived columns.

use cdf_core::Record;
use chrono::{Datelike, NaiveDate};

use crate::table::{Column, Stage};

/// Day of week with Monday = 0.
pub fn day_of_week(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}

pub fn quarter(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

pub fn is_weekend(date: NaiveDate) -> bool {
    day_of_week(date) >= 5
}

/// `month`, `day_of_week`, `is_weekend`, `quarter`.
pub fn calendar_columns(records: &[Record]) -> Vec<Column> {
    let mut month = Vec::with_capacity(records.len());
    let mut dow = Vec::with_capacity(records.len());
    let mut weekend = Vec::with_capacity(records.len());
    let mut quarters = Vec::with_capacity(records.len());
    for record in records {
        month.push(record.date.month() as i32);
        dow.push(day_of_week(record.date) as i32);
        weekend.push(i32::from(is_weekend(record.date)));
        quarters.push(quarter(record.date) as i32);
    }
    vec![
        Column::int("month", Stage::Calendar, month),
        Column::int("day_of_week", Stage::Calendar, dow),
        Column::int("is_weekend", Stage::Calendar, weekend),
        Column::int("quarter", Stage::Calendar, quarters),
    ]
}
