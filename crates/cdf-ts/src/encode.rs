//! Categorical encoder.
//!
//! Region and resource type are expanded into one indicator column per
//! distinct observed value (no baseline is dropped). The `Region` and
//! `ResourceType` label columns are projected straight from the category
//! values, not reconstructed from the indicators.
//!
//! [`decode_labels`] goes the other way for tables that only carry
//! indicator columns: when several flags are set, the category latest in
//! declaration order wins (`West US` over `East US`).

use std::collections::BTreeSet;

use cdf_core::{Category, Record};

use crate::table::{Column, Stage};

pub const REGION_LABEL_COLUMN: &str = "Region";
pub const RESOURCE_TYPE_LABEL_COLUMN: &str = "ResourceType";

/// Indicator columns for one category, ordered by category.
pub fn indicator_columns<'a, C, I>(values: I) -> Vec<Column>
where
    C: Category,
    I: IntoIterator<Item = &'a C> + Clone,
{
    let distinct: BTreeSet<&C> = values.clone().into_iter().collect();
    distinct
        .into_iter()
        .map(|category| {
            let flags = values
                .clone()
                .into_iter()
                .map(|v| i32::from(v == category))
                .collect();
            Column::int(category.indicator_column(), Stage::Categorical, flags)
        })
        .collect()
}

/// Indicator columns for region and resource type, then the two label columns.
pub fn categorical_columns(records: &[Record]) -> Vec<Column> {
    let mut columns = indicator_columns(records.iter().map(|r| &r.region));
    columns.extend(indicator_columns(records.iter().map(|r| &r.resource_type)));
    columns.push(Column::text(
        REGION_LABEL_COLUMN,
        Stage::Categorical,
        records.iter().map(|r| r.region.label().to_string()).collect(),
    ));
    columns.push(Column::text(
        RESOURCE_TYPE_LABEL_COLUMN,
        Stage::Categorical,
        records
            .iter()
            .map(|r| r.resource_type.label().to_string())
            .collect(),
    ));
    columns
}

/// Category decoded from an indicator column name such as `region_WEST US`.
pub fn category_of_indicator<C: Category>(column: &str) -> Option<C> {
    column
        .strip_prefix(C::PREFIX)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(C::parse)
}

/// Rebuild labels from indicator columns.
///
/// `indicators` pairs each indicator column name with its row flags. A row
/// with no flag set gets an empty label. A row with several flags set takes
/// the last one in category order, whatever the column order.
pub fn decode_labels<C: Category>(indicators: &[(String, Vec<bool>)], height: usize) -> Vec<String> {
    let mut ranked: Vec<(C, &Vec<bool>)> = indicators
        .iter()
        .filter_map(|(name, flags)| category_of_indicator::<C>(name).map(|c| (c, flags)))
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0));

    (0..height)
        .map(|row| {
            ranked
                .iter()
                .rev()
                .find(|(_, flags)| flags.get(row).copied().unwrap_or(false))
                .map(|(category, _)| category.label().to_string())
                .unwrap_or_default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdf_core::{Region, ResourceType};
    use chrono::NaiveDate;

    fn record(region: Region, resource_type: ResourceType) -> Record {
        Record {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            region,
            resource_type,
            usage_cpu: 0.0,
            usage_storage: 0.0,
            users_active: 0,
            holiday: false,
            economic_index: 0.0,
            cloud_market_demand: 0.0,
        }
    }

    #[test]
    fn one_indicator_per_observed_value() {
        let records = vec![
            record(Region::WestUs, ResourceType::Vm),
            record(Region::EastUs, ResourceType::Storage),
            record(Region::WestUs, ResourceType::Vm),
        ];
        let columns = categorical_columns(&records);
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "region_EAST US",
                "region_WEST US",
                "resource_type_VM",
                "resource_type_Storage",
                "Region",
                "ResourceType"
            ]
        );
        assert_eq!(columns[1].ints().unwrap(), &[1, 0, 1]);
        assert_eq!(
            columns[4].texts().unwrap(),
            &["West US".to_string(), "East US".to_string(), "West US".to_string()]
        );
    }

    #[test]
    fn every_row_sets_exactly_one_indicator() {
        let records = vec![
            record(Region::Other("mars".into()), ResourceType::Container),
            record(Region::NorthEurope, ResourceType::Container),
        ];
        let columns = indicator_columns(records.iter().map(|r| &r.region));
        for row in 0..records.len() {
            let set: i32 = columns.iter().map(|c| c.ints().unwrap()[row]).sum();
            assert_eq!(set, 1);
        }
    }

    #[test]
    fn decode_handles_missing_and_multiple_flags() {
        let indicators = vec![
            ("region_WEST US".to_string(), vec![false, true, true]),
            ("region_EAST US".to_string(), vec![false, false, true]),
        ];
        let labels = decode_labels::<Region>(&indicators, 3);
        assert_eq!(labels, vec!["", "West US", "West US"]);
    }

    #[test]
    fn later_region_wins_over_earlier_ones() {
        let indicators = vec![
            ("region_EAST US".to_string(), vec![true, true]),
            ("region_NORTH EUROPE".to_string(), vec![true, false]),
            ("region_SOUTHEAST ASIA".to_string(), vec![false, true]),
        ];
        let labels = decode_labels::<Region>(&indicators, 2);
        assert_eq!(labels, vec!["North Europe", "Southeast Asia"]);

        let types = vec![
            ("resource_type_Container".to_string(), vec![true]),
            ("resource_type_VM".to_string(), vec![true]),
        ];
        assert_eq!(decode_labels::<ResourceType>(&types, 1), vec!["Container"]);
    }

    #[test]
    fn indicator_names_parse_back() {
        assert_eq!(
            category_of_indicator::<ResourceType>("resource_type_Storage"),
            Some(ResourceType::Storage)
        );
        assert_eq!(category_of_indicator::<Region>("resource_type_VM"), None);
        assert_eq!(category_of_indicator::<Region>("Region"), None);
    }
}
