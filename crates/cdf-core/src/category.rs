//! Tagged-variant categories for the two grouping keys.
//!
//! A category value has two independent projections:
//! - [`Category::key`]: the suffix used for indicator column names
//!   (`region_EAST US`, `resource_type_VM`)
//! - [`Category::label`]: the display string used by dashboard filters
//!   (`East US`, `VM`)
//!
//! Known cloud regions and resource types get dedicated variants; anything
//! else observed in the data is carried verbatim in `Other`. The derived
//! ordering (known variants in declaration order, then `Other` by string)
//! decides which label wins when several indicator columns are set: the
//! greatest one.

use std::fmt;

/// Common behaviour of categorical grouping keys.
pub trait Category: Clone + Ord + fmt::Debug + Send + Sync + 'static {
    /// Column name prefix of the indicator columns (`region`, `resource_type`).
    const PREFIX: &'static str;

    /// Parse a raw value. Blank input is treated as null.
    fn parse(raw: &str) -> Option<Self>;

    fn key(&self) -> &str;

    fn label(&self) -> &str;

    /// Name of this value's indicator column.
    fn indicator_column(&self) -> String {
        format!("{}_{}", Self::PREFIX, self.key())
    }
}

/// Collapse case and separators so `EAST US`, `east-us` and `eastus` compare equal.
fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Region {
    EastUs,
    NorthEurope,
    SoutheastAsia,
    WestUs,
    Other(String),
}

impl Category for Region {
    const PREFIX: &'static str = "region";

    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match normalize(trimmed).as_str() {
            "eastus" => Region::EastUs,
            "northeurope" => Region::NorthEurope,
            "southeastasia" => Region::SoutheastAsia,
            "westus" => Region::WestUs,
            _ => Region::Other(trimmed.to_string()),
        })
    }

    fn key(&self) -> &str {
        match self {
            Region::EastUs => "EAST US",
            Region::NorthEurope => "NORTH EUROPE",
            Region::SoutheastAsia => "SOUTHEAST ASIA",
            Region::WestUs => "WEST US",
            Region::Other(value) => value,
        }
    }

    fn label(&self) -> &str {
        match self {
            Region::EastUs => "East US",
            Region::NorthEurope => "North Europe",
            Region::SoutheastAsia => "Southeast Asia",
            Region::WestUs => "West US",
            Region::Other(value) => value,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceType {
    Vm,
    Storage,
    Container,
    Other(String),
}

impl Category for ResourceType {
    const PREFIX: &'static str = "resource_type";

    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match normalize(trimmed).as_str() {
            "vm" => ResourceType::Vm,
            "storage" => ResourceType::Storage,
            "container" => ResourceType::Container,
            _ => ResourceType::Other(trimmed.to_string()),
        })
    }

    fn key(&self) -> &str {
        match self {
            ResourceType::Vm => "VM",
            ResourceType::Storage => "Storage",
            ResourceType::Container => "Container",
            ResourceType::Other(value) => value,
        }
    }

    fn label(&self) -> &str {
        match self {
            ResourceType::Vm => "VM",
            ResourceType::Storage => "Storage",
            ResourceType::Container => "Container",
            ResourceType::Other(value) => value,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
