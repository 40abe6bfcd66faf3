//! Non-fatal findings recorded while a pipeline run proceeds.
//!
//! A finding never stops a run; fatal conditions are [`CdfError`]s. Each
//! finding names the stage that raised it and its subject: a series key, a
//! resource type or a column.
//!
//! ```
//! use cdf_core::diagnostics::{Diagnostics, FindingSource};
//!
//! let mut diag = Diagnostics::new();
//! diag.record(FindingSource::Derived, "Storage", "maximum usage_cpu is 0; ratio set to NaN");
//! assert_eq!(diag.len(), 1);
//! ```
//!
//! [`CdfError`]: crate::CdfError

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSource {
    Partition,
    Derived,
    Reconcile,
}

impl FindingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingSource::Partition => "partition",
            FindingSource::Derived => "derived",
            FindingSource::Reconcile => "reconcile",
        }
    }
}

impl fmt::Display for FindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub source: FindingSource,
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.source, self.subject, self.message)
    }
}

/// Findings of one run, in the order they were raised.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    findings: Vec<Finding>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        source: FindingSource,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.findings.push(Finding {
            source,
            subject: subject.into(),
            message: message.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter()
    }

    pub fn from_source(&self, source: FindingSource) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.source == source)
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.findings.extend(other.findings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_source_and_subject() {
        let mut diag = Diagnostics::new();
        diag.record(FindingSource::Reconcile, "usage_cpu_lag7", "3 value(s) still null after fill");
        let finding = diag.iter().next().unwrap();
        assert_eq!(
            finding.to_string(),
            "reconcile [usage_cpu_lag7]: 3 value(s) still null after fill"
        );
    }

    #[test]
    fn merge_keeps_order() {
        let mut diag = Diagnostics::new();
        diag.record(FindingSource::Partition, "East US/VM", "1 repeated date(s) within series");
        let mut other = Diagnostics::new();
        other.record(FindingSource::Derived, "Storage", "maximum usage_cpu is 0; ratio set to NaN");
        diag.merge(other);

        assert_eq!(diag.len(), 2);
        assert_eq!(diag.from_source(FindingSource::Derived).count(), 1);
        let sources: Vec<_> = diag.iter().map(|f| f.source).collect();
        assert_eq!(sources, vec![FindingSource::Partition, FindingSource::Derived]);
    }

    #[test]
    fn serializes_as_a_list() {
        let mut diag = Diagnostics::new();
        diag.record(FindingSource::Derived, "VM", "maximum usage_storage is 0; ratio set to NaN");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json[0]["source"], "derived");
        assert_eq!(json[0]["subject"], "VM");
        assert!(Diagnostics::new().is_empty());
    }
}
