//! Grouped aggregation queries over a feature table.
//!
//! A [`QueryService`] answers [`QueryRequest`]s (group by date, region,
//! resource type or holiday; mean/max/min/std/sum/count of the usage
//! metrics; optional ratios and filters) and renders the named
//! [`DashboardView`]s. Results are cached per table generation for a
//! bounded time.
//!
//! ```ignore
//! let service = QueryService::new(QueryTable::from_features(&table), &QueryConfig::default())?;
//! let response = service.query(
//!     &QueryRequest::new()
//!         .group_by(GroupField::Region)
//!         .aggregate(Metric::UsageCpu, &[Stat::Mean]),
//! );
//! ```

pub mod cache;
pub mod engine;
pub mod query;
pub mod response;
pub mod service;
pub mod stats;
pub mod table;
pub mod views;

pub use cache::{CacheKey, CacheStats, TtlCache};
pub use engine::execute;
pub use query::{FilterSpec, Filters, GroupField, Query, QueryRequest, Ratio, Stat};
pub use response::{Cell, QueryOutput, QueryResponse};
pub use service::QueryService;
pub use table::{QueryRow, QueryTable};
pub use views::{DashboardView, ViewOutput};
