//! Aggregation query service.
//!
//! The service holds the current table behind a `RwLock<Arc<QueryTable>>`.
//! A query clones the `Arc` (and the generation number) under a short read
//! lock and computes without holding it, so a concurrent [`reload`] never
//! blocks or tears a running query.
//!
//! [`reload`]: QueryService::reload

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cdf_core::{CdfError, CdfResult, QueryConfig};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStats, TtlCache};
use crate::engine::execute;
use crate::query::{FilterSpec, QueryRequest};
use crate::response::{QueryOutput, QueryResponse};
use crate::table::QueryTable;
use crate::views::{render, DashboardView, ViewOutput};

const QUERY_ENDPOINT: &str = "query";

pub struct QueryService {
    table: RwLock<Arc<QueryTable>>,
    generation: AtomicU64,
    cache: TtlCache<ViewOutput>,
}

impl QueryService {
    pub fn new(table: QueryTable, config: &QueryConfig) -> CdfResult<Self> {
        config.validate()?;
        Ok(Self {
            table: RwLock::new(Arc::new(table)),
            generation: AtomicU64::new(0),
            cache: TtlCache::new(config.cache_ttl(), config.cache_capacity),
        })
    }

    /// Snapshot of the current table and its generation.
    fn snapshot(&self) -> (Arc<QueryTable>, u64) {
        let guard = self.table.read();
        (Arc::clone(&guard), self.generation.load(Ordering::Acquire))
    }

    pub fn table(&self) -> Arc<QueryTable> {
        self.snapshot().0
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Swap in a new table. Cached results of the old table are dropped
    /// and, being tagged with the old generation, can never be served.
    pub fn reload(&self, table: QueryTable) {
        let rows = table.len();
        {
            let mut guard = self.table.write();
            *guard = Arc::new(table);
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        self.cache.clear();
        info!(rows, generation = self.generation(), "reloaded feature table");
    }

    fn cached(
        &self,
        key: CacheKey,
        compute: impl FnOnce(&QueryTable) -> CdfResult<ViewOutput>,
    ) -> CdfResult<Arc<ViewOutput>> {
        let (table, generation) = self.snapshot();
        if let Some(hit) = self.cache.get(&key, generation) {
            return Ok(hit);
        }
        debug!(endpoint = %key.endpoint, generation, "cache miss");
        let output = Arc::new(compute(&table)?);
        self.cache.insert(key, Arc::clone(&output), generation);
        Ok(output)
    }

    /// Run one aggregation request.
    pub fn try_query(&self, request: &QueryRequest) -> CdfResult<Arc<ViewOutput>> {
        let query = request.validate()?;
        self.cached(CacheKey::new(QUERY_ENDPOINT, request.to_string()), |table| {
            Ok(ViewOutput::Rows(execute(table, &query)))
        })
    }

    /// Run one aggregation request, turning failures into `{error}`.
    pub fn query(&self, request: &QueryRequest) -> QueryResponse {
        match self.try_query(request) {
            Ok(output) => match output.rows() {
                Some(rows) => QueryResponse::ok(rows),
                None => QueryResponse::ok(&QueryOutput::default()),
            },
            Err(err) => {
                warn!(error = %err, "query failed");
                QueryResponse::failure(err.to_string())
            }
        }
    }

    pub fn try_view(&self, view: DashboardView, filters: &FilterSpec) -> CdfResult<Arc<ViewOutput>> {
        let params = serde_json::to_string(filters).map_err(CdfError::from)?;
        self.cached(CacheKey::new(view.name(), params), |table| {
            render(view, table, filters)
        })
    }

    /// Render a named view as JSON, turning failures into `{error}`.
    pub fn view(&self, view: DashboardView, filters: &FilterSpec) -> Value {
        match self.try_view(view, filters) {
            Ok(output) => output.to_json(),
            Err(err) => {
                warn!(view = view.name(), error = %err, "view failed");
                json!({ "error": err.to_string() })
            }
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{GroupField, Stat};
    use crate::table::QueryRow;
    use cdf_core::Metric;
    use chrono::NaiveDate;

    fn row(region: &str, cpu: f64) -> QueryRow {
        QueryRow {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            region: region.into(),
            resource_type: "VM".into(),
            holiday: false,
            usage_cpu: cpu,
            usage_storage: 1.0,
            users_active: 1.0,
            economic_index: 1.0,
            cloud_market_demand: 1.0,
        }
    }

    fn request() -> QueryRequest {
        QueryRequest::new()
            .group_by(GroupField::Region)
            .aggregate(Metric::UsageCpu, &[Stat::Mean])
    }

    #[test]
    fn repeated_query_hits_cache() {
        let service =
            QueryService::new(QueryTable::new(vec![row("east", 1.0)]), &QueryConfig::default())
                .unwrap();
        let first = service.try_query(&request()).unwrap();
        let second = service.try_query(&request()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(service.cache_stats().hits, 1);
    }

    #[test]
    fn reload_invalidates_results() {
        let service =
            QueryService::new(QueryTable::new(vec![row("east", 1.0)]), &QueryConfig::default())
                .unwrap();
        let before = service.query(&request());
        service.reload(QueryTable::new(vec![row("east", 9.0)]));
        let after = service.query(&request());
        assert_ne!(before, after);
        assert_eq!(after.rows.unwrap()[0]["usage_cpu_mean"], json!(9.0));
        assert_eq!(service.generation(), 1);
    }

    #[test]
    fn errors_become_payloads() {
        let service =
            QueryService::new(QueryTable::default(), &QueryConfig::default()).unwrap();
        let mut bad = request();
        bad.group_by.push("planet".into());
        let response = service.query(&bad);
        assert!(response.rows.is_none());
        assert!(response.error.unwrap().contains("planet"));
    }

    #[test]
    fn view_json_wraps_rows() {
        let service =
            QueryService::new(QueryTable::new(vec![row("east", 4.0)]), &QueryConfig::default())
                .unwrap();
        let value = service.view(DashboardView::RegionalDistribution, &FilterSpec::default());
        assert_eq!(value["rows"][0]["usage_cpu_sum"], json!(4.0));
    }
}
