use super::{MetricReader, Reading, Sample, read_counters};
use crate::counters::{CounterPath, CounterSource};
use crate::error::{CollectError, Result};
use crate::models::{Category, SqlSample};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Database engine access, buffer, lock and memory counters. All-or-nothing.
pub struct SqlReader {
    source: Arc<dyn CounterSource>,
    paths: Arc<[CounterPath]>,
    settle: Duration,
}

impl SqlReader {
    /// `object_prefix` is `SQLServer` for the default instance, `MSSQL$NAME` for a named one.
    pub fn new(source: Arc<dyn CounterSource>, object_prefix: &str, settle: Duration) -> Self {
        let object = |suffix: &str| format!("{}:{}", object_prefix, suffix);
        let paths = vec![
            CounterPath::new(object("Access Methods"), "Full Scans/sec"),
            CounterPath::new(object("Access Methods"), "Page Splits/sec"),
            CounterPath::new(object("Buffer Manager"), "Buffer cache hit ratio"),
            CounterPath::new(object("General Statistics"), "User Connections"),
            CounterPath::new(object("Locks"), "Number of Deadlocks/sec").instance("_Total"),
            CounterPath::new(object("Locks"), "Average Wait Time (ms)").instance("_Total"),
            CounterPath::new(object("Memory Manager"), "Total Server Memory (KB)"),
            CounterPath::new(object("SQL Statistics"), "Batch Requests/sec"),
        ];
        Self {
            source,
            paths: paths.into(),
            settle,
        }
    }

    pub fn counter_paths(&self) -> &[CounterPath] {
        &self.paths
    }

    #[instrument(skip(self), fields(reader = "sql", operation = "read"))]
    async fn sample(&self, at: DateTime<Utc>) -> Result<Reading> {
        self.read_all().await?;
        tokio::time::sleep(self.settle).await;
        let v = self.read_all().await?;

        Ok(Reading::complete(Sample::DatabaseEngine(SqlSample {
            time: at,
            full_scans_per_sec: v[0],
            page_splits_per_sec: v[1],
            buffer_cache_hit_ratio: v[2],
            user_connections: v[3].max(0.0) as u64,
            deadlocks_per_sec: v[4],
            lock_average_wait_ms: v[5],
            total_server_memory_kb: v[6].max(0.0) as u64,
            batch_requests_per_sec: v[7],
        })))
    }

    async fn read_all(&self) -> Result<Vec<f64>> {
        read_counters(self.source.clone(), self.paths.clone())
            .await
            .map_err(|e| CollectError::unavailable(Category::DatabaseEngine, e))?
            .into_iter()
            .map(|r| r.map_err(|e| CollectError::unavailable(Category::DatabaseEngine, e)))
            .collect()
    }
}

impl MetricReader for SqlReader {
    fn category(&self) -> Category {
        Category::DatabaseEngine
    }

    fn read(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<Reading>> {
        self.sample(at).boxed()
    }
}
