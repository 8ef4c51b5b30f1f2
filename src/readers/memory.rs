use super::{MetricReader, Reading, Sample};
use crate::error::{CollectError, Result};
use crate::models::{Category, MemorySample};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::System;
use tracing::instrument;

pub struct MemoryReader {
    sys: Arc<Mutex<System>>,
    settle: Duration,
}

impl MemoryReader {
    pub fn new(settle: Duration) -> Self {
        Self {
            sys: Arc::new(Mutex::new(System::new())),
            settle,
        }
    }

    #[instrument(skip(self), fields(reader = "memory", operation = "read"))]
    async fn sample(&self, at: DateTime<Utc>) -> Result<Reading> {
        let sys = self.sys.clone();
        let settle = self.settle;
        let (total, available) = tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            sys.refresh_memory();
            std::thread::sleep(settle);
            sys.refresh_memory();
            let total = sys.total_memory();
            anyhow::ensure!(total > 0, "total memory reported as zero");
            Ok((total, sys.available_memory()))
        })
        .await
        .map_err(|e| {
            CollectError::unavailable(Category::Memory, format!("sysinfo task join: {}", e))
        })?
        .map_err(|e| CollectError::unavailable(Category::Memory, e))?;

        Ok(Reading::complete(Sample::Memory(MemorySample {
            time: at,
            available_bytes: available,
            used_bytes: total.saturating_sub(available),
        })))
    }
}

impl MetricReader for MemoryReader {
    fn category(&self) -> Category {
        Category::Memory
    }

    fn read(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<Reading>> {
        self.sample(at).boxed()
    }
}
