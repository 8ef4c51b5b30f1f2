use super::{MetricReader, Reading, Sample};
use crate::error::{CollectError, Result};
use crate::models::{Category, CpuSample};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::System;
use tracing::instrument;

/// Global processor busy time. The first refresh only sets the baseline;
/// the value reported is the usage across the settle window.
pub struct CpuReader {
    sys: Arc<Mutex<System>>,
    settle: Duration,
}

impl CpuReader {
    pub fn new(settle: Duration) -> Self {
        Self {
            sys: Arc::new(Mutex::new(System::new())),
            settle: settle.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    #[instrument(skip(self), fields(reader = "cpu", operation = "read"))]
    async fn sample(&self, at: DateTime<Utc>) -> Result<Reading> {
        let sys = self.sys.clone();
        let settle = self.settle;
        let usage = tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            sys.refresh_cpu_usage();
            std::thread::sleep(settle);
            sys.refresh_cpu_usage();
            anyhow::ensure!(!sys.cpus().is_empty(), "no processors reported");
            Ok(sys.global_cpu_usage() as f64)
        })
        .await
        .map_err(|e| CollectError::unavailable(Category::Cpu, format!("sysinfo task join: {}", e)))?
        .map_err(|e| CollectError::unavailable(Category::Cpu, e))?;

        Ok(Reading::complete(Sample::Cpu(CpuSample {
            time: at,
            processor_time_percent: usage.clamp(0.0, 100.0),
        })))
    }
}

impl MetricReader for CpuReader {
    fn category(&self) -> Category {
        Category::Cpu
    }

    fn read(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<Reading>> {
        self.sample(at).boxed()
    }
}
