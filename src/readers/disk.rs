use super::{MetricReader, Reading, Sample};
use crate::error::{CollectError, Result};
use crate::models::{Category, DiskSample, VolumeUsage};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::sync::{Arc, Mutex};
use sysinfo::Disks;
use tracing::instrument;

/// Space usage of fixed volumes. No warm-up: sizes are absolute values.
pub struct DiskReader {
    disks: Arc<Mutex<Disks>>,
}

impl Default for DiskReader {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskReader {
    pub fn new() -> Self {
        Self {
            disks: Arc::new(Mutex::new(Disks::new_with_refreshed_list())),
        }
    }

    #[instrument(skip(self), fields(reader = "disk", operation = "read"))]
    async fn sample(&self, at: DateTime<Utc>) -> Result<Reading> {
        let disks = self.disks.clone();
        let volumes = tokio::task::spawn_blocking(move || {
            let mut disks = disks
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo disks lock poisoned: {}", e))?;
            disks.refresh(true);
            let volumes: Vec<VolumeUsage> = disks
                .list()
                .iter()
                .filter(|d| !d.is_removable() && d.total_space() > 0)
                .map(|d| {
                    let total = d.total_space();
                    let free = d.available_space();
                    VolumeUsage {
                        mount: d.mount_point().to_string_lossy().into_owned(),
                        free_bytes: free,
                        used_bytes: total.saturating_sub(free),
                        total_bytes: total,
                    }
                })
                .collect();
            anyhow::ensure!(!volumes.is_empty(), "no fixed volumes found");
            Ok(volumes)
        })
        .await
        .map_err(|e| CollectError::unavailable(Category::Disk, format!("sysinfo task join: {}", e)))?
        .map_err(|e| CollectError::unavailable(Category::Disk, e))?;

        Ok(Reading::complete(Sample::Disk(DiskSample { time: at, volumes })))
    }
}

impl MetricReader for DiskReader {
    fn category(&self) -> Category {
        Category::Disk
    }

    fn read(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<Reading>> {
        self.sample(at).boxed()
    }
}
