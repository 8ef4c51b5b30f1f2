// Disk samples

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeUsage {
    pub mount: String,
    pub free_bytes: u64,
    pub used_bytes: u64,
    pub total_bytes: u64,
}

/// Fixed (non-removable) volumes only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSample {
    pub time: DateTime<Utc>,
    pub volumes: Vec<VolumeUsage>,
}
