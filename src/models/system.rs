// CPU and memory samples

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuSample {
    pub time: DateTime<Utc>,
    /// Global busy time over the settle window, 0..=100.
    pub processor_time_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySample {
    pub time: DateTime<Utc>,
    pub available_bytes: u64,
    pub used_bytes: u64,
}
