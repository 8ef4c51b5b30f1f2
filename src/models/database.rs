// Database engine samples

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlSample {
    pub time: DateTime<Utc>,
    pub full_scans_per_sec: f64,
    pub page_splits_per_sec: f64,
    pub buffer_cache_hit_ratio: f64,
    pub user_connections: u64,
    pub deadlocks_per_sec: f64,
    pub lock_average_wait_ms: f64,
    pub total_server_memory_kb: u64,
    pub batch_requests_per_sec: f64,
}
