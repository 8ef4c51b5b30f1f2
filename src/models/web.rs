// Web server samples: service counters, worker health ping, application pool

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IisSample {
    pub time: DateTime<Utc>,
    pub current_connections: f64,
    pub service_uptime_secs: f64,
    pub get_requests_per_sec: f64,
    pub logon_attempts_per_sec: f64,
    pub not_found_errors_per_sec: f64,
    pub post_requests_per_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasSample {
    pub time: DateTime<Utc>,
    pub health_ping_reply_latency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPoolSample {
    pub time: DateTime<Utc>,
    pub current_state: f64,
    pub total_recycles: f64,
    pub worker_processes_created: f64,
}

/// One web server reading. `was` is `None` when the health ping probe failed;
/// the other two records are still stored.
#[derive(Debug, Clone, PartialEq)]
pub struct WebServerSample {
    pub iis: IisSample,
    pub was: Option<WasSample>,
    pub pool: AppPoolSample,
}
