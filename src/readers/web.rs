use super::{MetricReader, Reading, Sample, read_counters};
use crate::counters::{CounterPath, CounterSource};
use crate::error::{CollectError, Result};
use crate::models::{AppPoolSample, Category, IisSample, WasSample, WebServerSample};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const WEB_SERVICE: &str = "Web Service";
const SERVICE_COUNTERS: [&str; 6] = [
    "Current Connections",
    "Service Uptime",
    "Get Requests/sec",
    "Logon Attempts/sec",
    "Not Found Errors/sec",
    "Post Requests/sec",
];
const APP_POOL: &str = "APP_POOL_WAS";
const POOL_COUNTERS: [&str; 3] = [
    "Current Application Pool State",
    "Total Application Pool Recycles",
    "Total Worker Processes Created",
];

// Slot layout of `paths`: service counters, then the health ping, then pool counters.
const WAS_SLOT: usize = SERVICE_COUNTERS.len();
const POOL_START: usize = WAS_SLOT + 1;

/// Web server service, worker health and application pool counters.
///
/// A failing health ping probe only drops the WAS record; any other failing counter
/// makes the whole category unavailable for the cycle.
pub struct WebServerReader {
    source: Arc<dyn CounterSource>,
    paths: Arc<[CounterPath]>,
    settle: Duration,
}

impl WebServerReader {
    pub fn new(source: Arc<dyn CounterSource>, instance: &str, settle: Duration) -> Self {
        let mut paths: Vec<CounterPath> = SERVICE_COUNTERS
            .iter()
            .map(|c| CounterPath::new(WEB_SERVICE, *c).instance(instance))
            .collect();
        paths.push(CounterPath::new("WAS_W3WP", "Health Ping Reply Latency").instance("_Total"));
        paths.extend(
            POOL_COUNTERS
                .iter()
                .map(|c| CounterPath::new(APP_POOL, *c).instance(instance)),
        );
        Self {
            source,
            paths: paths.into(),
            settle,
        }
    }

    pub fn counter_paths(&self) -> &[CounterPath] {
        &self.paths
    }

    #[instrument(skip(self), fields(reader = "web", operation = "read"))]
    async fn sample(&self, at: DateTime<Utc>) -> Result<Reading> {
        let warmup = self.read_once().await?;
        for (slot, value) in warmup.iter().enumerate() {
            if let Err(e) = value {
                if slot == WAS_SLOT {
                    debug!(error = %e, "health ping warm-up read failed");
                } else {
                    return Err(CollectError::unavailable(Category::WebServer, e));
                }
            }
        }

        tokio::time::sleep(self.settle).await;
        let values = self.read_once().await?;
        let required = |slot: usize| -> Result<f64> {
            values[slot]
                .as_ref()
                .copied()
                .map_err(|e| CollectError::unavailable(Category::WebServer, e))
        };

        let iis = IisSample {
            time: at,
            current_connections: required(0)?,
            service_uptime_secs: required(1)?,
            get_requests_per_sec: required(2)?,
            logon_attempts_per_sec: required(3)?,
            not_found_errors_per_sec: required(4)?,
            post_requests_per_sec: required(5)?,
        };
        let pool = AppPoolSample {
            time: at,
            current_state: required(POOL_START)?,
            total_recycles: required(POOL_START + 1)?,
            worker_processes_created: required(POOL_START + 2)?,
        };

        let mut faults = Vec::new();
        let was = match &values[WAS_SLOT] {
            Ok(latency) => Some(WasSample {
                time: at,
                health_ping_reply_latency: *latency,
            }),
            Err(e) => {
                faults.push(CollectError::partial(
                    Category::WebServer,
                    "health ping reply latency",
                    e,
                ));
                None
            }
        };

        Ok(Reading {
            sample: Sample::WebServer(WebServerSample { iis, was, pool }),
            faults,
        })
    }

    async fn read_once(&self) -> Result<Vec<anyhow::Result<f64>>> {
        read_counters(self.source.clone(), self.paths.clone())
            .await
            .map_err(|e| CollectError::unavailable(Category::WebServer, e))
    }
}

impl MetricReader for WebServerReader {
    fn category(&self) -> Category {
        Category::WebServer
    }

    fn read(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<Reading>> {
        self.sample(at).boxed()
    }
}
