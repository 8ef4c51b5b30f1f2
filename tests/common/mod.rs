// Shared test helpers: scripted readers and an instrumented key-value store

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use hostmon::error::{CollectError, Result};
use hostmon::models::*;
use hostmon::readers::{MetricReader, Reading, Sample};
use hostmon::store::{KvStore, MemoryKv, Versioned};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

pub fn sample_for(category: Category, at: DateTime<Utc>) -> Sample {
    match category {
        Category::Cpu => Sample::Cpu(CpuSample {
            time: at,
            processor_time_percent: 12.5,
        }),
        Category::Memory => Sample::Memory(MemorySample {
            time: at,
            available_bytes: 6 << 30,
            used_bytes: 2 << 30,
        }),
        Category::Disk => Sample::Disk(DiskSample {
            time: at,
            volumes: vec![VolumeUsage {
                mount: "/".into(),
                free_bytes: 40 << 30,
                used_bytes: 60 << 30,
                total_bytes: 100 << 30,
            }],
        }),
        Category::WebServer => Sample::WebServer(WebServerSample {
            iis: IisSample {
                time: at,
                current_connections: 4.0,
                service_uptime_secs: 3600.0,
                get_requests_per_sec: 20.0,
                logon_attempts_per_sec: 0.0,
                not_found_errors_per_sec: 1.0,
                post_requests_per_sec: 3.0,
            },
            was: Some(WasSample {
                time: at,
                health_ping_reply_latency: 2.0,
            }),
            pool: AppPoolSample {
                time: at,
                current_state: 3.0,
                total_recycles: 1.0,
                worker_processes_created: 2.0,
            },
        }),
        Category::DatabaseEngine => Sample::DatabaseEngine(SqlSample {
            time: at,
            full_scans_per_sec: 0.5,
            page_splits_per_sec: 1.5,
            buffer_cache_hit_ratio: 99.0,
            user_connections: 12,
            deadlocks_per_sec: 0.0,
            lock_average_wait_ms: 4.0,
            total_server_memory_kb: 1 << 20,
            batch_requests_per_sec: 40.0,
        }),
    }
}

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    DropHealthPing,
}

/// Reader that returns a canned sample (or failure) and records every call.
pub struct FakeReader {
    category: Category,
    behavior: Behavior,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    read_times: Arc<Mutex<Vec<tokio::time::Instant>>>,
    order_log: Option<Arc<Mutex<Vec<Category>>>>,
}

impl FakeReader {
    pub fn ok(category: Category) -> Self {
        Self {
            category,
            behavior: Behavior::Succeed,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            read_times: Arc::new(Mutex::new(Vec::new())),
            order_log: None,
        }
    }

    pub fn failing(category: Category) -> Self {
        Self {
            behavior: Behavior::Fail,
            ..Self::ok(category)
        }
    }

    /// Web server reader whose health ping probe fails.
    pub fn web_without_health_ping() -> Self {
        Self {
            behavior: Behavior::DropHealthPing,
            ..Self::ok(Category::WebServer)
        }
    }

    /// Simulated sampling latency (warm-up sleeps included).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_order_log(mut self, log: Arc<Mutex<Vec<Category>>>) -> Self {
        self.order_log = Some(log);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn read_times(&self) -> Arc<Mutex<Vec<tokio::time::Instant>>> {
        self.read_times.clone()
    }

    pub fn boxed(self) -> Box<dyn MetricReader> {
        Box::new(self)
    }
}

impl MetricReader for FakeReader {
    fn category(&self) -> Category {
        self.category
    }

    fn read(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<Reading>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.read_times
                .lock()
                .unwrap()
                .push(tokio::time::Instant::now());
            if let Some(log) = &self.order_log {
                log.lock().unwrap().push(self.category);
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.behavior {
                Behavior::Succeed => Ok(Reading::complete(sample_for(self.category, at))),
                Behavior::Fail => Err(CollectError::unavailable(
                    self.category,
                    "counter category does not exist",
                )),
                Behavior::DropHealthPing => {
                    let Sample::WebServer(mut web) = sample_for(Category::WebServer, at) else {
                        unreachable!()
                    };
                    web.was = None;
                    Ok(Reading {
                        sample: Sample::WebServer(web),
                        faults: vec![CollectError::partial(
                            Category::WebServer,
                            "health ping reply latency",
                            "instance not found",
                        )],
                    })
                }
            }
        }
        .boxed()
    }
}

/// MemoryKv wrapper that counts calls per key and can fail reads for matching keys.
#[derive(Default)]
pub struct RecordingKv {
    pub inner: MemoryKv,
    fail_get_suffix: Option<String>,
    gets: Mutex<HashMap<String, usize>>,
    writes: Mutex<HashMap<String, usize>>,
}

impl RecordingKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `get` for a key ending in `suffix` errors as if the backend were down.
    pub fn failing_reads_for(suffix: &str) -> Self {
        Self {
            fail_get_suffix: Some(suffix.to_string()),
            ..Self::default()
        }
    }

    pub fn gets_for(&self, key: &str) -> usize {
        self.gets.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn writes_for(&self, key: &str) -> usize {
        self.writes.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    /// Keys written at least once, sorted.
    pub fn written_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.writes.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl KvStore for RecordingKv {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<Versioned>> {
        *self.gets.lock().unwrap().entry(key.to_string()).or_default() += 1;
        if let Some(suffix) = &self.fail_get_suffix
            && key.ends_with(suffix.as_str())
        {
            return futures_util::future::ready(Err(anyhow::anyhow!("connection refused")))
                .boxed();
        }
        self.inner.get(key)
    }

    fn compare_and_set<'a>(
        &'a self,
        key: &'a str,
        expected_version: u64,
        value: String,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, anyhow::Result<bool>> {
        *self.writes.lock().unwrap().entry(key.to_string()).or_default() += 1;
        self.inner.compare_and_set(key, expected_version, value, ttl)
    }
}

/// Category field of every `warn!` event emitted while the returned guard is alive.
/// Only sees events from the current thread; use with the current-thread test runtime.
pub fn capture_warnings() -> (tracing::subscriber::DefaultGuard, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(WarnCollector(seen.clone()));
    (tracing::subscriber::set_default(subscriber), seen)
}

struct WarnCollector(Arc<Mutex<Vec<String>>>);

impl<S: tracing::Subscriber> Layer<S> for WarnCollector {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != tracing::Level::WARN {
            return;
        }
        let mut category = CategoryField::default();
        event.record(&mut category);
        self.0
            .lock()
            .unwrap()
            .push(category.0.unwrap_or_default());
    }
}

#[derive(Default)]
struct CategoryField(Option<String>);

impl Visit for CategoryField {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "category" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}
