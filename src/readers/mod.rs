// Metric readers: one per category. Each owns its counter handles for the process lifetime.

mod cpu;
mod database;
mod disk;
mod memory;
mod web;

pub use cpu::CpuReader;
pub use database::SqlReader;
pub use disk::DiskReader;
pub use memory::MemoryReader;
pub use web::WebServerReader;

use crate::config::AppConfig;
use crate::counters::{CounterPath, CounterSource};
use crate::error::{CollectError, Result};
use crate::models::{Category, CpuSample, DiskSample, MemorySample, SqlSample, WebServerSample};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

/// One category's measurement.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Cpu(CpuSample),
    Memory(MemorySample),
    Disk(DiskSample),
    WebServer(WebServerSample),
    DatabaseEngine(SqlSample),
}

/// A sample plus the sub-metrics that failed while producing it.
/// Faults are always [`CollectError::ReaderPartial`].
#[derive(Debug)]
pub struct Reading {
    pub sample: Sample,
    pub faults: Vec<CollectError>,
}

impl Reading {
    pub fn complete(sample: Sample) -> Self {
        Self {
            sample,
            faults: Vec::new(),
        }
    }
}

/// Samples one category. `at` is the cycle start, stamped on every record of the cycle.
pub trait MetricReader: Send + Sync {
    fn category(&self) -> Category;

    fn read(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<Reading>>;
}

/// Readers for every enabled category, in evaluation order.
pub fn build(config: &AppConfig, counters: Arc<dyn CounterSource>) -> Vec<Box<dyn MetricReader>> {
    let settle = Duration::from_millis(config.monitor.settle_ms);
    let memory_settle = Duration::from_millis(config.monitor.memory_settle_ms);
    let enabled = &config.categories;

    let mut readers: Vec<Box<dyn MetricReader>> = Vec::new();
    if enabled.is_enabled(Category::Cpu) {
        readers.push(Box::new(CpuReader::new(settle)));
    }
    if enabled.is_enabled(Category::Memory) {
        readers.push(Box::new(MemoryReader::new(memory_settle)));
    }
    if enabled.is_enabled(Category::Disk) {
        readers.push(Box::new(DiskReader::new()));
    }
    if enabled.is_enabled(Category::WebServer) {
        readers.push(Box::new(WebServerReader::new(
            counters.clone(),
            &config.counters.web_instance,
            settle,
        )));
    }
    if enabled.is_enabled(Category::DatabaseEngine) {
        readers.push(Box::new(SqlReader::new(
            counters,
            &config.counters.sql_object_prefix,
            settle,
        )));
    }
    readers
}

/// Reads every path once on the blocking pool, in order.
/// Each slot carries its own result so callers decide which failures are fatal.
async fn read_counters(
    source: Arc<dyn CounterSource>,
    paths: Arc<[CounterPath]>,
) -> anyhow::Result<Vec<anyhow::Result<f64>>> {
    tokio::task::spawn_blocking(move || paths.iter().map(|p| source.next_value(p)).collect())
        .await
        .map_err(|e| anyhow::anyhow!("counter task join: {}", e))
}
