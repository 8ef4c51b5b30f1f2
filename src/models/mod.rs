// Domain models: categories, bucket keys, daily buckets and per-category samples

mod bucket;
mod category;
mod database;
mod storage;
mod system;
mod web;

pub use bucket::{BucketKey, DailyBucket, HOST_REGISTRY_KEY};
pub use category::{Category, StoreTag};
pub use database::SqlSample;
pub use storage::{DiskSample, VolumeUsage};
pub use system::{CpuSample, MemorySample};
pub use web::{AppPoolSample, IisSample, WasSample, WebServerSample};
