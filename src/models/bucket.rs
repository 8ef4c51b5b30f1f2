// Bucket keys and the persisted per-day record

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::StoreTag;

/// Well-known key holding the JSON list of every host id that has ever reported.
pub const HOST_REGISTRY_KEY: &str = "Monitoring:ServerName";

/// `{host_id}:{yyyyMMdd}:{TAG}`; exactly one bucket exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    host_id: String,
    date: NaiveDate,
    tag: StoreTag,
}

impl BucketKey {
    pub fn new(host_id: impl Into<String>, date: NaiveDate, tag: StoreTag) -> Self {
        Self {
            host_id: host_id.into(),
            date,
            tag,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.host_id,
            self.date.format("%Y%m%d"),
            self.tag
        )
    }
}

/// All samples of one category for one host and one UTC day, in collection order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBucket<T> {
    pub date: NaiveDate,
    pub samples: Vec<T>,
}

impl<T> DailyBucket<T> {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            samples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
