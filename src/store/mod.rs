// Date-bucketed persistence over a versioned key-value backend.
// Appends are whole-bucket read-modify-write guarded by compare-and-set.

mod memory;
mod sqlite;

pub use memory::MemoryKv;
pub use sqlite::{SqliteKv, spawn_purge};

use crate::error::{CollectError, Result};
use crate::models::{BucketKey, DailyBucket, HOST_REGISTRY_KEY};
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Attempts per append before giving up with [`CollectError::StoreConflict`].
pub const DEFAULT_MAX_APPEND_ATTEMPTS: u32 = 5;

/// A value read together with the version a conditional write must match.
/// `version == 0` means no row exists for the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Versioned {
    pub value: Option<String>,
    pub version: u64,
}

/// String-keyed store with per-key expiry and optimistic writes.
pub trait KvStore: Send + Sync {
    /// Current value and version. Expired values read as `None` but keep their version.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<Versioned>>;

    /// Writes `value` only if the stored version still equals `expected_version`.
    /// Returns `false` when another writer got there first. `ttl = None` never expires.
    fn compare_and_set<'a>(
        &'a self,
        key: &'a str,
        expected_version: u64,
        value: String,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, anyhow::Result<bool>>;
}

pub struct DateBucketStore {
    kv: Arc<dyn KvStore>,
    retention: Duration,
    max_attempts: u32,
}

impl DateBucketStore {
    pub fn new(kv: Arc<dyn KvStore>, retention_days: u32) -> Self {
        Self {
            kv,
            retention: Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60),
            max_attempts: DEFAULT_MAX_APPEND_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Appends `sample` to the bucket at `key`, creating it on first write.
    /// Expiry is reapplied on every write. Returns the bucket length after the append.
    #[instrument(skip(self, sample), fields(store = "bucket", operation = "append", key = %key))]
    pub async fn append<T: Serialize>(&self, key: &BucketKey, sample: &T) -> Result<usize> {
        let key_str = key.to_string();
        let value = serde_json::to_value(sample).map_err(|e| CollectError::StoreEncode {
            key: key_str.clone(),
            source: e,
        })?;

        for attempt in 1..=self.max_attempts {
            let current = self.fetch(&key_str).await?;
            let mut bucket = match non_blank(current.value.as_deref()) {
                None => DailyBucket::new(key.date()),
                Some(raw) => decode::<DailyBucket<serde_json::Value>>(&key_str, raw)?,
            };
            bucket.samples.push(value.clone());
            let encoded = encode(&key_str, &bucket)?;

            if self
                .write(&key_str, current.version, encoded, Some(self.retention))
                .await?
            {
                return Ok(bucket.len());
            }
            debug!(attempt, "bucket changed concurrently, retrying");
        }

        Err(CollectError::StoreConflict {
            key: key_str,
            attempts: self.max_attempts,
        })
    }

    /// Reads back the bucket at `key`, if one exists and has not expired.
    pub async fn load<T: DeserializeOwned>(
        &self,
        key: &BucketKey,
    ) -> Result<Option<DailyBucket<T>>> {
        let key_str = key.to_string();
        let current = self.fetch(&key_str).await?;
        non_blank(current.value.as_deref())
            .map(|raw| decode(&key_str, raw))
            .transpose()
    }

    /// Adds `host_id` to the known-hosts registry if it is not there yet.
    /// Returns `true` when this call added it.
    #[instrument(skip(self), fields(store = "bucket", operation = "register_host"))]
    pub async fn register_host(&self, host_id: &str) -> Result<bool> {
        for attempt in 1..=self.max_attempts {
            let current = self.fetch(HOST_REGISTRY_KEY).await?;
            let mut hosts: Vec<String> = match non_blank(current.value.as_deref()) {
                None => Vec::new(),
                Some(raw) => decode(HOST_REGISTRY_KEY, raw)?,
            };
            if hosts.iter().any(|h| h == host_id) {
                return Ok(false);
            }
            hosts.push(host_id.to_string());
            let encoded = encode(HOST_REGISTRY_KEY, &hosts)?;

            if self
                .write(HOST_REGISTRY_KEY, current.version, encoded, None)
                .await?
            {
                return Ok(true);
            }
            debug!(attempt, "host registry changed concurrently, retrying");
        }

        Err(CollectError::StoreConflict {
            key: HOST_REGISTRY_KEY.to_string(),
            attempts: self.max_attempts,
        })
    }

    pub async fn known_hosts(&self) -> Result<Vec<String>> {
        let current = self.fetch(HOST_REGISTRY_KEY).await?;
        match non_blank(current.value.as_deref()) {
            None => Ok(Vec::new()),
            Some(raw) => decode(HOST_REGISTRY_KEY, raw),
        }
    }

    async fn fetch(&self, key: &str) -> Result<Versioned> {
        self.kv
            .get(key)
            .await
            .map_err(|e| CollectError::StoreUnreachable {
                key: key.to_string(),
                source: e,
            })
    }

    async fn write(
        &self,
        key: &str,
        expected_version: u64,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        self.kv
            .compare_and_set(key, expected_version, value, ttl)
            .await
            .map_err(|e| CollectError::StoreUnreachable {
                key: key.to_string(),
                source: e,
            })
    }
}

/// Absent and whitespace-only values both mean "nothing stored yet".
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| CollectError::StoreCorrupt {
        key: key.to_string(),
        source: e,
    })
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CollectError::StoreEncode {
        key: key.to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::non_blank;

    #[test]
    fn blank_values_read_as_absent() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("")), None);
        assert_eq!(non_blank(Some("  \n")), None);
        assert_eq!(non_blank(Some("[]")), Some("[]"));
    }
}
