// In-process KvStore. Expiry follows tokio's clock so paused-time tests can advance it.

use super::{KvStore, Versioned};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    value: String,
    version: u64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|t| t > now)
    }
}

#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left before `key` expires; `None` if absent, expired, or stored without expiry.
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.lock().ok()?;
        let now = Instant::now();
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|t| t.saturating_duration_since(now))
    }

    /// Live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        let now = Instant::now();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    fn get_now(&self, key: &str) -> anyhow::Result<Versioned> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("memory store lock poisoned: {}", e))?;
        let now = Instant::now();
        Ok(match entries.get(key) {
            Some(e) => Versioned {
                value: e.is_live(now).then(|| e.value.clone()),
                version: e.version,
            },
            None => Versioned::default(),
        })
    }

    fn cas_now(
        &self,
        key: &str,
        expected_version: u64,
        value: String,
        ttl: Option<Duration>,
    ) -> anyhow::Result<bool> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("memory store lock poisoned: {}", e))?;
        let current = entries.get(key).map_or(0, |e| e.version);
        if current != expected_version {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                version: current + 1,
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(true)
    }
}

impl KvStore for MemoryKv {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<Versioned>> {
        futures_util::future::ready(self.get_now(key)).boxed()
    }

    fn compare_and_set<'a>(
        &'a self,
        key: &'a str,
        expected_version: u64,
        value: String,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, anyhow::Result<bool>> {
        futures_util::future::ready(self.cas_now(key, expected_version, value, ttl)).boxed()
    }
}
