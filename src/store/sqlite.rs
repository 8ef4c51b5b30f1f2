// SQLite-backed KvStore. One row per key; expired rows are invisible to reads and purged periodically.

use super::{KvStore, Versioned};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub struct SqliteKv {
    pool: SqlitePool,
}

impl SqliteKv {
    pub async fn connect(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                version INTEGER NOT NULL,
                expires_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_kv_expires_at ON kv(expires_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(repo = "kv", operation = "get"))]
    async fn get_row(&self, key: &str) -> anyhow::Result<Versioned> {
        let row = sqlx::query("SELECT value, version, expires_at FROM kv WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(Versioned::default());
        };
        let value: String = row.try_get("value")?;
        let version: i64 = row.try_get("version")?;
        let expires_at: Option<i64> = row.try_get("expires_at")?;
        let live = expires_at.is_none_or(|t| t > now_ms());
        Ok(Versioned {
            value: live.then_some(value),
            version: version as u64,
        })
    }

    #[instrument(skip(self, value), fields(repo = "kv", operation = "compare_and_set"))]
    async fn cas_row(
        &self,
        key: &str,
        expected_version: u64,
        value: String,
        ttl: Option<Duration>,
    ) -> anyhow::Result<bool> {
        let expires_at = ttl.map(|t| now_ms() + t.as_millis() as i64);
        let r = if expected_version == 0 {
            sqlx::query(
                "INSERT INTO kv (key, value, version, expires_at) VALUES ($1, $2, 1, $3)
                 ON CONFLICT(key) DO NOTHING",
            )
            .bind(key)
            .bind(&value)
            .bind(expires_at)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                "UPDATE kv SET value = $1, version = version + 1, expires_at = $2
                 WHERE key = $3 AND version = $4",
            )
            .bind(&value)
            .bind(expires_at)
            .bind(key)
            .bind(expected_version as i64)
            .execute(&self.pool)
            .await?
        };
        Ok(r.rows_affected() == 1)
    }

    /// Deletes rows whose expiry has passed. Returns the number removed.
    #[instrument(skip(self), fields(repo = "kv", operation = "purge_expired"))]
    pub async fn purge_expired(&self) -> anyhow::Result<u64> {
        let r = sqlx::query("DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= $1")
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }
}

impl KvStore for SqliteKv {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<Versioned>> {
        self.get_row(key).boxed()
    }

    fn compare_and_set<'a>(
        &'a self,
        key: &'a str,
        expected_version: u64,
        value: String,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, anyhow::Result<bool>> {
        self.cas_row(key, expected_version, value, ttl).boxed()
    }
}

/// Spawns the background purge loop. Abort the handle to stop it.
pub fn spawn_purge(kv: Arc<SqliteKv>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            match kv.purge_expired().await {
                Ok(n) => debug!(operation = "purge_expired", purged = n, "expired keys purged"),
                Err(e) => warn!(error = %e, operation = "purge_expired", "purge failed"),
            }
        }
    })
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
