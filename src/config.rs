use crate::models::Category;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub categories: CategoriesConfig,
    #[serde(default)]
    pub counters: CountersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Namespace of every bucket key written by this process.
    pub host_id: String,
    pub cycle_period_secs: u64,
    pub retention_days: u32,
    /// Warm-up settle delay between the discarded and the reported counter read.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub memory_settle_ms: u64,
}

fn default_settle_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    /// Process-local; nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_max_append_attempts")]
    pub max_append_attempts: u32,
    /// How often expired keys are deleted from the SQLite backend.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Sqlite
}

fn default_max_append_attempts() -> u32 {
    crate::store::DEFAULT_MAX_APPEND_ATTEMPTS
}

fn default_purge_interval_secs() -> u64 {
    3600
}

/// Per-category toggles. Operating-system categories default on, application ones off.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoriesConfig {
    #[serde(default = "enabled")]
    pub cpu: bool,
    #[serde(default = "enabled")]
    pub memory: bool,
    #[serde(default = "enabled")]
    pub disk: bool,
    #[serde(default)]
    pub web: bool,
    #[serde(default)]
    pub sql: bool,
}

fn enabled() -> bool {
    true
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            cpu: true,
            memory: true,
            disk: true,
            web: false,
            sql: false,
        }
    }
}

impl CategoriesConfig {
    /// Only the listed categories enabled.
    pub fn only(categories: &[Category]) -> Self {
        Self {
            cpu: categories.contains(&Category::Cpu),
            memory: categories.contains(&Category::Memory),
            disk: categories.contains(&Category::Disk),
            web: categories.contains(&Category::WebServer),
            sql: categories.contains(&Category::DatabaseEngine),
        }
    }

    pub fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::Cpu => self.cpu,
            Category::Memory => self.memory,
            Category::Disk => self.disk,
            Category::WebServer => self.web,
            Category::DatabaseEngine => self.sql,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountersConfig {
    /// Directory holding exported counter files.
    #[serde(default = "default_counters_root")]
    pub root: String,
    /// Web site / application pool instance name.
    #[serde(default = "default_web_instance")]
    pub web_instance: String,
    /// Performance object prefix of the database engine instance.
    #[serde(default = "default_sql_object_prefix")]
    pub sql_object_prefix: String,
}

fn default_counters_root() -> String {
    "/var/lib/hostmon/counters".into()
}

fn default_web_instance() -> String {
    "_Total".into()
}

fn default_sql_object_prefix() -> String {
    "SQLServer".into()
}

impl Default for CountersConfig {
    fn default() -> Self {
        Self {
            root: default_counters_root(),
            web_instance: default_web_instance(),
            sql_object_prefix: default_sql_object_prefix(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn cycle_period(&self) -> Duration {
        Duration::from_secs(self.monitor.cycle_period_secs)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let host_id = self.monitor.host_id.trim();
        anyhow::ensure!(!host_id.is_empty(), "monitor.host_id must be non-empty");
        anyhow::ensure!(
            !host_id.contains(':'),
            "monitor.host_id must not contain ':', got {:?}",
            self.monitor.host_id
        );
        anyhow::ensure!(
            self.monitor.cycle_period_secs > 0,
            "monitor.cycle_period_secs must be > 0, got {}",
            self.monitor.cycle_period_secs
        );
        anyhow::ensure!(
            self.monitor.retention_days > 0,
            "monitor.retention_days must be > 0, got {}",
            self.monitor.retention_days
        );
        anyhow::ensure!(
            self.monitor.settle_ms <= 10_000,
            "monitor.settle_ms must be <= 10000, got {}",
            self.monitor.settle_ms
        );
        anyhow::ensure!(
            self.monitor.memory_settle_ms <= 10_000,
            "monitor.memory_settle_ms must be <= 10000, got {}",
            self.monitor.memory_settle_ms
        );
        if self.store.backend == StoreBackend::Sqlite {
            anyhow::ensure!(
                !self.store.path.is_empty(),
                "store.path must be non-empty for the sqlite backend"
            );
        }
        anyhow::ensure!(
            self.store.max_append_attempts > 0,
            "store.max_append_attempts must be > 0, got {}",
            self.store.max_append_attempts
        );
        anyhow::ensure!(
            self.store.purge_interval_secs > 0,
            "store.purge_interval_secs must be > 0, got {}",
            self.store.purge_interval_secs
        );
        if self.categories.web || self.categories.sql {
            anyhow::ensure!(
                !self.counters.root.is_empty(),
                "counters.root must be non-empty when web or sql monitoring is enabled"
            );
        }
        if self.categories.web {
            anyhow::ensure!(
                !self.counters.web_instance.is_empty(),
                "counters.web_instance must be non-empty when web monitoring is enabled"
            );
        }
        if self.categories.sql {
            anyhow::ensure!(
                !self.counters.sql_object_prefix.is_empty(),
                "counters.sql_object_prefix must be non-empty when sql monitoring is enabled"
            );
        }
        Ok(())
    }
}
