use anyhow::Result;
use hostmon::config::{AppConfig, StoreBackend};
use hostmon::counters::FsCounters;
use hostmon::cycle::CollectionCycle;
use hostmon::store::{DateBucketStore, KvStore, MemoryKv, SqliteKv};
use hostmon::{readers, scheduler, store};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    tracing::info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        "starting"
    );

    let app_config = AppConfig::load()?;

    let mut purge_handle = None;
    let kv: Arc<dyn KvStore> = match app_config.store.backend {
        StoreBackend::Sqlite => {
            let kv = Arc::new(SqliteKv::connect(&app_config.store.path).await?);
            kv.init().await?;
            purge_handle = Some(store::spawn_purge(
                kv.clone(),
                Duration::from_secs(app_config.store.purge_interval_secs),
            ));
            kv
        }
        StoreBackend::Memory => {
            tracing::warn!("memory store backend selected; buckets are lost on exit");
            Arc::new(MemoryKv::new())
        }
    };
    let bucket_store = DateBucketStore::new(kv, app_config.monitor.retention_days)
        .with_max_attempts(app_config.store.max_append_attempts);

    let counters = Arc::new(FsCounters::new(&app_config.counters.root));
    let cycle = CollectionCycle::new(
        app_config.monitor.host_id.trim(),
        app_config.categories.clone(),
        bucket_store,
    )
    .with_readers(readers::build(&app_config, counters));

    tracing::info!(
        host_id = cycle.host_id(),
        cycle_period_secs = app_config.monitor.cycle_period_secs,
        retention_days = app_config.monitor.retention_days,
        categories = ?app_config.categories,
        "collector configured"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let scheduler_handle = scheduler::spawn(
        cycle,
        scheduler::SchedulerConfig {
            cycle_period: app_config.cycle_period(),
        },
        shutdown_rx,
    );

    wait_for_signal().await;
    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(());
    let cycles = scheduler_handle.await?;
    if let Some(handle) = purge_handle {
        handle.abort();
    }
    tracing::info!(cycles, "stopped");

    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
