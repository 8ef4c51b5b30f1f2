// CollectionCycle tests: per-category isolation, toggles, evaluation order, partial readings, date stamping

mod common;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use common::{FakeReader, RecordingKv, capture_warnings};
use hostmon::config::CategoriesConfig;
use hostmon::cycle::{CategoryOutcome, CollectionCycle};
use hostmon::error::CollectError;
use hostmon::models::{Category, CpuSample, DailyBucket, HOST_REGISTRY_KEY};
use hostmon::readers::MetricReader;
use hostmon::store::DateBucketStore;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const HOST: &str = "web-01";

fn started_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 8, 30, 0).unwrap()
}

fn key(tag: &str) -> String {
    format!("{HOST}:20260314:{tag}")
}

fn all_ok_readers() -> Vec<FakeReader> {
    Category::ALL.into_iter().map(FakeReader::ok).collect()
}

fn cycle_with(
    kv: Arc<RecordingKv>,
    enabled: CategoriesConfig,
    readers: Vec<FakeReader>,
) -> CollectionCycle {
    CollectionCycle::new(HOST, enabled, DateBucketStore::new(kv, 7))
        .with_readers(readers.into_iter().map(FakeReader::boxed))
}

#[tokio::test]
async fn every_enabled_category_is_stored() {
    let kv = Arc::new(RecordingKv::new());
    let cycle = cycle_with(
        kv.clone(),
        CategoriesConfig::only(&Category::ALL),
        all_ok_readers(),
    );

    let report = cycle.run_at(started_at()).await;

    assert_eq!(report.date, NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
    assert_eq!(report.failed_count(), 0);
    assert_eq!(report.records_stored(), 7);
    assert_eq!(
        kv.written_keys(),
        vec![
            key("CPU"),
            key("DISK"),
            key("IIS"),
            key("MEMORY"),
            key("POOL"),
            key("SQL"),
            key("WAS"),
        ]
    );
    assert!(!kv.written_keys().contains(&HOST_REGISTRY_KEY.to_string()));
}

#[tokio::test]
async fn reader_failure_does_not_block_other_categories() {
    let kv = Arc::new(RecordingKv::new());
    let readers = vec![
        FakeReader::ok(Category::Cpu),
        FakeReader::failing(Category::Memory),
        FakeReader::ok(Category::Disk),
        FakeReader::failing(Category::WebServer),
        FakeReader::ok(Category::DatabaseEngine),
    ];
    let cycle = cycle_with(kv.clone(), CategoriesConfig::only(&Category::ALL), readers);

    let report = cycle.run_at(started_at()).await;

    assert_eq!(report.failed_count(), 2);
    assert!(matches!(
        report.outcome(Category::Memory),
        Some(CategoryOutcome::Failed(CollectError::ReaderUnavailable { .. }))
    ));
    assert!(matches!(
        report.outcome(Category::DatabaseEngine),
        Some(CategoryOutcome::Stored { records: 1 })
    ));
    assert_eq!(kv.writes_for(&key("CPU")), 1);
    assert_eq!(kv.writes_for(&key("DISK")), 1);
    assert_eq!(kv.writes_for(&key("SQL")), 1);
    assert_eq!(kv.writes_for(&key("MEMORY")), 0);
    assert_eq!(kv.writes_for(&key("IIS")), 0);
}

#[tokio::test]
async fn disabled_categories_are_never_read() {
    let kv = Arc::new(RecordingKv::new());
    let readers = all_ok_readers();
    let calls: Vec<_> = readers.iter().map(|r| (r.category(), r.calls())).collect();
    let cycle = cycle_with(
        kv.clone(),
        CategoriesConfig::only(&[Category::Cpu, Category::Disk]),
        readers,
    );

    let report = cycle.run_at(started_at()).await;

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(kv.written_keys(), vec![key("CPU"), key("DISK")]);
    assert_eq!(kv.writes_for(&key("CPU")), 1);
    assert_eq!(kv.writes_for(&key("DISK")), 1);
    for tag in ["MEMORY", "IIS", "WAS", "POOL", "SQL"] {
        assert_eq!(kv.gets_for(&key(tag)), 0, "{tag} should not be touched");
        assert_eq!(kv.writes_for(&key(tag)), 0, "{tag} should not be written");
    }
    for (category, count) in calls {
        let expected = usize::from(matches!(category, Category::Cpu | Category::Disk));
        assert_eq!(count.load(Ordering::SeqCst), expected, "{category}");
    }
}

#[tokio::test]
async fn store_failure_for_one_key_is_isolated_and_logged_once() {
    let kv = Arc::new(RecordingKv::failing_reads_for(":MEMORY"));
    let readers = all_ok_readers();
    let calls: Vec<_> = readers.iter().map(|r| r.calls()).collect();
    let cycle = cycle_with(kv.clone(), CategoriesConfig::only(&Category::ALL), readers);
    let (_guard, warnings) = capture_warnings();

    let report = cycle.run_at(started_at()).await;

    assert_eq!(*warnings.lock().unwrap(), vec!["Memory".to_string()]);

    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(report.failed_count(), 1);
    assert!(matches!(
        report.outcome(Category::Memory),
        Some(CategoryOutcome::Failed(CollectError::StoreUnreachable { .. }))
    ));
    for count in calls {
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
    for tag in ["CPU", "DISK", "IIS", "WAS", "POOL", "SQL"] {
        assert_eq!(kv.writes_for(&key(tag)), 1, "{tag}");
    }
    assert_eq!(kv.writes_for(&key("MEMORY")), 0);
}

#[tokio::test]
async fn categories_run_in_fixed_order() {
    let kv = Arc::new(RecordingKv::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    // Registered out of order on purpose.
    let readers = vec![
        FakeReader::ok(Category::DatabaseEngine).with_order_log(log.clone()),
        FakeReader::ok(Category::Disk).with_order_log(log.clone()),
        FakeReader::ok(Category::Cpu).with_order_log(log.clone()),
        FakeReader::ok(Category::WebServer).with_order_log(log.clone()),
        FakeReader::ok(Category::Memory).with_order_log(log.clone()),
    ];
    let cycle = cycle_with(kv, CategoriesConfig::only(&Category::ALL), readers);

    let report = cycle.run_at(started_at()).await;

    assert_eq!(*log.lock().unwrap(), Category::ALL.to_vec());
    let order: Vec<Category> = report.outcomes.iter().map(|(c, _)| *c).collect();
    assert_eq!(order, Category::ALL.to_vec());
}

#[tokio::test]
async fn failed_health_ping_only_drops_the_was_record() {
    let kv = Arc::new(RecordingKv::new());
    let cycle = cycle_with(
        kv.clone(),
        CategoriesConfig::only(&[Category::WebServer]),
        vec![FakeReader::web_without_health_ping()],
    );

    let report = cycle.run_at(started_at()).await;

    match report.outcome(Category::WebServer) {
        Some(CategoryOutcome::Partial { records, faults }) => {
            assert_eq!(*records, 2);
            assert_eq!(faults.len(), 1);
            assert_eq!(faults[0].kind(), "reader_partial");
        }
        other => panic!("expected partial outcome, got {other:?}"),
    }
    assert_eq!(report.failed_count(), 0);
    assert_eq!(kv.written_keys(), vec![key("IIS"), key("POOL")]);
}

#[tokio::test]
async fn enabled_category_without_reader_fails_alone() {
    let kv = Arc::new(RecordingKv::new());
    let cycle = cycle_with(
        kv.clone(),
        CategoriesConfig::only(&[Category::Cpu, Category::Memory]),
        vec![FakeReader::ok(Category::Cpu)],
    );

    let report = cycle.run_at(started_at()).await;

    assert!(matches!(
        report.outcome(Category::Memory),
        Some(CategoryOutcome::Failed(CollectError::ReaderUnavailable { .. }))
    ));
    assert_eq!(kv.written_keys(), vec![key("CPU")]);
}

#[tokio::test(start_paused = true)]
async fn cycle_straddling_midnight_keeps_its_start_date() {
    let kv = Arc::new(RecordingKv::new());
    let readers = vec![
        FakeReader::ok(Category::Cpu).with_delay(Duration::from_secs(2)),
        FakeReader::ok(Category::Memory).with_delay(Duration::from_secs(2)),
    ];
    let cycle = cycle_with(
        kv.clone(),
        CategoriesConfig::only(&[Category::Cpu, Category::Memory]),
        readers,
    );
    let just_before_midnight = Utc.with_ymd_and_hms(2026, 3, 14, 23, 59, 59).unwrap();

    let report = cycle.run_at(just_before_midnight).await;

    assert!(report.elapsed >= Duration::from_secs(4));
    assert_eq!(kv.written_keys(), vec![key("CPU"), key("MEMORY")]);

    let bucket: DailyBucket<CpuSample> = cycle
        .store()
        .load(&hostmon::models::BucketKey::new(
            HOST,
            report.date,
            hostmon::models::StoreTag::Cpu,
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bucket.samples[0].time, just_before_midnight);
}

#[tokio::test]
async fn next_day_cycle_writes_new_keys() {
    let kv = Arc::new(RecordingKv::new());
    let cycle = cycle_with(
        kv.clone(),
        CategoriesConfig::only(&[Category::Cpu]),
        vec![FakeReader::ok(Category::Cpu)],
    );

    cycle.run_at(started_at()).await;
    cycle.run_at(started_at()).await;
    cycle
        .run_at(Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 1).unwrap())
        .await;

    assert_eq!(
        kv.written_keys(),
        vec![key("CPU"), format!("{HOST}:20260315:CPU")]
    );
    assert_eq!(kv.writes_for(&key("CPU")), 2);
}

#[tokio::test]
async fn refused_was_write_keeps_iis_and_pool() {
    let kv = Arc::new(RecordingKv::failing_reads_for(":WAS"));
    let cycle = cycle_with(
        kv.clone(),
        CategoriesConfig::only(&[Category::WebServer]),
        vec![FakeReader::ok(Category::WebServer)],
    );
    let (_guard, warnings) = capture_warnings();

    let report = cycle.run_at(started_at()).await;

    match report.outcome(Category::WebServer) {
        Some(CategoryOutcome::Partial { records, faults }) => {
            assert_eq!(*records, 2);
            assert_eq!(faults.len(), 1);
            assert_eq!(faults[0].kind(), "store_unreachable");
        }
        other => panic!("expected partial outcome, got {other:?}"),
    }
    assert_eq!(report.failed_count(), 0);
    assert_eq!(report.records_stored(), 2);
    assert_eq!(kv.writes_for(&key("IIS")), 1);
    assert_eq!(kv.writes_for(&key("POOL")), 1);
    assert_eq!(kv.writes_for(&key("WAS")), 0);
    assert_eq!(*warnings.lock().unwrap(), vec!["Web Server".to_string()]);
}

#[tokio::test]
async fn web_category_fails_only_when_no_record_lands() {
    // An empty suffix matches every key.
    let kv = Arc::new(RecordingKv::failing_reads_for(""));
    let cycle = cycle_with(
        kv.clone(),
        CategoriesConfig::only(&[Category::WebServer]),
        vec![FakeReader::ok(Category::WebServer)],
    );

    let report = cycle.run_at(started_at()).await;

    assert!(matches!(
        report.outcome(Category::WebServer),
        Some(CategoryOutcome::Failed(CollectError::StoreUnreachable { .. }))
    ));
    assert_eq!(report.records_stored(), 0);
    assert_eq!(kv.gets_for(&key("IIS")), 1);
    assert_eq!(kv.gets_for(&key("WAS")), 1);
    assert_eq!(kv.gets_for(&key("POOL")), 1);
    assert!(kv.written_keys().is_empty());
}
