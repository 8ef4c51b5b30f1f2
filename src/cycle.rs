// One collection pass over every enabled category, in fixed order.
// Reader and store failures stay inside their category; the pass always completes.

use crate::config::CategoriesConfig;
use crate::error::{CollectError, Result};
use crate::models::{BucketKey, Category, StoreTag};
use crate::readers::{MetricReader, Reading, Sample};
use crate::store::DateBucketStore;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// What happened to one enabled category during a cycle.
#[derive(Debug)]
pub enum CategoryOutcome {
    /// Every record the reader produced was appended.
    Stored { records: usize },
    /// Some records were appended. `faults` lists the sub-metrics the reader could not
    /// produce and the records the store refused.
    Partial {
        records: usize,
        faults: Vec<CollectError>,
    },
    /// Nothing was appended for this category this cycle.
    Failed(CollectError),
}

impl CategoryOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, CategoryOutcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct CycleReport {
    /// UTC date shared by every bucket key written in this cycle.
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<(Category, CategoryOutcome)>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn outcome(&self, category: Category) -> Option<&CategoryOutcome> {
        self.outcomes
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, o)| o)
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failed()).count()
    }

    pub fn records_stored(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                CategoryOutcome::Stored { records } | CategoryOutcome::Partial { records, .. } => {
                    *records
                }
                CategoryOutcome::Failed(_) => 0,
            })
            .sum()
    }
}

pub struct CollectionCycle {
    host_id: String,
    enabled: CategoriesConfig,
    readers: Vec<Box<dyn MetricReader>>,
    store: DateBucketStore,
}

impl CollectionCycle {
    pub fn new(
        host_id: impl Into<String>,
        enabled: CategoriesConfig,
        store: DateBucketStore,
    ) -> Self {
        Self {
            host_id: host_id.into(),
            enabled,
            readers: Vec::new(),
            store,
        }
    }

    /// Registers a reader. A later reader for the same category replaces the earlier one.
    pub fn with_reader(mut self, reader: Box<dyn MetricReader>) -> Self {
        self.readers.retain(|r| r.category() != reader.category());
        self.readers.push(reader);
        self.readers.sort_by_key(|r| r.category());
        self
    }

    pub fn with_readers(self, readers: impl IntoIterator<Item = Box<dyn MetricReader>>) -> Self {
        readers.into_iter().fold(self, Self::with_reader)
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn store(&self) -> &DateBucketStore {
        &self.store
    }

    pub async fn run(&self) -> CycleReport {
        self.run_at(Utc::now()).await
    }

    /// Runs one pass as if it started at `started_at`; its UTC date keys every bucket.
    pub async fn run_at(&self, started_at: DateTime<Utc>) -> CycleReport {
        let clock = Instant::now();
        let date = started_at.date_naive();
        let mut outcomes = Vec::new();

        for category in Category::ALL {
            if !self.enabled.is_enabled(category) {
                continue;
            }
            let outcome = match self.collect(category, date, started_at).await {
                Ok(outcome) => outcome,
                Err(e) => CategoryOutcome::Failed(e),
            };
            log_outcome(category, &outcome);
            outcomes.push((category, outcome));
        }

        CycleReport {
            date,
            started_at,
            outcomes,
            elapsed: clock.elapsed(),
        }
    }

    async fn collect(
        &self,
        category: Category,
        date: NaiveDate,
        started_at: DateTime<Utc>,
    ) -> Result<CategoryOutcome> {
        let reader = self
            .readers
            .iter()
            .find(|r| r.category() == category)
            .ok_or_else(|| CollectError::unavailable(category, "no reader configured"))?;

        let Reading { sample, mut faults } = reader.read(started_at).await?;
        let Persisted { records, errors } = self.persist(date, sample).await;
        if records == 0 {
            if let Some(first) = errors.into_iter().next() {
                return Err(first);
            }
        } else {
            faults.extend(errors);
        }

        Ok(if faults.is_empty() {
            CategoryOutcome::Stored { records }
        } else {
            CategoryOutcome::Partial { records, faults }
        })
    }

    /// Appends every record of `sample`. Each record is written independently, so one
    /// refused write does not keep the category's other records out of the store.
    async fn persist(&self, date: NaiveDate, sample: Sample) -> Persisted {
        let mut persisted = Persisted::default();
        match sample {
            Sample::Cpu(s) => persisted.add(self.append(date, StoreTag::Cpu, &s).await),
            Sample::Memory(s) => persisted.add(self.append(date, StoreTag::Memory, &s).await),
            Sample::Disk(s) => persisted.add(self.append(date, StoreTag::Disk, &s).await),
            Sample::WebServer(s) => {
                persisted.add(self.append(date, StoreTag::Iis, &s.iis).await);
                if let Some(was) = &s.was {
                    persisted.add(self.append(date, StoreTag::Was, was).await);
                }
                persisted.add(self.append(date, StoreTag::Pool, &s.pool).await);
            }
            Sample::DatabaseEngine(s) => persisted.add(self.append(date, StoreTag::Sql, &s).await),
        }
        persisted
    }

    async fn append<T: Serialize + Sync>(
        &self,
        date: NaiveDate,
        tag: StoreTag,
        record: &T,
    ) -> Result<()> {
        let key = BucketKey::new(self.host_id.as_str(), date, tag);
        let len = self.store.append(&key, record).await?;
        debug!(key = %key, bucket_len = len, "sample appended");
        Ok(())
    }
}

#[derive(Default)]
struct Persisted {
    records: usize,
    errors: Vec<CollectError>,
}

impl Persisted {
    fn add(&mut self, result: Result<()>) {
        match result {
            Ok(()) => self.records += 1,
            Err(e) => self.errors.push(e),
        }
    }
}

fn log_outcome(category: Category, outcome: &CategoryOutcome) {
    match outcome {
        CategoryOutcome::Stored { .. } => {}
        CategoryOutcome::Partial { faults, .. } => {
            for fault in faults {
                warn!(category = %category, kind = fault.kind(), "{}", fault);
            }
        }
        CategoryOutcome::Failed(e) => {
            warn!(category = %category, kind = e.kind(), "{}", e);
        }
    }
}
