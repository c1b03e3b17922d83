//! Batched bulk insertion of enriched prompts.
//!
//! The [`Batcher`] accumulates records and submits a bulk insert whenever
//! the buffer reaches the batch size, plus once more for the remainder at
//! [`Batcher::finish`]. The buffer is cleared after every flush whether the
//! insert succeeded or not. Failed batches are logged and skipped, never
//! retried.

mod store;

use promptlib_shared::{EnrichedPrompt, PromptlibError, Result};
use tracing::{error, info};

pub use store::{SupabaseStore, TableStore};

/// Counters accumulated across flushes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub batches_ok: usize,
    pub batches_failed: usize,
    pub inserted: usize,
}

/// Result of one flush. `K` is a caller-chosen tag carried with each record
/// (the ledger fingerprint in the pipeline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flush<K> {
    /// The store accepted the batch; the tags of its records.
    Inserted(Vec<K>),
    /// The store rejected the batch, which is dropped.
    Failed {
        /// Input position of the record that triggered the flush.
        trigger: usize,
        size: usize,
        message: String,
    },
}

/// Size-bounded insert buffer over a [`TableStore`].
pub struct Batcher<'s, S, K = ()> {
    store: &'s S,
    batch_size: usize,
    records: Vec<EnrichedPrompt>,
    tags: Vec<K>,
    stats: LoadStats,
}

impl<'s, S: TableStore, K> Batcher<'s, S, K> {
    /// Fails with a config error when `batch_size` is zero.
    pub fn new(store: &'s S, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(PromptlibError::config("batch size must be at least 1"));
        }
        Ok(Self {
            store,
            batch_size,
            records: Vec::with_capacity(batch_size),
            tags: Vec::with_capacity(batch_size),
            stats: LoadStats::default(),
        })
    }

    pub fn pending(&self) -> usize {
        self.records.len()
    }

    /// Buffer one record seen at input `position`, flushing if full.
    pub async fn push(
        &mut self,
        position: usize,
        record: EnrichedPrompt,
        tag: K,
    ) -> Option<Flush<K>> {
        self.records.push(record);
        self.tags.push(tag);
        if self.records.len() >= self.batch_size {
            Some(self.flush(position).await)
        } else {
            None
        }
    }

    /// Flush the remainder. `last_position` is the input position of the
    /// final record seen.
    pub async fn finish(mut self, last_position: usize) -> (LoadStats, Option<Flush<K>>) {
        let tail = if self.records.is_empty() {
            None
        } else {
            Some(self.flush(last_position).await)
        };
        (self.stats, tail)
    }

    async fn flush(&mut self, trigger: usize) -> Flush<K> {
        let size = self.records.len();
        let outcome = self.store.insert_batch(&self.records).await;
        self.records.clear();
        let tags = std::mem::take(&mut self.tags);

        match outcome {
            Ok(()) => {
                self.stats.batches_ok += 1;
                self.stats.inserted += size;
                info!(size, "inserted batch");
                Flush::Inserted(tags)
            }
            Err(e) => {
                self.stats.batches_failed += 1;
                error!(index = trigger, size, error = %e, "error inserting batch");
                Flush::Failed {
                    trigger,
                    size,
                    message: e.to_string(),
                }
            }
        }
    }
}

/// Insert `records` in batches, continuing past failed batches.
pub async fn load_all<S: TableStore>(
    store: &S,
    records: Vec<EnrichedPrompt>,
    batch_size: usize,
) -> Result<LoadStats> {
    let mut batcher: Batcher<'_, S> = Batcher::new(store, batch_size)?;
    let mut last = 0;
    for (position, record) in records.into_iter().enumerate() {
        last = position;
        batcher.push(position, record, ()).await;
    }
    let (stats, _) = batcher.finish(last).await;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use promptlib_shared::Area;

    use super::*;

    /// Records batch sizes; fails the batches whose ordinal is listed.
    #[derive(Default)]
    struct FakeStore {
        batches: Mutex<Vec<Vec<String>>>,
        fail_on: Vec<usize>,
    }

    impl TableStore for FakeStore {
        async fn insert_batch(&self, records: &[EnrichedPrompt]) -> Result<()> {
            let mut batches = self.batches.lock().unwrap();
            let ordinal = batches.len();
            batches.push(records.iter().map(|r| r.title.clone()).collect());
            if self.fail_on.contains(&ordinal) {
                Err(PromptlibError::Store {
                    status: 500,
                    body: "boom".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn record(n: usize) -> EnrichedPrompt {
        EnrichedPrompt {
            id: format!("id-{n}"),
            title: format!("r{n}"),
            content_es: format!("contenido {n}"),
            content_en: format!("content {n}"),
            tags: Vec::new(),
            tags_en: Vec::new(),
            category: "General".into(),
            subcategory: String::new(),
            origin: "internet".into(),
            rating: 0,
            apps: Vec::new(),
            area: Area::Image,
            last_modified: 0,
        }
    }

    fn records(n: usize) -> Vec<EnrichedPrompt> {
        (0..n).map(record).collect()
    }

    #[tokio::test]
    async fn full_batches_and_remainder() {
        let store = FakeStore::default();
        let stats = load_all(&store, records(45), 20).await.expect("load");

        let sizes: Vec<usize> = store.batches.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
        assert_eq!(
            stats,
            LoadStats {
                batches_ok: 3,
                batches_failed: 0,
                inserted: 45
            }
        );
    }

    #[tokio::test]
    async fn exact_multiple_has_no_empty_tail() {
        let store = FakeStore::default();
        load_all(&store, records(40), 20).await.unwrap();
        assert_eq!(store.batches.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_input_inserts_nothing() {
        let store = FakeStore::default();
        let stats = load_all(&store, Vec::new(), 20).await.unwrap();
        assert!(store.batches.lock().unwrap().is_empty());
        assert_eq!(stats, LoadStats::default());
    }

    #[tokio::test]
    async fn failed_batch_is_dropped_and_run_continues() {
        let store = FakeStore {
            fail_on: vec![0],
            ..FakeStore::default()
        };
        let stats = load_all(&store, records(30), 20).await.unwrap();

        let batches = store.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        // second batch starts right after the dropped one
        assert_eq!(batches[1].first().map(String::as_str), Some("r20"));
        assert_eq!(stats.batches_failed, 1);
        assert_eq!(stats.batches_ok, 1);
        assert_eq!(stats.inserted, 10);
    }

    #[tokio::test]
    async fn flush_reports_trigger_and_tags() {
        let store = FakeStore {
            fail_on: vec![1],
            ..FakeStore::default()
        };
        let mut batcher = Batcher::new(&store, 2).unwrap();

        assert_eq!(batcher.push(0, record(0), "a").await, None);
        assert_eq!(batcher.pending(), 1);
        assert_eq!(
            batcher.push(1, record(1), "b").await,
            Some(Flush::Inserted(vec!["a", "b"]))
        );
        assert_eq!(batcher.pending(), 0);
        batcher.push(2, record(2), "c").await;

        match batcher.push(3, record(3), "d").await {
            Some(Flush::Failed { trigger, size, .. }) => {
                assert_eq!(trigger, 3);
                assert_eq!(size, 2);
            }
            other => panic!("expected failed flush, got {other:?}"),
        }
        assert_eq!(batcher.pending(), 0);

        batcher.push(4, record(4), "e").await;
        let (stats, tail) = batcher.finish(4).await;
        assert_eq!(tail, Some(Flush::Inserted(vec!["e"])));
        assert_eq!(stats.inserted, 3);
    }

    #[tokio::test]
    async fn batch_size_one_flushes_every_record() {
        let store = FakeStore::default();
        load_all(&store, records(3), 1).await.unwrap();
        assert_eq!(store.batches.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn zero_batch_size_is_config_error() {
        let store = FakeStore::default();
        let err = load_all(&store, records(3), 0).await.expect_err("zero");
        assert!(matches!(err, PromptlibError::Config { .. }));
        assert!(store.batches.lock().unwrap().is_empty());
    }
}
