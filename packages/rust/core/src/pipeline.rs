//! Stage orchestration: extract, enrich, load, and the fused import run.
//!
//! Records are processed strictly in order. The only suspensions are the
//! pacing sleep between generator calls and the awaited HTTP requests.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use promptlib_enrich::{Enricher, SuggestionSource, TextGenerator};
use promptlib_extract::ExtractOptions;
use promptlib_loader::{Batcher, Flush, LoadStats, TableStore};
use promptlib_shared::{EnrichedPrompt, RawPrompt, Result};
use promptlib_storage::{Ledger, LedgerEntry, Stage, import_fingerprint, load_fingerprint};

use crate::artifacts;

/// Counters for one run, printed by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Input records read.
    pub seen: usize,
    /// Records skipped because the ledger already holds them.
    pub skipped: usize,
    /// Records enriched with AI data.
    pub enriched: usize,
    /// Records that fell back to default values.
    pub fallbacks: usize,
    pub batches_ok: usize,
    pub batches_failed: usize,
    /// Records the store accepted.
    pub inserted: usize,
    pub elapsed: Duration,
}

impl RunReport {
    fn absorb(&mut self, stats: LoadStats) {
        self.batches_ok = stats.batches_ok;
        self.batches_failed = stats.batches_failed;
        self.inserted = stats.inserted;
    }

    fn count(&mut self, source: SuggestionSource) {
        match source {
            SuggestionSource::Ai => self.enriched += 1,
            SuggestionSource::Fallback(_) => self.fallbacks += 1,
        }
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each input record is handled.
    fn record(&self, current: usize, total: usize, detail: &str);
    /// Called when the run completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn record(&self, _current: usize, _total: usize, _detail: &str) {}
    fn done(&self, _report: &RunReport) {}
}

/// Sleeps `delay` before every generator call except the first.
struct Pacer {
    delay: Duration,
    called: bool,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            called: false,
        }
    }

    async fn wait(&mut self) {
        if self.called && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.called = true;
    }
}

/// Options shared by the enrich and import runs.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub batch_size: usize,
    pub delay: Duration,
}

// ---------------------------------------------------------------------------
// extract
// ---------------------------------------------------------------------------

/// Extract prompts from `document` and write them to `output`.
#[instrument(skip_all, fields(document = %document.display()))]
pub fn extract(
    document: &Path,
    output: &Path,
    opts: &ExtractOptions,
    progress: &dyn ProgressReporter,
) -> Result<Vec<RawPrompt>> {
    let start = Instant::now();
    progress.phase("Extracting prompts");

    let prompts = promptlib_extract::extract_from_path(document, opts)?;
    artifacts::write_json_array(output, &prompts)?;

    let report = RunReport {
        seen: prompts.len(),
        elapsed: start.elapsed(),
        ..RunReport::default()
    };
    info!(count = prompts.len(), output = %output.display(), "wrote raw prompts");
    progress.done(&report);
    Ok(prompts)
}

// ---------------------------------------------------------------------------
// enrich
// ---------------------------------------------------------------------------

/// Enrich every record, pacing generator calls by `delay`.
#[instrument(skip_all, fields(records = raws.len()))]
pub async fn enrich_all<G: TextGenerator>(
    enricher: &Enricher<G>,
    raws: &[RawPrompt],
    delay: Duration,
    progress: &dyn ProgressReporter,
) -> (Vec<EnrichedPrompt>, RunReport) {
    let start = Instant::now();
    let mut report = RunReport::default();
    let mut pacer = Pacer::new(delay);
    let mut out = Vec::with_capacity(raws.len());
    let total = raws.len();

    progress.phase("Enriching prompts");
    for (i, raw) in raws.iter().enumerate() {
        report.seen += 1;
        pacer.wait().await;
        let enrichment = enricher.enrich(raw).await;
        report.count(enrichment.source);
        progress.record(i + 1, total, &enrichment.prompt.title);
        out.push(enrichment.prompt);
    }

    report.elapsed = start.elapsed();
    info!(
        enriched = report.enriched,
        fallbacks = report.fallbacks,
        "enrichment complete"
    );
    progress.done(&report);
    (out, report)
}

// ---------------------------------------------------------------------------
// load
// ---------------------------------------------------------------------------

/// Bulk-insert enriched records, skipping those already in `ledger`.
#[instrument(skip_all, fields(records = records.len(), batch_size = batch_size))]
pub async fn load<S: TableStore>(
    store: &S,
    records: Vec<EnrichedPrompt>,
    batch_size: usize,
    ledger: Option<&Ledger>,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut batcher: Batcher<'_, S, LedgerEntry> = Batcher::new(store, batch_size)?;
    let mut report = RunReport::default();
    let total = records.len();
    let mut last = 0;

    progress.phase("Loading prompts");
    for (position, record) in records.into_iter().enumerate() {
        report.seen += 1;
        last = position;

        let fingerprint = load_fingerprint(&record);
        if is_recorded(ledger, &fingerprint).await? {
            report.skipped += 1;
            progress.record(position + 1, total, "skipped");
            continue;
        }

        let entry = LedgerEntry {
            fingerprint,
            record_id: record.id.clone(),
        };
        progress.record(position + 1, total, &record.title);
        if let Some(flush) = batcher.push(position, record, entry).await {
            commit(ledger, Stage::Load, flush).await?;
        }
    }

    let (stats, tail) = batcher.finish(last).await;
    if let Some(flush) = tail {
        commit(ledger, Stage::Load, flush).await?;
    }

    report.absorb(stats);
    report.elapsed = start.elapsed();
    info!(
        inserted = report.inserted,
        skipped = report.skipped,
        failed_batches = report.batches_failed,
        "load complete"
    );
    progress.done(&report);
    Ok(report)
}

// ---------------------------------------------------------------------------
// import (enrich + load, fused)
// ---------------------------------------------------------------------------

/// Enrich and insert record by record.
///
/// Records already in `ledger` are skipped before any generator call.
/// Ledger entries are written only after their batch is accepted.
#[instrument(skip_all, fields(records = raws.len(), batch_size = opts.batch_size))]
pub async fn import<G: TextGenerator, S: TableStore>(
    enricher: &Enricher<G>,
    store: &S,
    raws: &[RawPrompt],
    opts: RunOptions,
    ledger: Option<&Ledger>,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut batcher: Batcher<'_, S, LedgerEntry> = Batcher::new(store, opts.batch_size)?;
    let mut report = RunReport::default();
    let mut pacer = Pacer::new(opts.delay);
    let total = raws.len();
    let mut last = 0;

    info!(total, "importing prompts");
    progress.phase("Importing prompts");

    for (position, raw) in raws.iter().enumerate() {
        report.seen += 1;
        last = position;

        let fingerprint = import_fingerprint(raw);
        if is_recorded(ledger, &fingerprint).await? {
            report.skipped += 1;
            progress.record(position + 1, total, "skipped");
            continue;
        }

        pacer.wait().await;
        let enrichment = enricher.enrich(raw).await;
        report.count(enrichment.source);
        progress.record(position + 1, total, &enrichment.prompt.title);

        let entry = LedgerEntry {
            fingerprint,
            record_id: enrichment.prompt.id.clone(),
        };
        if let Some(flush) = batcher.push(position, enrichment.prompt, entry).await {
            commit(ledger, Stage::Import, flush).await?;
        }
    }

    let (stats, tail) = batcher.finish(last).await;
    if let Some(flush) = tail {
        commit(ledger, Stage::Import, flush).await?;
    }

    report.absorb(stats);
    report.elapsed = start.elapsed();
    info!(
        inserted = report.inserted,
        skipped = report.skipped,
        enriched = report.enriched,
        fallbacks = report.fallbacks,
        failed_batches = report.batches_failed,
        "import complete"
    );
    progress.done(&report);
    Ok(report)
}

async fn is_recorded(ledger: Option<&Ledger>, fingerprint: &str) -> Result<bool> {
    match ledger {
        Some(ledger) => ledger.contains(fingerprint).await,
        None => Ok(false),
    }
}

async fn commit(ledger: Option<&Ledger>, stage: Stage, flush: Flush<LedgerEntry>) -> Result<()> {
    match (ledger, flush) {
        (Some(ledger), Flush::Inserted(entries)) => ledger.record_inserted(stage, &entries).await,
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use promptlib_enrich::GenerateError;
    use promptlib_shared::{PromptlibError, Taxonomy};
    use uuid::Uuid;

    use super::*;

    /// Answers with a translation derived from the instruction.
    #[derive(Default)]
    struct EchoGenerator {
        calls: Mutex<usize>,
        fail_every: Option<usize>,
    }

    impl TextGenerator for EchoGenerator {
        fn model_id(&self) -> &str {
            "echo"
        }

        async fn generate(&self, _instruction: &str) -> std::result::Result<String, GenerateError> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            match self.fail_every {
                Some(k) if n % k == 0 => Err(GenerateError::Api {
                    status: 500,
                    message: "internal".into(),
                }),
                _ => Ok(format!(
                    r#"{{"translation":"t{n}","tags_es":["a"],"tags_en":["b"],"category":"Render"}}"#
                )),
            }
        }
    }

    /// Stores every accepted batch; rejects the batch ordinals in `fail_on`.
    #[derive(Default)]
    struct MemoryStore {
        batches: Mutex<Vec<Vec<EnrichedPrompt>>>,
        attempts: Mutex<usize>,
        fail_on: Vec<usize>,
    }

    impl MemoryStore {
        fn failing(fail_on: Vec<usize>) -> Self {
            Self {
                fail_on,
                ..Self::default()
            }
        }

        fn rows(&self) -> Vec<EnrichedPrompt> {
            self.batches.lock().unwrap().iter().flatten().cloned().collect()
        }
    }

    impl TableStore for MemoryStore {
        async fn insert_batch(&self, records: &[EnrichedPrompt]) -> Result<()> {
            let ordinal = {
                let mut attempts = self.attempts.lock().unwrap();
                *attempts += 1;
                *attempts - 1
            };
            if self.fail_on.contains(&ordinal) {
                return Err(PromptlibError::Store {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            self.batches.lock().unwrap().push(records.to_vec());
            Ok(())
        }
    }

    fn raws(n: u64) -> Vec<RawPrompt> {
        (1..=n)
            .map(|i| RawPrompt::new("Render", i, format!("Prompt número {i}")))
            .collect()
    }

    fn opts(batch_size: usize) -> RunOptions {
        RunOptions {
            batch_size,
            delay: Duration::ZERO,
        }
    }

    async fn temp_ledger() -> Ledger {
        let path = std::env::temp_dir().join(format!("promptlib_pipeline_{}.db", Uuid::now_v7()));
        Ledger::open(&path).await.expect("open ledger")
    }

    #[tokio::test]
    async fn import_enriches_and_batches() {
        let enricher = Enricher::new(EchoGenerator::default(), Taxonomy::default());
        let store = MemoryStore::default();

        let report = import(&enricher, &store, &raws(5), opts(2), None, &SilentProgress)
            .await
            .expect("import");

        assert_eq!(report.seen, 5);
        assert_eq!(report.enriched, 5);
        assert_eq!(report.batches_ok, 3);
        assert_eq!(report.inserted, 5);

        let sizes: Vec<usize> = store.batches.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);

        let rows = store.rows();
        assert_eq!(rows[0].content_en, "t1");
        assert_eq!(rows[0].category, "Render y Edición de Imagen");
        assert_eq!(rows[4].content_es, "Prompt número 5");
    }

    #[tokio::test]
    async fn generator_failures_become_fallbacks() {
        let enricher = Enricher::new(
            EchoGenerator {
                fail_every: Some(2),
                ..EchoGenerator::default()
            },
            Taxonomy::default(),
        );
        let store = MemoryStore::default();

        let report = import(&enricher, &store, &raws(4), opts(20), None, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.enriched, 2);
        assert_eq!(report.fallbacks, 2);
        assert_eq!(report.inserted, 4);
        let rows = store.rows();
        assert_eq!(rows[1].content_en, rows[1].content_es);
        assert!(rows[1].tags.is_empty());
    }

    #[tokio::test]
    async fn failed_batch_does_not_abort_import() {
        let enricher = Enricher::new(EchoGenerator::default(), Taxonomy::default());
        let store = MemoryStore::failing(vec![0]);

        let report = import(&enricher, &store, &raws(5), opts(2), None, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.batches_failed, 1);
        assert_eq!(report.batches_ok, 2);
        assert_eq!(report.inserted, 3);
        assert_eq!(store.rows()[0].content_es, "Prompt número 3");
    }

    #[tokio::test]
    async fn zero_batch_size_fails_before_any_call() {
        let enricher = Enricher::new(EchoGenerator::default(), Taxonomy::default());
        let store = MemoryStore::default();

        let err = import(&enricher, &store, &raws(3), opts(0), None, &SilentProgress)
            .await
            .expect_err("zero batch");
        assert!(matches!(err, PromptlibError::Config { .. }));
        assert_eq!(*enricher.generator().calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn ledger_makes_reruns_skip_inserted_records() {
        let ledger = temp_ledger().await;
        let store = MemoryStore::failing(vec![1]);
        let enricher = Enricher::new(EchoGenerator::default(), Taxonomy::default());
        let input = raws(4);

        let first = import(&enricher, &store, &input, opts(2), Some(&ledger), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.batches_failed, 1);

        let rerun_enricher = Enricher::new(EchoGenerator::default(), Taxonomy::default());
        let second = import(
            &rerun_enricher,
            &store,
            &input,
            opts(2),
            Some(&ledger),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(second.skipped, 2);
        assert_eq!(second.inserted, 2);
        assert_eq!(*rerun_enricher.generator().calls.lock().unwrap(), 2);

        let contents: Vec<String> = store.rows().into_iter().map(|r| r.content_es).collect();
        assert_eq!(
            contents,
            vec![
                "Prompt número 1",
                "Prompt número 2",
                "Prompt número 3",
                "Prompt número 4"
            ]
        );
    }

    #[tokio::test]
    async fn load_skips_ledgered_records() {
        let ledger = temp_ledger().await;
        let enricher = Enricher::new(EchoGenerator::default(), Taxonomy::default());
        let (records, _) = enrich_all(&enricher, &raws(3), Duration::ZERO, &SilentProgress).await;

        let store = MemoryStore::default();
        let first = load(&store, records.clone(), 20, Some(&ledger), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(first.inserted, 3);

        let second = load(&store, records, 20, Some(&ledger), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(second.skipped, 3);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.batches_ok, 0);
        assert_eq!(store.rows().len(), 3);
    }

    #[tokio::test]
    async fn load_without_ledger_inserts_everything() {
        let enricher = Enricher::new(EchoGenerator::default(), Taxonomy::default());
        let (records, report) =
            enrich_all(&enricher, &raws(3), Duration::ZERO, &SilentProgress).await;
        assert_eq!(report.enriched, 3);

        let store = MemoryStore::default();
        let report = load(&store, records, 2, None, &SilentProgress).await.unwrap();
        assert_eq!(report.inserted, 3);
        assert_eq!(report.batches_ok, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_separates_generator_calls() {
        let enricher = Enricher::new(EchoGenerator::default(), Taxonomy::default());
        let started = tokio::time::Instant::now();

        enrich_all(&enricher, &raws(3), Duration::from_millis(500), &SilentProgress).await;

        // two gaps between three calls, none after the last
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1500), "{elapsed:?}");
    }

    #[tokio::test]
    async fn extract_writes_raw_file() {
        let dir = std::env::temp_dir().join(format!("promptlib_extract_{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let doc = dir.join("prompts.txt");
        std::fs::write(
            &doc,
            "ESTRATEGIA DE MARKETING\nAquí tienes 50 prompts para Marketing\n1. Escribe un correo de seguimiento\n\n2. Plan de contenidos\n",
        )
        .unwrap();
        let output = dir.join("raw_prompts.json");

        let prompts = extract(&doc, &output, &ExtractOptions::default(), &SilentProgress)
            .expect("extract");
        assert_eq!(prompts.len(), 2);

        let back = artifacts::read_raw_prompts(&output).unwrap();
        assert_eq!(back, prompts);
        assert_eq!(back[0].category, "ESTRATEGIA DE MARKETING");
        assert_eq!(back[0].content, "Escribe un correo de seguimiento");
    }
}
