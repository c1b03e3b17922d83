//! Ledger-backed cache in front of a [`TextGenerator`].

use std::sync::atomic::{AtomicUsize, Ordering};

use promptlib_enrich::{GenerateError, TextGenerator};
use promptlib_storage::{Ledger, cache_key};
use tracing::{debug, warn};

/// Serves repeated instructions from the ledger's enrichment cache.
///
/// Only successful payloads are cached; generator errors pass through.
/// Cache read or write failures are logged and never fail the call.
pub struct CachedGenerator<'l, G> {
    inner: G,
    ledger: &'l Ledger,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<'l, G: TextGenerator> CachedGenerator<'l, G> {
    pub fn new(inner: G, ledger: &'l Ledger) -> Self {
        Self {
            inner,
            ledger,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G: TextGenerator> TextGenerator for CachedGenerator<'_, G> {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn generate(&self, instruction: &str) -> Result<String, GenerateError> {
        let model = self.inner.model_id();
        let key = cache_key(instruction, model);

        match self.ledger.cached_payload(&key, model).await {
            Ok(Some(payload)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %&key[..12], "enrichment cache hit");
                return Ok(payload);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "enrichment cache read failed"),
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let payload = self.inner.generate(instruction).await?;

        if let Err(e) = self.ledger.store_payload(&key, model, &payload).await {
            warn!(error = %e, "enrichment cache write failed");
        }
        Ok(payload)
    }
}
