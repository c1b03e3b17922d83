//! libSQL ledger for resumable runs (local file, single writer).
//!
//! The [`Ledger`] records which prompts were confirmed inserted into the
//! remote table, so reruns can skip them, and caches raw generator payloads.

mod fingerprint;
mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use promptlib_shared::{PromptlibError, Result};

pub use fingerprint::{cache_key, import_fingerprint, load_fingerprint};

/// Pipeline stage that inserted a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Import,
    Load,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Load => "load",
        }
    }
}

/// A confirmed insert: fingerprint and the id of the remote record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub fingerprint: String,
    pub record_id: String,
}

fn storage_err(e: libsql::Error) -> PromptlibError {
    PromptlibError::Storage(e.to_string())
}

/// Handle over the ledger database.
pub struct Ledger {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Ledger {
    /// Open or create a ledger at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| PromptlibError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let ledger = Self { db, conn };
        ledger.run_migrations().await?;
        Ok(ledger)
    }

    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    PromptlibError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 before the first migration.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    // -----------------------------------------------------------------------
    // Insert ledger
    // -----------------------------------------------------------------------

    /// Whether a record with this fingerprint was already inserted.
    pub async fn contains(&self, fingerprint: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM inserted_records WHERE fingerprint = ?1",
                params![fingerprint],
            )
            .await
            .map_err(storage_err)?;

        Ok(rows.next().await.map_err(storage_err)?.is_some())
    }

    /// Record a successfully inserted batch in one transaction.
    pub async fn record_inserted(&self, stage: Stage, entries: &[LedgerEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        for entry in entries {
            tx.execute(
                "INSERT OR IGNORE INTO inserted_records (fingerprint, record_id, stage, inserted_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.fingerprint.as_str(),
                    entry.record_id.as_str(),
                    stage.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;
        }
        tx.commit().await.map_err(storage_err)?;

        tracing::debug!(count = entries.len(), stage = stage.as_str(), "ledger updated");
        Ok(())
    }

    /// Number of ledger entries written by `stage`.
    pub async fn inserted_count(&self, stage: Stage) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM inserted_records WHERE stage = ?1",
                params![stage.as_str()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => {
                let count: i64 = row.get(0).map_err(storage_err)?;
                Ok(u64::try_from(count).unwrap_or(0))
            }
            None => Ok(0),
        }
    }

    // -----------------------------------------------------------------------
    // Enrichment cache
    // -----------------------------------------------------------------------

    /// Cached generator payload for `(prompt_hash, model_id)`.
    pub async fn cached_payload(&self, prompt_hash: &str, model_id: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT payload FROM enrichment_cache WHERE prompt_hash = ?1 AND model_id = ?2",
                params![prompt_hash, model_id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row.get::<String>(0).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    /// Store a generator payload (upserts).
    pub async fn store_payload(&self, prompt_hash: &str, model_id: &str, payload: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO enrichment_cache (prompt_hash, model_id, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(prompt_hash, model_id) DO UPDATE SET
                   payload = excluded.payload,
                   created_at = excluded.created_at",
                params![prompt_hash, model_id, payload, now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use uuid::Uuid;

    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("promptlib_test_{}.db", Uuid::now_v7()))
    }

    async fn test_ledger() -> Ledger {
        Ledger::open(&temp_path()).await.expect("open ledger")
    }

    fn entry(fp: &str, id: &str) -> LedgerEntry {
        LedgerEntry {
            fingerprint: fp.into(),
            record_id: id.into(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let ledger = test_ledger().await;
        assert_eq!(ledger.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = temp_path();
        let first = Ledger::open(&tmp).await.expect("first open");
        first
            .record_inserted(Stage::Import, &[entry("fp1", "id1")])
            .await
            .unwrap();
        drop(first);

        let second = Ledger::open(&tmp).await.expect("second open");
        assert_eq!(second.get_schema_version().await, 1);
        assert!(second.contains("fp1").await.unwrap());
    }

    #[tokio::test]
    async fn records_and_checks_fingerprints() {
        let ledger = test_ledger().await;
        assert!(!ledger.contains("fp1").await.unwrap());

        ledger
            .record_inserted(Stage::Import, &[entry("fp1", "id1"), entry("fp2", "id2")])
            .await
            .expect("record");

        assert!(ledger.contains("fp1").await.unwrap());
        assert!(ledger.contains("fp2").await.unwrap());
        assert!(!ledger.contains("fp3").await.unwrap());
        assert_eq!(ledger.inserted_count(Stage::Import).await.unwrap(), 2);
        assert_eq!(ledger.inserted_count(Stage::Load).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_fingerprints_ignored() {
        let ledger = test_ledger().await;
        ledger
            .record_inserted(Stage::Load, &[entry("fp", "a")])
            .await
            .unwrap();
        ledger
            .record_inserted(Stage::Load, &[entry("fp", "b")])
            .await
            .expect("second insert ignored");
        assert_eq!(ledger.inserted_count(Stage::Load).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_batch_is_noop() {
        let ledger = test_ledger().await;
        ledger.record_inserted(Stage::Import, &[]).await.unwrap();
        assert_eq!(ledger.inserted_count(Stage::Import).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn payload_cache() {
        let ledger = test_ledger().await;
        let key = cache_key("instrucción", "gemini-1.5-flash");

        let miss = ledger.cached_payload(&key, "gemini-1.5-flash").await.unwrap();
        assert!(miss.is_none());

        ledger
            .store_payload(&key, "gemini-1.5-flash", r#"{"translation":"hi"}"#)
            .await
            .expect("store");
        let hit = ledger.cached_payload(&key, "gemini-1.5-flash").await.unwrap();
        assert_eq!(hit.as_deref(), Some(r#"{"translation":"hi"}"#));

        let other_model = ledger.cached_payload(&key, "other").await.unwrap();
        assert!(other_model.is_none());

        ledger
            .store_payload(&key, "gemini-1.5-flash", "not json")
            .await
            .expect("upsert");
        let hit = ledger.cached_payload(&key, "gemini-1.5-flash").await.unwrap();
        assert_eq!(hit.as_deref(), Some("not json"));
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = std::env::temp_dir().join(format!("promptlib_dir_{}", Uuid::now_v7()));
        let path = dir.join("nested").join("ledger.db");
        Ledger::open(&path).await.expect("open nested");
        assert!(path.exists());
    }
}
