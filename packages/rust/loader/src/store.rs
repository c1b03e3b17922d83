//! Remote table store and its PostgREST implementation.

use std::future::Future;
use std::time::Duration;

use promptlib_shared::{
    EnrichedPrompt, PromptlibError, Result, StoreConfig, StoreCredentials, truncate_chars,
};
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

const USER_AGENT: &str = concat!("promptlib/", env!("CARGO_PKG_VERSION"));

/// Longest response body kept in a [`PromptlibError::Store`].
const MAX_ERROR_BODY: usize = 500;

/// A destination accepting bulk inserts of enriched prompts.
pub trait TableStore: Send + Sync {
    /// Insert every record in one request. Not idempotent.
    fn insert_batch(&self, records: &[EnrichedPrompt]) -> impl Future<Output = Result<()>> + Send;
}

/// Supabase table reached through its PostgREST endpoint.
#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    insert_url: Url,
    key: String,
}

impl std::fmt::Debug for SupabaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseStore")
            .field("insert_url", &self.insert_url.as_str())
            .finish_non_exhaustive()
    }
}

impl SupabaseStore {
    pub fn new(config: &StoreConfig, credentials: &StoreCredentials) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PromptlibError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            insert_url: insert_url(&credentials.url, &config.table)?,
            key: credentials.key.clone(),
        })
    }

    pub fn insert_url(&self) -> &Url {
        &self.insert_url
    }
}

/// `{base}/rest/v1/{table}`, tolerating a base URL with or without a trailing slash.
fn insert_url(base: &Url, table: &str) -> Result<Url> {
    let table = table.trim();
    if table.is_empty() || table.contains('/') {
        return Err(PromptlibError::config(format!("invalid table name '{table}'")));
    }

    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("rest/v1/{table}"))
        .map_err(|e| PromptlibError::config(format!("invalid store URL: {e}")))
}

impl TableStore for SupabaseStore {
    #[instrument(skip_all, fields(records = records.len()))]
    async fn insert_batch(&self, records: &[EnrichedPrompt]) -> Result<()> {
        let response = self
            .client
            .post(self.insert_url.clone())
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "return=minimal")
            .json(records)
            .send()
            .await
            .map_err(|e| PromptlibError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "batch accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(PromptlibError::Store {
            status: status.as_u16(),
            body: truncate_chars(&body, MAX_ERROR_BODY),
        })
    }
}
