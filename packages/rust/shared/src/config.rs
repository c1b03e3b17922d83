//! Application configuration for promptlib.
//!
//! User config lives at `~/.promptlib/promptlib.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file: it only names the environment
//! variables that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PromptlibError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "promptlib.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".promptlib";

// ---------------------------------------------------------------------------
// Config structs (matching promptlib.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generative-text service settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Remote table store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Batching and pacing.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Document extraction rules.
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Category taxonomy.
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    /// Model used for enrichment.
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// REST API base URL.
    #[serde(default = "default_gemini_endpoint")]
    pub endpoint: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            model: default_gemini_model(),
            endpoint: default_gemini_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[store]` section.
///
/// Each `*_env` list is tried in order; the first non-empty variable wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Env vars that may hold the project URL.
    #[serde(default = "default_store_url_env")]
    pub url_env: Vec<String>,

    /// Env vars that may hold the API key.
    #[serde(default = "default_store_key_env")]
    pub key_env: Vec<String>,

    /// Destination table.
    #[serde(default = "default_table")]
    pub table: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url_env: default_store_url_env(),
            key_env: default_store_key_env(),
            table: default_table(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_store_url_env() -> Vec<String> {
    vec!["SUPABASE_URL".into(), "VITE_SUPABASE_URL".into()]
}
fn default_store_key_env() -> Vec<String> {
    vec![
        "SUPABASE_SERVICE_ROLE_KEY".into(),
        "VITE_SUPABASE_ANON_KEY".into(),
    ]
}
fn default_table() -> String {
    "prompts".into()
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Records per bulk insert.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between per-record enrichment calls, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_batch_size() -> usize {
    20
}
fn default_delay_ms() -> u64 {
    500
}

/// `[extract]` section: marker words identifying a section-intro paragraph.
///
/// A paragraph is an intro when its lowercased text contains every word in
/// `intro_required` and at least one word in `intro_any`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default = "default_intro_required")]
    pub intro_required: Vec<String>,

    #[serde(default = "default_intro_any")]
    pub intro_any: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            intro_required: default_intro_required(),
            intro_any: default_intro_any(),
        }
    }
}

fn default_intro_required() -> Vec<String> {
    vec!["tienes".into(), "prompt".into()]
}
fn default_intro_any() -> Vec<String> {
    vec!["para".into(), "sobre".into()]
}

/// One entry of the alias table: raw heading text → canonical category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAlias {
    pub from: String,
    pub to: String,
}

impl CategoryAlias {
    fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// `[taxonomy]` section.
///
/// `aliases` must stay the last field: TOML writes arrays of tables after
/// plain values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    /// Sentinel for prompts seen before any section heading.
    #[serde(default = "default_category")]
    pub default_category: String,

    /// Canonical category names of the consuming application.
    #[serde(default = "default_canonical")]
    pub canonical: Vec<String>,

    /// Categories routed to the `TEXT` area.
    #[serde(default = "default_text_categories")]
    pub text_categories: Vec<String>,

    /// Category routed to the `CODE` area.
    #[serde(default = "default_code_category")]
    pub code_category: String,

    /// Alias table, matched in order.
    #[serde(default = "default_aliases")]
    pub aliases: Vec<CategoryAlias>,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            default_category: default_category(),
            canonical: default_canonical(),
            text_categories: default_text_categories(),
            code_category: default_code_category(),
            aliases: default_aliases(),
        }
    }
}

const VEGETATION: &str = "Vegetación y Paisajismo";
const PEOPLE: &str = "Personas y Lifestyle";
const MATERIALS: &str = "Materiales y Texturas";
const LIGHTING: &str = "Iluminación y Clima";
const ARCH_STYLE: &str = "Estilo Arquitectónico";
const DETAILS: &str = "Detalles y Mobiliario";
const CAMERA: &str = "Cámara y Punto de Vista";
const NEGATIVE: &str = "Negativos y Restricciones";
const RENDER: &str = "Render y Edición de Imagen";
const MARKETING: &str = "Marketing y Redes Sociales";
const DOCS: &str = "Memorias y Documentación";
const CODE_TOOL: &str = "Automatización y Código";

fn default_category() -> String {
    "General".into()
}
fn default_canonical() -> Vec<String> {
    [
        VEGETATION, PEOPLE, MATERIALS, LIGHTING, ARCH_STYLE, DETAILS, CAMERA, NEGATIVE, RENDER,
        MARKETING, DOCS, CODE_TOOL,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_text_categories() -> Vec<String> {
    vec![MARKETING.into(), DOCS.into(), DETAILS.into()]
}
fn default_code_category() -> String {
    CODE_TOOL.into()
}
fn default_aliases() -> Vec<CategoryAlias> {
    vec![
        CategoryAlias::new("Vegetación", VEGETATION),
        CategoryAlias::new("Vegetacion", VEGETATION),
        CategoryAlias::new("Personas", PEOPLE),
        CategoryAlias::new("Materiales", MATERIALS),
        CategoryAlias::new("Iluminación", LIGHTING),
        CategoryAlias::new("Estilo", ARCH_STYLE),
        CategoryAlias::new("Detalles", DETAILS),
        CategoryAlias::new("Cámara", CAMERA),
        CategoryAlias::new("Negativos", NEGATIVE),
        CategoryAlias::new("Render", RENDER),
        CategoryAlias::new("Marketing", MARKETING),
        CategoryAlias::new("Estrategia de marketing", MARKETING),
        CategoryAlias::new("Documentación", DOCS),
        CategoryAlias::new("Código", CODE_TOOL),
        CategoryAlias::new("Automatización", CODE_TOOL),
    ]
}

// ---------------------------------------------------------------------------
// Credentials (resolved from the environment at startup)
// ---------------------------------------------------------------------------

/// Which credentials a command needs before it may start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requirements {
    pub gemini: bool,
    pub store: bool,
}

impl Requirements {
    pub const NONE: Self = Self {
        gemini: false,
        store: false,
    };
    pub const ENRICH: Self = Self {
        gemini: true,
        store: false,
    };
    pub const LOAD: Self = Self {
        gemini: false,
        store: true,
    };
    pub const IMPORT: Self = Self {
        gemini: true,
        store: true,
    };
}

/// Table store endpoint and key.
#[derive(Clone)]
pub struct StoreCredentials {
    pub url: Url,
    pub key: String,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("url", &self.url.as_str())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Secrets resolved for the current run.
#[derive(Clone, Default)]
pub struct Credentials {
    pub gemini_api_key: Option<String>,
    pub store: Option<StoreCredentials>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("store", &self.store)
            .finish()
    }
}

/// Resolve the credentials required by `req` from the process environment.
pub fn resolve_credentials(config: &AppConfig, req: Requirements) -> Result<Credentials> {
    resolve_credentials_with(config, req, |name| std::env::var(name).ok())
}

/// Resolve credentials through an arbitrary variable lookup.
///
/// Fails with a single diagnostic listing every missing value, before any
/// side effect takes place.
pub fn resolve_credentials_with(
    config: &AppConfig,
    req: Requirements,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Credentials> {
    let first_set = |names: &[String]| {
        names
            .iter()
            .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
    };

    let gemini_key = lookup(&config.gemini.api_key_env).filter(|v| !v.trim().is_empty());
    let store_url = first_set(config.store.url_env.as_slice());
    let store_key = first_set(config.store.key_env.as_slice());

    let mut missing = Vec::new();
    if req.gemini && gemini_key.is_none() {
        missing.push(config.gemini.api_key_env.clone());
    }
    if req.store && store_url.is_none() {
        missing.push(config.store.url_env.join(" or "));
    }
    if req.store && store_key.is_none() {
        missing.push(config.store.key_env.join(" or "));
    }

    if !missing.is_empty() {
        return Err(PromptlibError::config(format!(
            "missing environment variables: {}. Found URL: {}, Key: {}, Gemini: {}",
            missing.join(", "),
            store_url.is_some(),
            store_key.is_some(),
            gemini_key.is_some(),
        )));
    }

    let store = if req.store {
        match (store_url, store_key) {
            (Some(raw_url), Some(key)) => {
                let url = Url::parse(raw_url.trim()).map_err(|e| {
                    PromptlibError::config(format!("invalid store URL '{raw_url}': {e}"))
                })?;
                Some(StoreCredentials { url, key })
            }
            _ => None,
        }
    } else {
        None
    };

    Ok(Credentials {
        gemini_api_key: if req.gemini { gemini_key } else { None },
        store,
    })
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.promptlib/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PromptlibError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.promptlib/promptlib.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PromptlibError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        PromptlibError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PromptlibError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PromptlibError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PromptlibError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
