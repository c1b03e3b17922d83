//! Shared types, error model, taxonomy, and configuration for promptlib.
//!
//! This crate is the foundation depended on by all other promptlib crates.
//! It provides:
//! - [`PromptlibError`]: the unified error type
//! - Record types ([`RawPrompt`], [`EnrichedPrompt`], [`Area`])
//! - [`Taxonomy`]: category normalization and area routing
//! - Configuration ([`AppConfig`], credential resolution, config loading)

pub mod config;
pub mod error;
pub mod taxonomy;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CategoryAlias, Credentials, ExtractConfig, GeminiConfig, PipelineConfig,
    Requirements, StoreConfig, StoreCredentials, TaxonomyConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, resolve_credentials, resolve_credentials_with,
};
pub use error::{PromptlibError, Result};
pub use taxonomy::Taxonomy;
pub use types::{
    Area, EnrichedPrompt, ORIGIN_INTERNET, RawPrompt, TITLE_MAX_CHARS, make_title, new_prompt_id,
    now_millis, truncate_chars,
};
