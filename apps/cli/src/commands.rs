//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use promptlib_core::artifacts::{self, ENRICHED_PROMPTS_FILE, RAW_PROMPTS_FILE};
use promptlib_core::{CachedGenerator, ProgressReporter, RunOptions, RunReport, pipeline};
use promptlib_enrich::{Enricher, GeminiClient, TextGenerator};
use promptlib_extract::ExtractOptions;
use promptlib_loader::SupabaseStore;
use promptlib_shared::{
    AppConfig, Credentials, PromptlibError, RawPrompt, Requirements, Taxonomy, init_config,
    load_config, load_config_from, resolve_credentials,
};
use promptlib_storage::{Ledger, Stage};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// promptlib: extract, enrich, and load prompt libraries.
#[derive(Parser)]
#[command(
    name = "promptlib",
    version,
    about = "Extract numbered prompts from documents, enrich them with AI metadata, and load them into a table store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.promptlib/promptlib.toml).
    #[arg(long, global = true, env = "PROMPTLIB_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract numbered prompts from a .docx (or plain text) document.
    Extract {
        /// Source document.
        document: PathBuf,

        /// Output JSON file.
        #[arg(short, long, default_value = RAW_PROMPTS_FILE)]
        output: PathBuf,
    },

    /// Enrich extracted prompts with translations, tags, and categories.
    Enrich {
        /// Raw prompts JSON file.
        input: PathBuf,

        /// Output JSON file.
        #[arg(short, long, default_value = ENRICHED_PROMPTS_FILE)]
        output: PathBuf,

        /// Pause between AI calls, in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Ledger database used as enrichment cache.
        #[arg(long)]
        ledger: Option<PathBuf>,
    },

    /// Bulk-insert enriched prompts into the table store.
    Load {
        /// Enriched prompts JSON file.
        input: PathBuf,

        /// Records per bulk insert.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Ledger database for resumable reruns.
        #[arg(long)]
        ledger: Option<PathBuf>,
    },

    /// Enrich and load raw prompts record by record.
    Import {
        /// Raw prompts JSON file.
        input: PathBuf,

        /// Records per bulk insert.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Pause between AI calls, in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Ledger database for resumable reruns and enrichment cache.
        #[arg(long)]
        ledger: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "promptlib=info",
        1 => "promptlib=debug",
        _ => "promptlib=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Extract { document, output } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_extract(&config, &document, &output)
        }
        Command::Enrich {
            input,
            output,
            delay_ms,
            ledger,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_enrich(&config, &input, &output, delay_ms, ledger.as_deref()).await
        }
        Command::Load {
            input,
            batch_size,
            ledger,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_load(&config, &input, batch_size, ledger.as_deref()).await
        }
        Command::Import {
            input,
            batch_size,
            delay_ms,
            ledger,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_import(&config, &input, batch_size, delay_ms, ledger.as_deref()).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Fail on an unusable batch size before any input is read.
fn checked_batch_size(flag: Option<usize>, config: &AppConfig) -> Result<usize> {
    let size = flag.unwrap_or(config.pipeline.batch_size);
    if size == 0 {
        return Err(PromptlibError::config("batch size must be at least 1").into());
    }
    Ok(size)
}

fn delay(flag: Option<u64>, config: &AppConfig) -> Duration {
    Duration::from_millis(flag.unwrap_or(config.pipeline.delay_ms))
}

fn gemini_client(config: &AppConfig, creds: &Credentials) -> Result<GeminiClient> {
    let key = creds
        .gemini_api_key
        .as_deref()
        .ok_or_else(|| eyre!("Gemini API key was not resolved"))?;
    Ok(GeminiClient::new(&config.gemini, key)?)
}

fn table_store(config: &AppConfig, creds: &Credentials) -> Result<SupabaseStore> {
    let store = creds
        .store
        .as_ref()
        .ok_or_else(|| eyre!("store credentials were not resolved"))?;
    Ok(SupabaseStore::new(&config.store, store)?)
}

async fn open_ledger(path: Option<&Path>) -> Result<Option<Ledger>> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "opening ledger");
            Ok(Some(Ledger::open(path).await?))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_extract(config: &AppConfig, document: &Path, output: &Path) -> Result<()> {
    resolve_credentials(config, Requirements::NONE)?;
    let opts = ExtractOptions::from(config);

    let reporter = CliProgress::new();
    let prompts = pipeline::extract(document, output, &opts, &reporter)?;

    let mut sections: Vec<&str> = prompts.iter().map(|p| p.category.as_str()).collect();
    sections.dedup();

    println!();
    println!("  Extracted {} prompts in {} sections.", prompts.len(), sections.len());
    println!("  Output: {}", output.display());
    println!();
    Ok(())
}

async fn cmd_enrich(
    config: &AppConfig,
    input: &Path,
    output: &Path,
    delay_ms: Option<u64>,
    ledger_path: Option<&Path>,
) -> Result<()> {
    let creds = resolve_credentials(config, Requirements::ENRICH)?;
    let client = gemini_client(config, &creds)?;
    let delay = delay(delay_ms, config);

    let raws = artifacts::read_raw_prompts(input)?;
    let ledger = open_ledger(ledger_path).await?;
    let taxonomy = Taxonomy::new(config.taxonomy.clone());
    let reporter = CliProgress::new();

    info!(records = raws.len(), model = client.model_id(), "enriching prompts");

    let (records, report) = match ledger.as_ref() {
        Some(ledger) => {
            let enricher = Enricher::new(CachedGenerator::new(client, ledger), taxonomy);
            let out = pipeline::enrich_all(&enricher, &raws, delay, &reporter).await;
            print_cache_stats(enricher.generator());
            out
        }
        None => {
            let enricher = Enricher::new(client, taxonomy);
            pipeline::enrich_all(&enricher, &raws, delay, &reporter).await
        }
    };

    artifacts::write_json_array(output, &records)?;
    print_report("Enrichment", &report);
    println!("  Output: {}", output.display());
    println!();
    Ok(())
}

async fn cmd_load(
    config: &AppConfig,
    input: &Path,
    batch_size: Option<usize>,
    ledger_path: Option<&Path>,
) -> Result<()> {
    let creds = resolve_credentials(config, Requirements::LOAD)?;
    let batch_size = checked_batch_size(batch_size, config)?;
    let store = table_store(config, &creds)?;

    let records = artifacts::read_enriched_prompts(input)?;
    let ledger = open_ledger(ledger_path).await?;
    let reporter = CliProgress::new();

    info!(records = records.len(), batch_size, url = %store.insert_url(), "loading prompts");

    let report = pipeline::load(&store, records, batch_size, ledger.as_ref(), &reporter).await?;
    print_report("Load", &report);
    print_ledger_total(ledger.as_ref(), Stage::Load).await?;
    println!();
    Ok(())
}

async fn cmd_import(
    config: &AppConfig,
    input: &Path,
    batch_size: Option<usize>,
    delay_ms: Option<u64>,
    ledger_path: Option<&Path>,
) -> Result<()> {
    let creds = resolve_credentials(config, Requirements::IMPORT)?;
    let opts = RunOptions {
        batch_size: checked_batch_size(batch_size, config)?,
        delay: delay(delay_ms, config),
    };
    let client = gemini_client(config, &creds)?;
    let store = table_store(config, &creds)?;

    let raws = artifacts::read_raw_prompts(input)?;
    let ledger = open_ledger(ledger_path).await?;
    let taxonomy = Taxonomy::new(config.taxonomy.clone());
    let reporter = CliProgress::new();

    let report = match ledger.as_ref() {
        Some(ledger) => {
            let enricher = Enricher::new(CachedGenerator::new(client, ledger), taxonomy);
            let report =
                run_import(&enricher, &store, &raws, opts, Some(ledger), &reporter).await?;
            print_cache_stats(enricher.generator());
            report
        }
        None => {
            let enricher = Enricher::new(client, taxonomy);
            run_import(&enricher, &store, &raws, opts, None, &reporter).await?
        }
    };

    print_report("Import", &report);
    print_ledger_total(ledger.as_ref(), Stage::Import).await?;
    println!();
    Ok(())
}

async fn run_import<G: TextGenerator>(
    enricher: &Enricher<G>,
    store: &SupabaseStore,
    raws: &[RawPrompt],
    opts: RunOptions,
    ledger: Option<&Ledger>,
    reporter: &CliProgress,
) -> Result<RunReport> {
    Ok(pipeline::import(enricher, store, raws, opts, ledger, reporter).await?)
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_report(stage: &str, report: &RunReport) {
    println!();
    println!("  {stage} finished in {:.1}s", report.elapsed.as_secs_f64());
    println!("  Records:   {}", report.seen);
    if report.skipped > 0 {
        println!("  Skipped:   {} (already in ledger)", report.skipped);
    }
    if report.enriched + report.fallbacks > 0 {
        println!("  AI data:   {}", report.enriched);
        println!("  Defaults:  {}", report.fallbacks);
    }
    if report.batches_ok + report.batches_failed > 0 {
        println!(
            "  Batches:   {} ok, {} failed",
            report.batches_ok, report.batches_failed
        );
        println!("  Inserted:  {}", report.inserted);
    }
}

async fn print_ledger_total(ledger: Option<&Ledger>, stage: Stage) -> Result<()> {
    if let Some(ledger) = ledger {
        let total = ledger.inserted_count(stage).await?;
        println!("  Ledger:    {total} records ({} stage)", stage.as_str());
    }
    Ok(())
}

fn print_cache_stats<G: TextGenerator>(cached: &CachedGenerator<'_, G>) {
    info!(hits = cached.hits(), misses = cached.misses(), "enrichment cache");
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn record(&self, current: usize, total: usize, detail: &str) {
        self.spinner
            .set_message(format!("[{current}/{total}] {detail}"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}
