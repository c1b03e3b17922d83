//! Numbered-prompt extraction from a document's paragraph sequence.
//!
//! The scan is a left fold over paragraphs. The accumulator carries the
//! heading currently in effect and the last non-empty paragraph, which is
//! what a section-intro line looks back to.

mod docx;

use std::path::Path;
use std::sync::LazyLock;

use promptlib_shared::{AppConfig, PromptlibError, RawPrompt, Result};
use regex::Regex;
use tracing::{debug, info, instrument};

pub use docx::{paragraphs_from_docx_bytes, read_docx_paragraphs};

/// `<digits>.<optional whitespace><rest>` where rest may span lines.
static PROMPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^([0-9]+)\.\s*(.*)$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Rules controlling heading detection.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Category for prompt lines seen before any section intro.
    pub default_category: String,
    /// Words that must all appear in an intro line (lowercase).
    pub intro_required: Vec<String>,
    /// Words of which at least one must appear in an intro line (lowercase).
    pub intro_any: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ExtractOptions {
    fn from(config: &AppConfig) -> Self {
        let lower = |words: &[String]| -> Vec<String> {
            words.iter().map(|w| w.to_lowercase()).collect()
        };
        Self {
            default_category: config.taxonomy.default_category.clone(),
            intro_required: lower(config.extract.intro_required.as_slice()),
            intro_any: lower(config.extract.intro_any.as_slice()),
        }
    }
}

impl ExtractOptions {
    /// Whether `text` introduces a themed list ("Aquí tienes 50 prompts para ...").
    fn is_section_intro(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.intro_required.iter().all(|w| lower.contains(w.as_str()))
            && self.intro_any.iter().any(|w| lower.contains(w.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

/// How a single non-empty paragraph was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// A numbered list item.
    Prompt { index: u64, content: String },
    /// A line announcing a new themed list.
    SectionIntro,
    /// Anything else.
    Other,
}

/// Classify one trimmed, non-empty paragraph.
pub fn classify(text: &str, opts: &ExtractOptions) -> LineKind {
    if let Some(caps) = PROMPT_RE.captures(text) {
        match caps[1].parse::<u64>() {
            Ok(index) => {
                return LineKind::Prompt {
                    index,
                    content: caps[2].trim().to_string(),
                };
            }
            Err(e) => debug!(numeral = &caps[1], error = %e, "numeral out of range, not a prompt"),
        }
    }

    if opts.is_section_intro(text) {
        LineKind::SectionIntro
    } else {
        LineKind::Other
    }
}

/// Fold accumulator.
struct ScanState {
    current_category: String,
    last_non_empty: Option<String>,
    prompts: Vec<RawPrompt>,
}

impl ScanState {
    fn step(mut self, paragraph: &str, opts: &ExtractOptions) -> Self {
        let text = paragraph.trim();
        if text.is_empty() {
            return self;
        }

        match classify(text, opts) {
            LineKind::Prompt { index, content } => {
                self.prompts
                    .push(RawPrompt::new(self.current_category.clone(), index, content));
            }
            LineKind::SectionIntro => {
                if let Some(heading) = self.last_non_empty.take() {
                    debug!(heading = %heading, "section heading");
                    self.current_category = heading;
                }
            }
            LineKind::Other => {}
        }

        self.last_non_empty = Some(text.to_string());
        self
    }
}

/// Extract every numbered prompt from an ordered paragraph sequence.
pub fn extract_prompts<S: AsRef<str>>(paragraphs: &[S], opts: &ExtractOptions) -> Vec<RawPrompt> {
    let initial = ScanState {
        current_category: opts.default_category.clone(),
        last_non_empty: None,
        prompts: Vec::new(),
    };

    paragraphs
        .iter()
        .fold(initial, |state, p| state.step(p.as_ref(), opts))
        .prompts
}

// ---------------------------------------------------------------------------
// Document readers
// ---------------------------------------------------------------------------

/// Read a document into its paragraph sequence.
///
/// `.docx` files are unpacked; anything else is read as UTF-8 text with one
/// paragraph per line.
pub fn read_paragraphs(path: &Path) -> Result<Vec<String>> {
    let is_docx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("docx"));

    if is_docx {
        read_docx_paragraphs(path)
    } else {
        let text = std::fs::read_to_string(path).map_err(|e| PromptlibError::io(path, e))?;
        Ok(text.lines().map(String::from).collect())
    }
}

/// Read a document and extract its prompts.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn extract_from_path(path: &Path, opts: &ExtractOptions) -> Result<Vec<RawPrompt>> {
    let paragraphs = read_paragraphs(path)?;
    let prompts = extract_prompts(&paragraphs, opts);

    let mut categories: Vec<&str> = prompts.iter().map(|p| p.category.as_str()).collect();
    categories.dedup();
    info!(
        paragraphs = paragraphs.len(),
        prompts = prompts.len(),
        sections = categories.len(),
        "extraction complete"
    );

    Ok(prompts)
}
