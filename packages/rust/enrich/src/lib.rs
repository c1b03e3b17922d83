//! AI enrichment of extracted prompts.
//!
//! [`Enricher::enrich`] never fails: every generator or parsing failure
//! degrades to deterministic defaults (original text as translation, empty
//! tags, the heading's normalized category, the original subcategory).

mod gemini;
mod generator;
mod response;

use promptlib_shared::{
    EnrichedPrompt, ORIGIN_INTERNET, RawPrompt, Taxonomy, make_title, new_prompt_id, now_millis,
};
use tracing::{debug, instrument, warn};

pub use gemini::GeminiClient;
pub use generator::{GenerateError, TextGenerator};
pub use response::{AiSuggestion, parse_suggestion};

/// Why an enrichment used default values instead of AI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// Credentials rejected by the service.
    Unauthorized,
    /// Transport, API status, or envelope failure.
    ServiceError,
    /// The payload held no recoverable JSON object.
    MalformedPayload,
}

/// Where the enrichment fields came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionSource {
    Ai,
    Fallback(FallbackReason),
}

/// One enriched record and how it was produced.
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub prompt: EnrichedPrompt,
    pub source: SuggestionSource,
}

/// Build the instruction sent to the model for one prompt.
pub fn build_instruction(raw: &RawPrompt, canonical: &[String]) -> String {
    let categories = canonical
        .iter()
        .map(|c| format!("'{c}'"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are an AI assistant processing prompts for an architectural visualization app.
Input: A prompt in Spanish: "{content}"
Context Category: "{category}"

Task:
1. Translate the prompt to English (for 'translation').
2. Provide 3-5 tags in Spanish (tags_es) and 3-5 tags in English (tags_en).
3. Suggest a Category from: [{categories}].
4. Suggest a short Subcategory.

Return ONLY JSON:
{{
    "translation": "...",
    "tags_es": ["..."],
    "tags_en": ["..."],
    "category": "...",
    "subcategory": "..."
}}"#,
        content = raw.content,
        category = raw.category,
    )
}

/// Turns raw prompts into table records using a [`TextGenerator`].
pub struct Enricher<G> {
    generator: G,
    taxonomy: Taxonomy,
}

impl<G: TextGenerator> Enricher<G> {
    pub fn new(generator: G, taxonomy: Taxonomy) -> Self {
        Self {
            generator,
            taxonomy,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Enrich one prompt. Performs exactly one generator call.
    #[instrument(skip_all, fields(index = raw.index, category = %raw.category))]
    pub async fn enrich(&self, raw: &RawPrompt) -> Enrichment {
        let instruction = build_instruction(raw, self.taxonomy.canonical());

        let (suggestion, source) = match self.generator.generate(&instruction).await {
            Ok(payload) => match parse_suggestion(&payload) {
                Some(s) => (s, SuggestionSource::Ai),
                None => {
                    debug!(bytes = payload.len(), "unparseable payload, using defaults");
                    (
                        AiSuggestion::default(),
                        SuggestionSource::Fallback(FallbackReason::MalformedPayload),
                    )
                }
            },
            Err(e) if e.is_auth() => {
                debug!(error = %e, "generator unauthorized, using defaults");
                (
                    AiSuggestion::default(),
                    SuggestionSource::Fallback(FallbackReason::Unauthorized),
                )
            }
            Err(e) => {
                warn!(error = %e, "AI error, using defaults");
                (
                    AiSuggestion::default(),
                    SuggestionSource::Fallback(FallbackReason::ServiceError),
                )
            }
        };

        Enrichment {
            prompt: self.assemble(raw, suggestion),
            source,
        }
    }

    /// Merge a suggestion with the defaults derived from `raw`.
    pub fn assemble(&self, raw: &RawPrompt, suggestion: AiSuggestion) -> EnrichedPrompt {
        let fallback_category = self.taxonomy.normalize(&raw.category);
        let category = self.resolve_category(suggestion.category.as_deref(), fallback_category);
        let area = self.taxonomy.area(&category);

        EnrichedPrompt {
            id: new_prompt_id(),
            title: make_title(&raw.content),
            content_es: raw.content.clone(),
            content_en: suggestion.translation.unwrap_or_else(|| raw.content.clone()),
            tags: suggestion.tags_es.unwrap_or_default(),
            tags_en: suggestion.tags_en.unwrap_or_default(),
            category,
            subcategory: suggestion
                .subcategory
                .or_else(|| raw.subcategory.clone())
                .unwrap_or_default(),
            origin: ORIGIN_INTERNET.to_string(),
            rating: 0,
            apps: Vec::new(),
            area,
            last_modified: now_millis(),
        }
    }

    /// AI suggestions count only when they resolve to a canonical category.
    fn resolve_category(&self, suggested: Option<&str>, fallback: String) -> String {
        match suggested.map(|s| self.taxonomy.normalize(s)) {
            Some(c) if self.taxonomy.is_canonical(&c) => c,
            Some(c) => {
                debug!(suggested = %c, fallback = %fallback, "unknown AI category");
                fallback
            }
            None => fallback,
        }
    }
}
