//! Category normalization and area routing.
//!
//! [`Taxonomy::normalize`] is total: every input maps to a deterministic,
//! non-empty category. Resolution order:
//!
//! 1. blank → default sentinel
//! 2. exact alias key → alias target
//! 3. exact canonical name → itself
//! 4. accent/case-folded match against alias keys, then canonical names
//! 5. folded alias key contained as whole words (longest key wins)
//! 6. trimmed input unchanged

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::config::TaxonomyConfig;
use crate::types::Area;

/// Alias key pre-folded for matching.
#[derive(Debug, Clone)]
struct FoldedAlias {
    key: String,
    words: Vec<String>,
    target: String,
}

/// Compiled taxonomy built once from [`TaxonomyConfig`].
#[derive(Debug, Clone)]
pub struct Taxonomy {
    config: TaxonomyConfig,
    aliases: Vec<FoldedAlias>,
    folded_canonical: Vec<String>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::new(TaxonomyConfig::default())
    }
}

impl Taxonomy {
    pub fn new(config: TaxonomyConfig) -> Self {
        let aliases = config
            .aliases
            .iter()
            .filter(|a| !a.from.trim().is_empty())
            .map(|a| {
                let key = fold(&a.from);
                FoldedAlias {
                    words: words(&key),
                    key,
                    target: a.to.clone(),
                }
            })
            .collect();
        let folded_canonical = config.canonical.iter().map(|c| fold(c)).collect();

        Self {
            config,
            aliases,
            folded_canonical,
        }
    }

    /// Canonical category names, in configured order.
    pub fn canonical(&self) -> &[String] {
        &self.config.canonical
    }

    pub fn is_canonical(&self, category: &str) -> bool {
        self.config.canonical.iter().any(|c| c == category)
    }

    /// Map raw heading text or an AI suggestion to a category name.
    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return self.config.default_category.clone();
        }

        if let Some(alias) = self.config.aliases.iter().find(|a| a.from == trimmed) {
            return alias.to.clone();
        }
        if self.is_canonical(trimmed) {
            return trimmed.to_string();
        }

        let folded = fold(trimmed);
        if let Some(alias) = self.aliases.iter().find(|a| a.key == folded) {
            return alias.target.clone();
        }
        if let Some(pos) = self.folded_canonical.iter().position(|c| *c == folded) {
            return self.config.canonical[pos].clone();
        }

        let input_words = words(&folded);
        let mut best: Option<&FoldedAlias> = None;
        for alias in &self.aliases {
            if !contains_phrase(&input_words, &alias.words) {
                continue;
            }
            // Strictly longer keys replace earlier matches; ties keep table order.
            if best.is_none_or(|b| alias.key.chars().count() > b.key.chars().count()) {
                best = Some(alias);
            }
        }
        if let Some(alias) = best {
            return alias.target.clone();
        }

        trimmed.to_string()
    }

    /// Route a normalized category to its area.
    pub fn area(&self, category: &str) -> Area {
        if self.config.text_categories.iter().any(|c| c == category) {
            Area::Text
        } else if self.config.code_category == category {
            Area::Code
        } else {
            Area::Image
        }
    }
}

/// Lowercase, strip diacritics, collapse whitespace.
fn fold(s: &str) -> String {
    let stripped: String = s
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn words(folded: &str) -> Vec<String> {
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

fn contains_phrase(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && needle.len() <= haystack.len()
        && haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryAlias;

    fn taxonomy() -> Taxonomy {
        Taxonomy::default()
    }

    #[test]
    fn exact_alias() {
        let t = taxonomy();
        assert_eq!(t.normalize("Vegetación"), "Vegetación y Paisajismo");
        assert_eq!(t.normalize("Código"), "Automatización y Código");
    }

    #[test]
    fn canonical_passes_through() {
        let t = taxonomy();
        assert_eq!(t.normalize("Render y Edición de Imagen"), "Render y Edición de Imagen");
    }

    #[test]
    fn folded_variants() {
        let t = taxonomy();
        assert_eq!(t.normalize("VEGETACION"), "Vegetación y Paisajismo");
        assert_eq!(t.normalize("  camara "), "Cámara y Punto de Vista");
        assert_eq!(t.normalize("iluminacion y clima"), "Iluminación y Clima");
    }

    #[test]
    fn heading_containing_alias() {
        let t = taxonomy();
        assert_eq!(t.normalize("ESTRATEGIA DE MARKETING"), "Marketing y Redes Sociales");
        assert_eq!(
            t.normalize("Prompts de automatización con Python"),
            "Automatización y Código"
        );
    }

    #[test]
    fn alias_must_match_whole_words() {
        let t = taxonomy();
        // "estilos" is not the word "estilo"
        assert_eq!(t.normalize("Estilos de vida"), "Estilos de vida");
    }

    #[test]
    fn longest_contained_alias_wins() {
        let config = TaxonomyConfig {
            aliases: vec![
                CategoryAlias {
                    from: "Marketing".into(),
                    to: "A".into(),
                },
                CategoryAlias {
                    from: "Email marketing".into(),
                    to: "B".into(),
                },
            ],
            ..TaxonomyConfig::default()
        };
        let t = Taxonomy::new(config);
        assert_eq!(t.normalize("Guia de email marketing"), "B");
        assert_eq!(t.normalize("Marketing digital"), "A");
    }

    #[test]
    fn unmapped_is_trimmed_passthrough() {
        let t = taxonomy();
        assert_eq!(t.normalize("  Finanzas personales "), "Finanzas personales");
    }

    #[test]
    fn blank_maps_to_default() {
        let t = taxonomy();
        assert_eq!(t.normalize(""), "General");
        assert_eq!(t.normalize("   "), "General");
    }

    #[test]
    fn normalization_is_total_and_non_empty() {
        let t = taxonomy();
        for input in ["", "x", "Vegetación", "ñ", "\n\t", "Marketing", "12345", "General"] {
            let a = t.normalize(input);
            let b = t.normalize(input);
            assert!(!a.is_empty(), "empty output for {input:?}");
            assert_eq!(a, b);
        }
    }

    #[test]
    fn canonical_outputs_are_stable() {
        let t = taxonomy();
        for c in t.canonical() {
            assert_eq!(&t.normalize(c), c);
        }
    }

    #[test]
    fn area_routing() {
        let t = taxonomy();
        assert_eq!(t.area("Marketing y Redes Sociales"), Area::Text);
        assert_eq!(t.area("Memorias y Documentación"), Area::Text);
        assert_eq!(t.area("Detalles y Mobiliario"), Area::Text);
        assert_eq!(t.area("Automatización y Código"), Area::Code);
        assert_eq!(t.area("Vegetación y Paisajismo"), Area::Image);
        assert_eq!(t.area("General"), Area::Image);
    }

    #[test]
    fn vegetation_example() {
        let t = taxonomy();
        let category = t.normalize("Vegetación");
        assert_eq!(category, "Vegetación y Paisajismo");
        assert_eq!(t.area(&category), Area::Image);
    }
}
