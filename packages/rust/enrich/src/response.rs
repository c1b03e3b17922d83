//! Lenient parsing of the model's JSON payload.
//!
//! The payload is untrusted. A direct parse is tried first, then the widest
//! `{ ... }` span inside the text (first `{` to last `}`), which recovers
//! answers wrapped in prose or Markdown fences. Individual keys that are
//! missing, null, blank, or of the wrong type are treated as absent.

use serde_json::{Map, Value};

/// Fields the model was asked to return. `None` means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiSuggestion {
    pub translation: Option<String>,
    pub tags_es: Option<Vec<String>>,
    pub tags_en: Option<Vec<String>>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
}

/// Parse a payload, returning `None` when no JSON object can be recovered.
pub fn parse_suggestion(payload: &str) -> Option<AiSuggestion> {
    parse_object(payload)
        .or_else(|| embedded_object(payload).and_then(parse_object))
        .map(|obj| AiSuggestion::from_object(&obj))
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

/// Widest span from the first `{` to the last `}`.
fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

impl AiSuggestion {
    fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            translation: string_field(obj, "translation"),
            tags_es: tags_field(obj, "tags_es"),
            tags_en: tags_field(obj, "tags_en"),
            category: string_field(obj, "category"),
            subcategory: string_field(obj, "subcategory"),
        }
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn tags_field(obj: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let items = obj.get(key)?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_json() {
        let payload = r#"{
            "translation": "Write a follow-up email",
            "tags_es": ["correo", "seguimiento"],
            "tags_en": ["email", "follow-up"],
            "category": "Marketing y Redes Sociales",
            "subcategory": "Email"
        }"#;
        let s = parse_suggestion(payload).expect("parse");
        assert_eq!(s.translation.as_deref(), Some("Write a follow-up email"));
        assert_eq!(s.tags_es, Some(vec!["correo".into(), "seguimiento".into()]));
        assert_eq!(s.tags_en.as_ref().map(Vec::len), Some(2));
        assert_eq!(s.category.as_deref(), Some("Marketing y Redes Sociales"));
        assert_eq!(s.subcategory.as_deref(), Some("Email"));
    }

    #[test]
    fn fenced_json_recovered() {
        let payload = "Claro, aquí está:\n```json\n{\"translation\": \"Olive trees\", \"tags_en\": [\"trees\"]}\n```\n";
        let s = parse_suggestion(payload).expect("recover");
        assert_eq!(s.translation.as_deref(), Some("Olive trees"));
        assert_eq!(s.tags_en, Some(vec!["trees".into()]));
        assert!(s.tags_es.is_none());
    }

    #[test]
    fn widest_span_is_used() {
        let payload = r#"prefix {"translation": "a", "nested": {"x": 1}} suffix"#;
        let s = parse_suggestion(payload).expect("recover");
        assert_eq!(s.translation.as_deref(), Some("a"));
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse_suggestion("not json at all").is_none());
        assert!(parse_suggestion("").is_none());
        assert!(parse_suggestion("} backwards {").is_none());
        assert!(parse_suggestion("{broken: json}").is_none());
    }

    #[test]
    fn non_object_json_is_none() {
        assert!(parse_suggestion(r#"["a", "b"]"#).is_none());
        assert!(parse_suggestion("42").is_none());
    }

    #[test]
    fn wrong_types_are_absent() {
        let payload = r#"{"translation": 5, "tags_es": "uno, dos", "tags_en": ["ok", 3, " "], "category": null}"#;
        let s = parse_suggestion(payload).expect("parse");
        assert!(s.translation.is_none());
        assert!(s.tags_es.is_none());
        assert_eq!(s.tags_en, Some(vec!["ok".into()]));
        assert!(s.category.is_none());
    }

    #[test]
    fn blank_strings_are_absent() {
        let s = parse_suggestion(r#"{"translation": "   ", "subcategory": ""}"#).expect("parse");
        assert!(s.translation.is_none());
        assert!(s.subcategory.is_none());
    }
}
