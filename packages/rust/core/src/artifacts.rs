//! JSON array files passed between stages.
//!
//! Files are UTF-8, pretty-printed, and keep non-ASCII text unescaped.

use std::path::Path;

use promptlib_shared::{EnrichedPrompt, PromptlibError, RawPrompt, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Default output of `extract`.
pub const RAW_PROMPTS_FILE: &str = "raw_prompts.json";

/// Default output of `enrich`.
pub const ENRICHED_PROMPTS_FILE: &str = "enriched_prompts.json";

/// Write `items` as a pretty-printed JSON array, creating parent directories.
pub fn write_json_array<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| PromptlibError::io(parent, e))?;
        }
    }

    let mut json = serde_json::to_string_pretty(items)
        .map_err(|e| PromptlibError::parse(format!("failed to serialize {}: {e}", path.display())))?;
    json.push('\n');
    std::fs::write(path, json).map_err(|e| PromptlibError::io(path, e))
}

/// Read a JSON array of `T`.
pub fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path).map_err(|e| PromptlibError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| PromptlibError::parse(format!("failed to parse {}: {e}", path.display())))
}

pub fn read_raw_prompts(path: &Path) -> Result<Vec<RawPrompt>> {
    read_json_array(path)
}

pub fn read_enriched_prompts(path: &Path) -> Result<Vec<EnrichedPrompt>> {
    read_json_array(path)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use uuid::Uuid;

    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("promptlib_artifacts_{}", Uuid::now_v7()))
            .join(name)
    }

    #[test]
    fn raw_prompts_roundtrip_with_accents() {
        let path = temp_file(RAW_PROMPTS_FILE);
        let prompts = vec![
            RawPrompt::new("ILUMINACIÓN", 1, "Luz cálida de atardecer"),
            RawPrompt::new("ILUMINACIÓN", 2, "Niebla matinal"),
        ];
        write_json_array(&path, &prompts).expect("write");

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("ILUMINACIÓN"), "non-ASCII must not be escaped");
        assert!(text.starts_with("[\n"));
        assert!(text.contains("\n  {"));

        let back = read_raw_prompts(&path).expect("read");
        assert_eq!(back, prompts);
    }

    #[test]
    fn raw_prompt_field_order() {
        let path = temp_file("order.json");
        write_json_array(&path, &[RawPrompt::new("Marketing", 1, "x")]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let category = text.find("\"category\"").unwrap();
        let content = text.find("\"content\"").unwrap();
        let index = text.find("\"index\"").unwrap();
        assert!(category < content && content < index);
    }

    #[test]
    fn empty_array_is_valid() {
        let path = temp_file("empty.json");
        write_json_array::<RawPrompt>(&path, &[]).unwrap();
        assert!(read_raw_prompts(&path).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_raw_prompts(Path::new("/nonexistent/raw_prompts.json")).expect_err("missing");
        assert!(matches!(err, PromptlibError::Io { .. }));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let path = temp_file("bad.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{\"not\": \"an array\"}").unwrap();
        let err = read_enriched_prompts(&path).expect_err("bad");
        assert!(matches!(err, PromptlibError::Parse { .. }));
    }
}
