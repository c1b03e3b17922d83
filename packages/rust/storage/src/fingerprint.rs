//! Content fingerprints used as ledger and cache keys.
//!
//! Fields are joined with the ASCII unit separator before hashing so that
//! `("ab", "c")` and `("a", "bc")` never collide.

use promptlib_shared::{EnrichedPrompt, RawPrompt};
use sha2::{Digest, Sha256};

const SEP: &[u8] = b"\x1f";

fn hex_digest(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(SEP);
        }
        hasher.update(part);
    }
    format!("{:x}", hasher.finalize())
}

/// Identity of a raw prompt in a fused import run.
pub fn import_fingerprint(raw: &RawPrompt) -> String {
    let index = raw.index.to_string();
    hex_digest(&[
        raw.category.as_bytes(),
        index.as_bytes(),
        raw.content.as_bytes(),
    ])
}

/// Identity of an enriched record loaded from a file.
pub fn load_fingerprint(record: &EnrichedPrompt) -> String {
    hex_digest(&[record.content_es.as_bytes(), record.category.as_bytes()])
}

/// Cache key of one generator call.
pub fn cache_key(instruction: &str, model_id: &str) -> String {
    hex_digest(&[instruction.as_bytes(), model_id.as_bytes()])
}
