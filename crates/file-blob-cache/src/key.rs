//! Cache key derivation
//!
//! Keys double as on-disk file names, so every key this module produces is
//! free of path separators and bounded in length.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Upper bound for sanitized keys, comfortably below common file name limits
const MAX_SANITIZED_LEN: usize = 200;

/// How identifiers are turned into keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// Hex SHA-256 of the normalized identifier
    #[default]
    Sha256,
    /// Filename-safe copy of the raw identifier
    Sanitized,
}

/// A filename-safe cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive a key using the default strategy
    pub fn derive(identifier: &str) -> Self {
        Self::derive_with(KeyStrategy::Sha256, identifier)
    }

    /// Derive a key using an explicit strategy
    pub fn derive_with(strategy: KeyStrategy, identifier: &str) -> Self {
        match strategy {
            KeyStrategy::Sha256 => Self::hashed(identifier),
            KeyStrategy::Sanitized => Self::sanitized(identifier),
        }
    }

    fn hashed(identifier: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize(identifier).as_bytes());
        CacheKey(hex::encode(hasher.finalize()))
    }

    /// Fallback key: the raw identifier with anything unsafe replaced by `_`
    pub fn sanitized(identifier: &str) -> Self {
        let mut out: String = identifier
            .trim()
            .bytes()
            .map(|b| if is_safe_char(b as char) { b as char } else { '_' })
            .collect();

        // Only ASCII survives the map above, so byte truncation stays on a char boundary
        out.truncate(MAX_SANITIZED_LEN);

        if out.is_empty() {
            out.push('_');
        }
        if out.starts_with('.') {
            out.replace_range(0..1, "_");
        }

        CacheKey(out)
    }

    /// Rebuild a key from a directory entry name, rejecting anything this
    /// module could not have produced
    pub fn from_file_name(name: &str) -> Option<Self> {
        let valid = !name.is_empty()
            && name.len() <= MAX_SANITIZED_LEN
            && !name.starts_with('.')
            && name.chars().all(is_safe_char);
        valid.then(|| CacheKey(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Absolute URLs are hashed in their serialized form so trivially different
/// spellings (host case, default port) share an entry
fn normalize(identifier: &str) -> String {
    let trimmed = identifier.trim();
    match Url::parse(trimmed) {
        Ok(url) => url.to_string(),
        Err(_) => trimmed.to_string(),
    }
}
