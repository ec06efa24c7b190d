//! Product name canonicalization.
//!
//! Artifacts are written to disk under a filesystem-safe key derived from the
//! product's display name, so lookups must derive the exact same key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical, filesystem-safe identifier derived from a product name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetKey(String);

impl AssetKey {
    /// Canonicalize a free-form product name into an asset key.
    pub fn from_product(name: &str) -> Self {
        Self(canonicalize(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AssetKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Map a product name to its canonical asset key string.
///
/// Punctuation is dropped (letters, digits and `_` are kept), surrounding
/// whitespace is stripped and every inner whitespace run becomes a single `_`.
/// Total and idempotent: `canonicalize(&canonicalize(x)) == canonicalize(x)`.
pub fn canonicalize(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join("_")
}
