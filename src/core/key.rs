//! Fragment elements and cache key derivation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A markup fragment attached to a canvas element.
///
/// Only `content`, `font_size`, `font_variant` and `color` affect the
/// rendered output. Everything else is host metadata and is ignored by
/// [`FragmentElement::cache_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentElement {
    /// Host element identifier
    #[serde(default)]
    pub id: String,
    /// Raw markup
    pub content: String,
    /// Font size in points
    pub font_size: f64,
    /// Font variant identifier, mapped to a family by the renderer config
    pub font_variant: String,
    /// Fill colour, e.g. `#1e1e1e`
    pub color: String,
}

impl FragmentElement {
    pub fn new(
        content: impl Into<String>,
        font_size: f64,
        font_variant: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            content: content.into(),
            font_size,
            font_variant: font_variant.into(),
            color: color.into(),
        }
    }

    /// Sets the host identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Derives the cache key from the render-affecting fields.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::derive(&self.content, self.font_size, &self.font_variant, &self.color)
    }
}

/// Deterministic fingerprint of every input that affects rendered output.
///
/// The key is a JSON-style array of the input tuple. String fields are quoted
/// and escaped, so distinct inputs can never produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(content: &str, font_size: f64, font_variant: &str, color: &str) -> Self {
        // `{:?}` is the shortest round-trip form and, unlike JSON, keeps
        // NaN and the infinities distinct.
        CacheKey(format!(
            "[{},{:?},{},{}]",
            quote(content),
            font_size,
            quote(font_variant),
            quote(color)
        ))
    }

    /// Wraps an already derived key.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        CacheKey(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(raw: &str) -> Self {
        CacheKey::from_raw(raw)
    }
}
