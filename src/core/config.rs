//! Renderer configuration.

use super::error::{RenderError, RenderResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Configuration for [`FragmentRenderer`](crate::rendering::FragmentRenderer).
///
/// Every field has a default, so a host can supply a partial JSON document:
///
/// ```
/// use canvas_render::core::RendererConfig;
///
/// let config = RendererConfig::from_json(r#"{ "fontUrls": ["https://cdn.example/hand.ttf"] }"#)?;
/// assert_eq!(config.font_urls.len(), 1);
/// assert_eq!(config.raster_scale, 1.0);
/// # Ok::<(), canvas_render::RenderError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RendererConfig {
    /// Location of the backend compiler module, if the backend needs one
    pub compiler_module_url: Option<String>,
    /// Location of the backend renderer module, if the backend needs one
    pub renderer_module_url: Option<String>,
    /// Fonts fetched once at initialization and registered with the backend
    pub font_urls: Vec<String>,
    /// Upper bound for fetching all initialization assets
    pub init_timeout_secs: u64,
    /// Device pixels per SVG unit when materializing fragments
    pub raster_scale: f32,
    /// Maximum number of resolved fragments kept; unbounded when `None`
    pub cache_capacity: Option<usize>,
    /// Font variant identifier to font family name
    pub font_families: BTreeMap<String, String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            compiler_module_url: None,
            renderer_module_url: None,
            font_urls: Vec::new(),
            init_timeout_secs: 30,
            raster_scale: 1.0,
            cache_capacity: None,
            font_families: BTreeMap::new(),
        }
    }
}

impl RendererConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> RenderResult<Self> {
        let config: RendererConfig = serde_json::from_str(json)
            .map_err(|e| RenderError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RenderResult<()> {
        if !self.raster_scale.is_finite() || self.raster_scale <= 0.0 {
            return Err(RenderError::Config(format!(
                "rasterScale must be a positive number, got {}",
                self.raster_scale
            )));
        }
        if self.init_timeout_secs == 0 {
            return Err(RenderError::Config("initTimeoutSecs must be at least 1".into()));
        }
        if self.cache_capacity == Some(0) {
            return Err(RenderError::Config("cacheCapacity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    pub fn cache_capacity(&self) -> Option<NonZeroUsize> {
        self.cache_capacity.and_then(NonZeroUsize::new)
    }

    /// Resolves a font variant to the family name passed to the backend.
    pub fn font_family<'a>(&'a self, variant: &'a str) -> &'a str {
        self.font_families
            .get(variant)
            .map(String::as_str)
            .unwrap_or(variant)
    }
}
