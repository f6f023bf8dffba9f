//! Rendering of canvas elements to images.
//!
//! Two independent renderers are provided:
//!
//! * [`FragmentRenderer`](rendering::FragmentRenderer) compiles markup
//!   fragments (math, rich text) to SVG through a lazily initialized
//!   [`MarkupBackend`](rendering::MarkupBackend), rasterizes them and caches
//!   the results. Concurrent requests for the same content share one render.
//! * [`PageSetRenderer`](rendering::PageSetRenderer) converts a multi-page
//!   document into PNG page images, in order, with progress reporting and an
//!   optional dark-mode inversion.
//!
//! The caching layer lives in [`core`] and can be used on its own.

pub mod core;
pub mod rendering;

// Re-export main types for convenience
pub use self::core::{
    CacheKey, CacheStats, FragmentElement, RenderCache, RenderError, RenderResult,
    RendererConfig,
};
pub use rendering::{
    ConvertOptions, ConvertedPage, FragmentRender, FragmentRenderer, PageSetRenderer,
    RasterImage, RenderedFragment,
};
