//! Cached rendering of markup fragments to images.
//!
//! [`FragmentRenderer`] instantiates [`RenderCache`] for fragments. Each
//! element is keyed by its render-affecting fields; the first request for a
//! key compiles the markup to SVG, validates and sanitizes it, and
//! rasterizes it. Concurrent requests for the same key share that work.
//!
//! The backend is initialized lazily on first use. Initialization fetches
//! the configured modules and fonts and is shared by concurrent first
//! callers; a failed initialization is retried by the next call.

use super::backend::{BackendAssets, MarkupBackend};
use super::raster::{self, RasterImage};
use super::svg;
use crate::core::assets::AssetLoader;
use crate::core::cache::{CacheStats, RenderCache};
use crate::core::config::RendererConfig;
use crate::core::error::{RenderError, RenderResult};
use crate::core::init::{InitCell, InitPhase};
use crate::core::key::{CacheKey, FragmentElement};
use log::{info, warn};
use std::sync::Arc;

/// A rendered fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFragment {
    pub key: CacheKey,
    /// Sanitized SVG markup
    pub svg: String,
    /// `data:image/svg+xml` URL of `svg`
    pub data_url: String,
    /// Intrinsic width in SVG units
    pub width: f32,
    /// Intrinsic height in SVG units
    pub height: f32,
    /// Materialized raster at the configured scale
    pub image: RasterImage,
}

/// Outcome of [`FragmentRenderer::render`].
///
/// Rendering never raises: a failure yields `Unavailable` so the host can
/// fall back to drawing the raw text.
#[derive(Debug, Clone)]
pub enum FragmentRender {
    Rendered(Arc<RenderedFragment>),
    Unavailable(RenderError),
}

impl FragmentRender {
    pub fn is_rendered(&self) -> bool {
        matches!(self, FragmentRender::Rendered(_))
    }

    /// The rendered fragment, or `None` when unavailable.
    pub fn into_option(self) -> Option<Arc<RenderedFragment>> {
        match self {
            FragmentRender::Rendered(fragment) => Some(fragment),
            FragmentRender::Unavailable(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RenderError> {
        match self {
            FragmentRender::Rendered(_) => None,
            FragmentRender::Unavailable(err) => Some(err),
        }
    }
}

/// Renders fragments through a lazily initialized backend and caches the
/// results.
///
/// # Example
/// ```no_run
/// use canvas_render::core::{FragmentElement, HttpAssetLoader, RendererConfig};
/// use canvas_render::rendering::{FragmentRenderer, MarkupBackend};
///
/// async fn draw<B: MarkupBackend>(backend: B) -> Result<(), canvas_render::RenderError> {
///     let config = RendererConfig::default();
///     let loader = HttpAssetLoader::new(config.init_timeout())?;
///     let renderer = FragmentRenderer::new(backend, loader, config)?;
///
///     let element = FragmentElement::new("$e^(i pi) + 1 = 0$", 20.0, "math", "#1e1e1e");
///     match renderer.render(&element).await.into_option() {
///         Some(fragment) => println!("{}x{}", fragment.width, fragment.height),
///         None => println!("falling back to raw text"),
///     }
///     Ok(())
/// }
/// ```
pub struct FragmentRenderer<B, L> {
    backend: B,
    loader: L,
    config: RendererConfig,
    init: InitCell,
    cache: RenderCache<RenderedFragment>,
}

impl<B: MarkupBackend, L: AssetLoader> FragmentRenderer<B, L> {
    /// Creates a renderer. Fails if `config` is invalid.
    pub fn new(backend: B, loader: L, config: RendererConfig) -> RenderResult<Self> {
        config.validate()?;
        let cache = match config.cache_capacity() {
            Some(capacity) => RenderCache::with_capacity(capacity),
            None => RenderCache::new(),
        };
        Ok(Self {
            backend,
            loader,
            config,
            init: InitCell::new(),
            cache,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn backend_phase(&self) -> InitPhase {
        self.init.phase()
    }

    /// Initializes the backend once. Concurrent callers share one attempt;
    /// after a failure the next call tries again.
    pub async fn ensure_backend_ready(&self) -> RenderResult<()> {
        self.init
            .ensure(|| async {
                let assets = self.load_assets().await?;
                self.backend.initialize(assets).await?;
                info!("markup backend ready");
                Ok(())
            })
            .await
    }

    async fn load_assets(&self) -> RenderResult<BackendAssets> {
        let timeout = self.config.init_timeout();
        let fetch_all = async {
            let compiler_module = match &self.config.compiler_module_url {
                Some(url) => Some(self.loader.fetch(url).await?),
                None => None,
            };
            let renderer_module = match &self.config.renderer_module_url {
                Some(url) => Some(self.loader.fetch(url).await?),
                None => None,
            };
            let mut fonts = Vec::with_capacity(self.config.font_urls.len());
            for url in &self.config.font_urls {
                fonts.push(self.loader.fetch(url).await?);
            }
            Ok::<_, RenderError>(BackendAssets {
                compiler_module,
                renderer_module,
                fonts,
            })
        };

        tokio::time::timeout(timeout, fetch_all)
            .await
            .map_err(|_| RenderError::Timeout {
                what: "backend assets".to_string(),
                after: timeout,
            })?
    }

    /// Reports whether the backend can be initialized. Never raises.
    pub async fn is_available(&self) -> bool {
        match self.ensure_backend_ready().await {
            Ok(()) => true,
            Err(err) => {
                warn!("markup backend unavailable: {}", err);
                false
            }
        }
    }

    /// Renders `element`, reusing a cached or in-flight result for the same
    /// content, size, font variant and colour.
    pub async fn render(&self, element: &FragmentElement) -> FragmentRender {
        let key = element.cache_key();
        match self.try_render(&key, element).await {
            Ok(fragment) => FragmentRender::Rendered(fragment),
            Err(err) => {
                if err.is_initialization() {
                    warn!("fragment {:?} unavailable, backend not ready: {}", element.id, err);
                } else {
                    warn!("fragment {:?} failed to render: {}", element.id, err);
                }
                FragmentRender::Unavailable(err)
            }
        }
    }

    async fn try_render(
        &self,
        key: &CacheKey,
        element: &FragmentElement,
    ) -> RenderResult<Arc<RenderedFragment>> {
        self.ensure_backend_ready().await?;
        self.cache
            .get_or_render(key, || self.render_uncached(key.clone(), element))
            .await
    }

    async fn render_uncached(
        &self,
        key: CacheKey,
        element: &FragmentElement,
    ) -> RenderResult<RenderedFragment> {
        let family = self.config.font_family(&element.font_variant);
        let source = self.backend.compose_source(element, family);
        let raw = self.backend.render_svg(source).await?;

        svg::validate(&raw)?;
        let (width, height) = svg::dimensions(&raw)?;
        let clean = svg::sanitize(&raw);
        let data_url = svg::to_data_url(&clean);

        let scale = self.config.raster_scale;
        let url = data_url.clone();
        let image = tokio::task::spawn_blocking(move || {
            let svg_data = svg::decode_data_url(&url)?;
            raster::materialize_svg(&svg_data, scale)
        })
        .await
        .map_err(|e| RenderError::Materialize(format!("rasterizer task failed: {}", e)))??;

        Ok(RenderedFragment {
            key,
            svg: clean,
            data_url,
            width,
            height,
            image,
        })
    }

    /// The cached fragment for `element`, if fully rendered.
    pub fn peek(&self, element: &FragmentElement) -> Option<Arc<RenderedFragment>> {
        self.cache.peek(&element.cache_key())
    }

    pub fn has(&self, element: &FragmentElement) -> bool {
        self.cache.has(&element.cache_key())
    }

    /// Drops the cached fragment for `element`.
    pub fn invalidate(&self, element: &FragmentElement) {
        self.cache.invalidate(&element.cache_key());
    }

    /// Drops every cached fragment.
    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &RenderCache<RenderedFragment> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
