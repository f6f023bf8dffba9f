//! Conversion of multi-page documents into page images.
//!
//! [`PageSetRenderer::convert`] renders pages strictly in order, optionally
//! inverts them for dark mode, encodes each as PNG and reports progress after
//! every page. The result is all-or-nothing: if any page fails, the document
//! is released and the error is returned without partial output.
//!
//! The page engine itself is a host collaborator. It is loaded lazily through
//! a [`PageEngineLoader`] on first use and reused afterwards.

use super::raster::{self, RasterImage};
use crate::core::error::{RenderError, RenderResult};
use log::{debug, error, info};
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use tokio::sync::OnceCell;

/// Default render resolution multiplier.
pub const DEFAULT_SCALE: f32 = 2.0;

/// Default cap on converted pages.
pub const DEFAULT_MAX_PAGES: usize = 100;

/// Progress callback invoked with `(current, total)` after each page.
///
/// `current` is 1-indexed and strictly increasing.
pub type ProgressCallback = Box<dyn FnMut(usize, usize) + Send>;

/// Loads the page engine. Called at most once per successful load.
pub trait PageEngineLoader: Send + Sync {
    type Engine: PageEngine;

    fn load(&self) -> impl Future<Output = RenderResult<Self::Engine>> + Send;
}

/// Opens documents.
pub trait PageEngine: Send + Sync + 'static {
    type Document: PageDocument;

    fn open(&self, data: Vec<u8>) -> impl Future<Output = RenderResult<Self::Document>> + Send;
}

/// An opened document.
pub trait PageDocument: Send {
    fn page_count(&self) -> usize;

    /// Size of page `index` (zero-based) at scale 1.
    fn page_size(&self, index: usize) -> RenderResult<(f32, f32)>;

    /// Rasterizes page `index` (zero-based) at `scale`.
    fn render_page(
        &mut self,
        index: usize,
        scale: f32,
    ) -> impl Future<Output = RenderResult<RasterImage>> + Send;

    /// Releases the document's resources.
    fn destroy(&mut self);
}

/// Options for [`PageSetRenderer::convert`].
pub struct ConvertOptions {
    pub scale: f32,
    pub max_pages: usize,
    pub dark_mode: bool,
    pub on_progress: Option<ProgressCallback>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            max_pages: DEFAULT_MAX_PAGES,
            dark_mode: false,
            on_progress: None,
        }
    }
}

impl fmt::Debug for ConvertOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertOptions")
            .field("scale", &self.scale)
            .field("max_pages", &self.max_pages)
            .field("dark_mode", &self.dark_mode)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl ConvertOptions {
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_dark_mode(mut self, dark_mode: bool) -> Self {
        self.dark_mode = dark_mode;
        self
    }

    pub fn with_progress(mut self, callback: impl FnMut(usize, usize) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }
}

/// A PNG-encoded page raster.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pub png: Vec<u8>,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl PageImage {
    pub fn data_url(&self) -> String {
        raster::encode_png_data_url(&self.png)
    }
}

/// One converted page.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedPage {
    pub image: PageImage,
    /// Width at scale 1
    pub width: f32,
    /// Height at scale 1
    pub height: f32,
    /// Zero-based page index
    pub page_index: usize,
}

/// Destroys the wrapped document exactly once, on every exit path.
struct OpenDocument<D: PageDocument> {
    document: D,
}

impl<D: PageDocument> Deref for OpenDocument<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.document
    }
}

impl<D: PageDocument> DerefMut for OpenDocument<D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.document
    }
}

impl<D: PageDocument> Drop for OpenDocument<D> {
    fn drop(&mut self) {
        self.document.destroy();
        debug!("page document destroyed");
    }
}

/// Converts documents to page images with a lazily loaded engine.
pub struct PageSetRenderer<L: PageEngineLoader> {
    loader: L,
    engine: OnceCell<L::Engine>,
}

impl<L: PageEngineLoader> PageSetRenderer<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            engine: OnceCell::new(),
        }
    }

    /// Returns true once the engine has been loaded.
    pub fn is_engine_loaded(&self) -> bool {
        self.engine.initialized()
    }

    async fn engine(&self) -> RenderResult<&L::Engine> {
        self.engine
            .get_or_try_init(|| async {
                debug!("loading page engine");
                self.loader.load().await.inspect_err(|err| {
                    error!("page engine failed to load: {}", err);
                })
            })
            .await
    }

    /// Renders up to `options.max_pages` pages of `document`, in order.
    pub async fn convert(
        &self,
        document: Vec<u8>,
        options: ConvertOptions,
    ) -> RenderResult<Vec<ConvertedPage>> {
        let ConvertOptions {
            scale,
            max_pages,
            dark_mode,
            mut on_progress,
        } = options;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(RenderError::Config(format!(
                "scale must be a positive number, got {}",
                scale
            )));
        }

        let engine = self.engine().await?;
        let mut document = OpenDocument {
            document: engine.open(document).await.inspect_err(|err| {
                error!("failed to open document: {}", err);
            })?,
        };

        let total = document.page_count().min(max_pages);
        let mut pages = Vec::with_capacity(total);
        for index in 0..total {
            let page = render_one(&mut document, index, scale, dark_mode)
                .await
                .inspect_err(|err| error!("conversion aborted at page {}: {}", index + 1, err))?;
            pages.push(page);
            if let Some(on_progress) = on_progress.as_mut() {
                on_progress(index + 1, total);
            }
        }

        info!("converted {} page(s)", pages.len());
        Ok(pages)
    }
}

/// Attributes an engine error to page `index`.
fn page_error(index: usize, err: RenderError) -> RenderError {
    match err {
        RenderError::Page { .. } => err,
        other => RenderError::Page {
            page: index,
            reason: other.to_string(),
        },
    }
}

async fn render_one<D: PageDocument>(
    document: &mut OpenDocument<D>,
    index: usize,
    scale: f32,
    dark_mode: bool,
) -> RenderResult<ConvertedPage> {
    let (width, height) = document
        .page_size(index)
        .map_err(|err| page_error(index, err))?;
    let mut raster = document
        .render_page(index, scale)
        .await
        .map_err(|err| page_error(index, err))?;
    if dark_mode {
        raster.invert_colors();
    }

    Ok(ConvertedPage {
        image: PageImage {
            png: raster.to_png()?,
            pixel_width: raster.width(),
            pixel_height: raster.height(),
        },
        width,
        height,
        page_index: index,
    })
}
