//! In-process Typst backend.
//!
//! Fonts handed over in [`BackendAssets::fonts`] are registered ahead of the
//! fonts bundled with Typst, so configured families win when both provide
//! them. The compiler and renderer modules are not needed in-process and are
//! ignored.

use super::backend::{BackendAssets, MarkupBackend};
use crate::core::error::{RenderError, RenderResult};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use typst::diag::{FileError, FileResult};
use typst::foundations::{Bytes, Datetime};
use typst::layout::PagedDocument;
use typst::syntax::{FileId, Source, VirtualPath};
use typst::text::{Font, FontBook};
use typst::utils::LazyHash;
use typst::{Library, LibraryExt, World};

const MAIN_PATH: &str = "/fragment.typ";

/// Fonts and library shared by every compilation.
struct Environment {
    library: LazyHash<Library>,
    book: LazyHash<FontBook>,
    fonts: Vec<Font>,
}

impl Environment {
    fn new(font_data: Vec<Vec<u8>>) -> Self {
        let mut fonts: Vec<Font> = font_data
            .into_iter()
            .flat_map(|data| Font::iter(Bytes::new(data)))
            .collect();
        let registered = fonts.len();
        fonts.extend(
            typst_assets::fonts().flat_map(|data| Font::iter(Bytes::new(data))),
        );
        debug!(
            "typst fonts: {} registered, {} bundled",
            registered,
            fonts.len() - registered
        );

        Self {
            library: LazyHash::new(Library::default()),
            book: LazyHash::new(FontBook::from_fonts(fonts.iter())),
            fonts,
        }
    }
}

/// A single-file world over one fragment source.
struct FragmentWorld {
    env: Arc<Environment>,
    main: FileId,
    source: Source,
}

impl FragmentWorld {
    fn new(env: Arc<Environment>, text: String) -> Self {
        let main = FileId::new(None, VirtualPath::new(MAIN_PATH));
        Self {
            env,
            main,
            source: Source::new(main, text),
        }
    }
}

impl World for FragmentWorld {
    fn library(&self) -> &LazyHash<Library> {
        &self.env.library
    }

    fn book(&self) -> &LazyHash<FontBook> {
        &self.env.book
    }

    fn main(&self) -> FileId {
        self.main
    }

    fn source(&self, id: FileId) -> FileResult<Source> {
        if id == self.main {
            Ok(self.source.clone())
        } else {
            Err(FileError::NotFound(PathBuf::from(id.vpath().as_rootless_path())))
        }
    }

    fn file(&self, id: FileId) -> FileResult<Bytes> {
        Err(FileError::NotFound(PathBuf::from(id.vpath().as_rootless_path())))
    }

    fn font(&self, index: usize) -> Option<Font> {
        self.env.fonts.get(index).cloned()
    }

    fn today(&self, _offset: Option<i64>) -> Option<Datetime> {
        None
    }
}

/// Compiles fragments with the Typst compiler linked into the process.
#[derive(Default)]
pub struct TypstBackend {
    env: RwLock<Option<Arc<Environment>>>,
}

impl TypstBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.env
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn environment(&self) -> RenderResult<Arc<Environment>> {
        self.env
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| RenderError::Initialization("typst backend is not initialized".into()))
    }
}

impl MarkupBackend for TypstBackend {
    async fn initialize(&self, assets: BackendAssets) -> RenderResult<()> {
        let env = tokio::task::spawn_blocking(move || Environment::new(assets.fonts))
            .await
            .map_err(|e| RenderError::Initialization(format!("font loading task failed: {}", e)))?;
        if env.fonts.is_empty() {
            return Err(RenderError::Initialization("no usable fonts".into()));
        }

        info!("typst backend loaded {} font face(s)", env.fonts.len());
        *self.env.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(env));
        Ok(())
    }

    async fn render_svg(&self, source: String) -> RenderResult<String> {
        let env = self.environment()?;
        tokio::task::spawn_blocking(move || compile_to_svg(env, source))
            .await
            .map_err(|e| RenderError::Backend(format!("typst task failed: {}", e)))?
    }
}

fn compile_to_svg(env: Arc<Environment>, source: String) -> RenderResult<String> {
    let world = FragmentWorld::new(env, source);
    let document = typst::compile::<PagedDocument>(&world)
        .output
        .map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.message.to_string()).collect();
            RenderError::Backend(format!("typst compilation failed: {}", messages.join("; ")))
        })?;

    let page = document
        .pages
        .first()
        .ok_or_else(|| RenderError::Backend("typst produced no pages".into()))?;
    Ok(typst_svg::svg(page))
}
