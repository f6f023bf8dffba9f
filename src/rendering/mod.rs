pub mod backend;
pub mod fragment;
pub mod pages;
pub mod raster;
pub mod svg;
#[cfg(feature = "typst")]
pub mod typst_backend;

pub use backend::{BackendAssets, MarkupBackend, typst_source};
pub use fragment::{FragmentRender, FragmentRenderer, RenderedFragment};
pub use pages::{
    ConvertOptions, ConvertedPage, PageDocument, PageEngine, PageEngineLoader, PageImage,
    PageSetRenderer, ProgressCallback,
};
pub use raster::{RasterImage, materialize_svg};

#[cfg(feature = "typst")]
pub use typst_backend::TypstBackend;
