pub mod assets;
pub mod cache;
pub mod config;
pub mod error;
pub mod flight;
pub mod init;
pub mod key;

pub use assets::{AssetLoader, MemoryAssetLoader};
pub use cache::{CacheStats, RenderCache};
pub use config::RendererConfig;
pub use error::{RenderError, RenderResult};
pub use flight::{Flight, FlightWaiter};
pub use init::{InitCell, InitPhase};
pub use key::{CacheKey, FragmentElement};

#[cfg(feature = "http")]
pub use assets::HttpAssetLoader;
