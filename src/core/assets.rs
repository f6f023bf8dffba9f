//! Loading of backend modules and font data.
//!
//! The markup backend needs a handful of binary assets before it can render:
//! optional compiler and renderer modules plus font files. Assets are fetched
//! once, during backend initialization, through an [`AssetLoader`].

use super::error::{RenderError, RenderResult};
use std::collections::HashMap;
use std::future::Future;
#[cfg(feature = "http")]
use std::time::Duration;

/// Fetches binary assets by URL.
pub trait AssetLoader: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = RenderResult<Vec<u8>>> + Send;
}

/// Loads assets over HTTP(S).
///
/// # Example
/// ```no_run
/// use canvas_render::core::{AssetLoader, HttpAssetLoader};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let loader = HttpAssetLoader::new(Duration::from_secs(10))?;
///     let font = loader.fetch("https://example.com/fonts/Virgil.woff2").await?;
///     println!("font: {} bytes", font.len());
///     Ok(())
/// }
/// ```
#[cfg(feature = "http")]
#[derive(Clone)]
pub struct HttpAssetLoader {
    client: reqwest::Client,
    timeout: Duration,
}

#[cfg(feature = "http")]
impl HttpAssetLoader {
    /// Creates a loader whose requests fail after `timeout`.
    pub fn new(timeout: Duration) -> RenderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RenderError::Initialization(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }
}

#[cfg(feature = "http")]
impl AssetLoader for HttpAssetLoader {
    async fn fetch(&self, url: &str) -> RenderResult<Vec<u8>> {
        let to_error = |e: reqwest::Error| {
            if e.is_timeout() {
                RenderError::Timeout {
                    what: url.to_string(),
                    after: self.timeout,
                }
            } else {
                RenderError::ResourceLoad {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let response = self.client.get(url).send().await.map_err(to_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::ResourceLoad {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let bytes = response.bytes().await.map_err(to_error)?;
        log::debug!("fetched {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Serves assets from memory, for offline bundles and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetLoader {
    assets: HashMap<String, Vec<u8>>,
}

impl MemoryAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bytes` under `url`.
    pub fn with_asset(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.assets.insert(url.into(), bytes.into());
        self
    }
}

impl AssetLoader for MemoryAssetLoader {
    async fn fetch(&self, url: &str) -> RenderResult<Vec<u8>> {
        self.assets
            .get(url)
            .cloned()
            .ok_or_else(|| RenderError::ResourceLoad {
                url: url.to_string(),
                reason: "not bundled".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_loader_serves_bundled_assets() {
        let loader = MemoryAssetLoader::new().with_asset("mem://font", vec![1, 2, 3]);
        assert_eq!(loader.fetch("mem://font").await.unwrap(), vec![1, 2, 3]);

        let missing = loader.fetch("mem://other").await;
        assert!(matches!(missing, Err(RenderError::ResourceLoad { .. })));
    }
}
