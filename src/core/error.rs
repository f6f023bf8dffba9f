use std::time::Duration;

/// Universal error type for fragment and page rendering.
///
/// The error is `Clone` because a single in-flight computation publishes its
/// outcome to every caller that joined it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    /// The markup backend or one of its resources failed to initialize
    #[error("Backend initialization failed: {0}")]
    Initialization(String),

    /// A bounded external load did not finish in time
    #[error("Timed out after {after:?} while loading {what}")]
    Timeout { what: String, after: Duration },

    /// An external resource could not be fetched
    #[error("Failed to load {url}: {reason}")]
    ResourceLoad { url: String, reason: String },

    /// The backend produced output that failed the well-formedness check
    #[error("Backend produced malformed output: {0}")]
    MalformedOutput(String),

    /// The backend reported an error while rendering
    #[error("Backend error: {0}")]
    Backend(String),

    /// A vector artifact could not be turned into a raster image
    #[error("Failed to materialize image: {0}")]
    Materialize(String),

    /// A page document could not be opened
    #[error("Document error: {0}")]
    Document(String),

    /// A single page failed to render
    #[error("Page {page} failed: {reason}")]
    Page { page: usize, reason: String },

    /// Raster encoding failed
    #[error("Encoding error: {0}")]
    Encode(String),

    /// Invalid configuration or options
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The computation that owned this result was dropped before completing
    #[error("Render was abandoned before completion")]
    Abandoned,
}

impl RenderError {
    /// Returns true for failures of the one-time backend setup.
    pub fn is_initialization(&self) -> bool {
        matches!(
            self,
            RenderError::Initialization(_)
                | RenderError::Timeout { .. }
                | RenderError::ResourceLoad { .. }
        )
    }
}

/// Result type alias for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
