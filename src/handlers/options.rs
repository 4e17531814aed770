use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration shared by the compiling handlers.
#[derive(Debug, Clone)]
pub struct HandlerOptions {
    /// Secondary directory searched by `include` after the handler's own
    pub include_path: Option<PathBuf>,
    /// Overrides the family's default MIME type
    pub content_type: Option<String>,
    /// Compress output when the client accepts it
    pub compress: bool,
    /// Free-form options, passed to the compiler and exposed as `options`
    pub extra: Arc<Map<String, Value>>,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            include_path: None,
            content_type: None,
            compress: true,
            extra: Arc::new(Map::new()),
        }
    }
}

impl HandlerOptions {
    #[must_use]
    pub fn include_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_path = Some(dir.into());
        self
    }

    #[must_use]
    pub fn content_type(mut self, mime: impl Into<String>) -> Self {
        self.content_type = Some(mime.into());
        self
    }

    #[must_use]
    pub fn compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    #[must_use]
    pub fn extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = Arc::new(extra);
        self
    }
}
