//! Per-request context shared by the dispatcher, handlers and artifacts.
//!
//! A [`Request`]/[`Response`] pair is created by the transport for every
//! inbound request and discarded once [`Application::handle`] returns.
//! Handlers augment the response with transient render state (`data`, `out`,
//! `options`, `include`) and the diagnostic fields (`error`, `source`,
//! `compiled`) read by the 500 page.
//!
//! [`Application::handle`]: crate::dispatcher::Application::handle

use crate::error::{Failure, Interrupt};
use serde::Serialize;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Maximum inline positional args before heap allocation
pub const MAX_INLINE_ARGS: usize = 8;

/// Positional path segments following the verb
pub type ArgVec = SmallVec<[String; MAX_INLINE_ARGS]>;

/// Root verb used when the request path has an empty first segment
pub const ROOT_VERB: &str = "/";

/// Inbound request as seen by handlers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Request {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path without the query string
    pub uri: String,
    /// First path segment; may be rewritten by `beginRequest` listeners
    pub verb: String,
    /// Remaining path segments in order
    pub args: ArgVec,
    /// Decoded query string parameters
    pub query: HashMap<String, String>,
    /// HTTP headers (lowercase keys)
    pub headers: HashMap<String, String>,
    /// Raw request body
    #[serde(skip)]
    pub body: Vec<u8>,
    /// Whether the client accepts gzip encoded output
    pub gzip: bool,
}

impl Request {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Builder-style header insertion (name is lowercased).
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Split `uri` into `verb` and `args`.
    ///
    /// `/blog/post1` gives verb `blog` and args `["post1"]`; a trailing
    /// separator drops the trailing empty segment, and an empty verb becomes
    /// [`ROOT_VERB`].
    pub fn parse_path(&mut self) {
        let trimmed = self.uri.strip_prefix('/').unwrap_or(&self.uri);
        let mut segments = trimmed.split('/');
        let verb = segments.next().unwrap_or_default().to_string();
        let mut args: ArgVec = segments.map(str::to_string).collect();
        if self.uri.ends_with('/') && !args.is_empty() {
            args.pop();
        }
        self.verb = if verb.is_empty() {
            ROOT_VERB.to_string()
        } else {
            verb
        };
        self.args = args;
    }
}

/// Outcome of [`IncludeResolver::include`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Included {
    /// The included artifact ran and wrote into the shared `out` buffer
    Rendered,
    /// Nothing to include: 403 or 404 from resolution. The caller decides
    /// what to do about it.
    Missing(u16),
    /// The included artifact raised a status. It belongs to the whole
    /// request, not just the include.
    Status(u16),
}

/// Entry point for an executing artifact to pull in another resource.
///
/// Installed on [`Response::include`] by compiling handlers.
pub trait IncludeResolver: Send + Sync {
    fn include(
        &self,
        name: &str,
        req: &mut Request,
        res: &mut Response,
    ) -> Result<Included, Interrupt>;
}

/// Outbound response plus transient render and diagnostic state.
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    ended: bool,
    /// Scratch mapping for a render
    pub data: Map<String, Value>,
    /// Accumulating output buffer of the current render
    pub out: String,
    /// Handler configuration visible to the artifact
    pub options: Arc<Map<String, Value>>,
    /// Failure being reported by the 500 path
    pub error: Option<Failure>,
    /// Source text of the most recently executed artifact
    pub source: Option<Arc<str>>,
    /// Compiled text of the most recently executed artifact
    pub compiled: Option<Arc<str>>,
    /// Include Resolver of the handler currently rendering
    pub include: Option<Arc<dyn IncludeResolver>>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
            ended: false,
            data: Map::new(),
            out: String::new(),
            options: Arc::new(Map::new()),
            error: None,
            source: None,
            compiled: None,
            include: None,
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("ended", &self.ended)
            .field("error", &self.error)
            .field("has_include", &self.include.is_some())
            .finish_non_exhaustive()
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status line and headers. A later call replaces both, so error
    /// handlers may rewrite a response a content handler already started.
    pub fn write_head(&mut self, status: u16, headers: &[(&str, &str)]) {
        self.status = status;
        self.headers = headers
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
    }

    /// Replace the status code, keeping the headers.
    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// Set or replace a single header (case-insensitive match).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }

    /// Finalize the body.
    pub fn end(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
        self.ended = true;
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Copy a failure's diagnostic bundle onto the response, if it has one.
    pub fn adopt_diagnostics(&mut self, failure: &Failure) {
        if let Some(source) = failure.source_text() {
            self.source = Some(Arc::clone(source));
            self.compiled = failure.compiled_text().cloned();
        }
    }
}
