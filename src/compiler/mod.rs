//! # Compiler Module
//!
//! The capability seam between the resource cache and the actual
//! source-to-target compilers.
//!
//! A [`Compiler`] works in two stages, mirroring how resources are cached:
//!
//! 1. [`Compiler::compile`] turns source text into compiled text (the
//!    external compiler call)
//! 2. [`Compiler::load`] turns compiled text into an invokable [`Artifact`]
//!
//! A failure in either stage is reported with the source (and, for stage 2,
//! the compiled text) attached by the cache, so the 500 page can show both.
//!
//! Three families ship with the crate:
//!
//! - [`template`]: minijinja templates (`.jst`) rendered into `res.out`
//! - [`stylesheet`]: CSS (`.css`) parsed and re-printed by lightningcss
//! - [`script`]: minijinja scripts (`.jss`) that write their own response
//!
//! Other families (LESS, Stylus, ...) plug in by implementing [`Compiler`].

pub mod script;
pub mod stylesheet;
pub mod template;

pub use script::{ScriptArtifact, ScriptCompiler, SCRIPT_FAMILY};
pub use stylesheet::{StylesheetArtifact, StylesheetCompiler, STYLESHEET_FAMILY};
pub use template::{TemplateArtifact, TemplateCompiler, TEMPLATE_FAMILY};

use crate::dispatcher::{Request, Response};
use crate::error::{Failure, Interrupt};
use crate::resource::ResourceFamily;
use serde_json::{Map, Value};
use std::path::Path;

/// The compiled, directly invokable form of a resource.
pub trait Artifact: Send + Sync + 'static {
    /// Run against a request/response pair.
    ///
    /// `Ok(None)` means success: the caller finalizes the response from
    /// `res.out`. `Ok(Some(status))` hands `status` back to the dispatcher
    /// without finalizing; an artifact that wrote its own response returns
    /// `Some(200)`.
    fn invoke(&self, req: &mut Request, res: &mut Response) -> Result<Option<u16>, Interrupt>;
}

/// Source-to-artifact compiler for one resource family.
pub trait Compiler: Send + Sync + 'static {
    type Artifact: Artifact;

    fn family(&self) -> &ResourceFamily;

    /// Compile `source` read from `path`; `options` are the handler's
    /// options, passed through verbatim.
    fn compile(
        &self,
        source: &str,
        options: &Map<String, Value>,
        path: &Path,
    ) -> Result<String, Failure>;

    /// Wrap compiled text into an artifact.
    fn load(&self, compiled: &str, path: &Path) -> Result<Self::Artifact, Failure>;
}
