//! # Compiling Handlers
//!
//! Verb handlers that serve resources compiled on demand from disk.
//!
//! - [`ResourceServer`] mounts a directory: the request args select the file
//! - [`ResourceFile`] mounts a single file
//!
//! Each handler owns a [`ResourceCache`](crate::resource::ResourceCache), so
//! two mounts of the same directory compile independently. A request runs:
//!
//! 1. cache lookup (403/404 become the handler's status code)
//! 2. `res.source`/`res.compiled`/`res.options`/`res.include` are set
//! 3. the artifact renders into `res.out`
//! 4. finalization: 200, `Content-Type` (override or family default) and
//!    gzip when the request accepts it and `compress` is on
//!
//! A status raised by the artifact is returned as is, with nothing written.
//! Scripts skip step 4: they write their own head and body through `res`,
//! and the handler returns 200 with the response left as the script built it.
//!
//! ```rust,ignore
//! let mut app = Application::new();
//! app.register_verb("blog", template_server("views/blog", HandlerOptions::default()));
//! app.register_verb("site.css", stylesheet_file("styles/site.css", HandlerOptions::default()));
//! app.register_verb("api", script_server("api", HandlerOptions::default()));
//! ```

mod includer;
mod options;
mod resource;

pub use includer::Includer;
pub use options::HandlerOptions;
pub use resource::{ResourceFile, ResourceServer};

use crate::compiler::{ScriptCompiler, StylesheetCompiler, TemplateCompiler};
use std::path::PathBuf;

pub type TemplateServer = ResourceServer<TemplateCompiler>;
pub type TemplateFile = ResourceFile<TemplateCompiler>;
pub type StylesheetServer = ResourceServer<StylesheetCompiler>;
pub type StylesheetFile = ResourceFile<StylesheetCompiler>;
pub type ScriptServer = ResourceServer<ScriptCompiler>;
pub type ScriptFile = ResourceFile<ScriptCompiler>;

pub fn template_server(root: impl Into<PathBuf>, options: HandlerOptions) -> TemplateServer {
    ResourceServer::new(TemplateCompiler::new(), root, options)
}

pub fn template_file(file: impl Into<PathBuf>, options: HandlerOptions) -> TemplateFile {
    ResourceFile::new(TemplateCompiler::new(), file, options)
}

pub fn stylesheet_server(root: impl Into<PathBuf>, options: HandlerOptions) -> StylesheetServer {
    ResourceServer::new(StylesheetCompiler::new(), root, options)
}

pub fn stylesheet_file(file: impl Into<PathBuf>, options: HandlerOptions) -> StylesheetFile {
    ResourceFile::new(StylesheetCompiler::new(), file, options)
}

pub fn script_server(root: impl Into<PathBuf>, options: HandlerOptions) -> ScriptServer {
    ResourceServer::new(ScriptCompiler::new(), root, options)
}

pub fn script_file(file: impl Into<PathBuf>, options: HandlerOptions) -> ScriptFile {
    ResourceFile::new(ScriptCompiler::new(), file, options)
}
