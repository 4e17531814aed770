//! # Resource Module
//!
//! Turns logical request paths into files and keeps their compiled form
//! around until the file changes.
//!
//! ## Overview
//!
//! - [`resolve()`] applies the directory → index file and the missing path →
//!   `path.ext` fallbacks of a [`ResourceFamily`]
//! - [`ResourceCache`] maps resolved paths to [`CacheEntry`] values, checks
//!   staleness against the file's modification time and guarantees a single
//!   compilation in flight per cache instance
//!
//! ## Cache Coherency
//!
//! An entry is reused iff its stored timestamp is `>=` the file's current
//! modification time. Entries are created lazily, replaced on staleness and
//! never evicted: cache lifetime is handler lifetime.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! let cache = ResourceCache::new(TemplateCompiler::default());
//! match cache.get_or_compile(Path::new("views/blog"))? {
//!     Lookup::Hit(entry) => println!("{} compiled", entry.file_path.display()),
//!     Lookup::Status(code) => println!("miss: {code}"),
//! }
//! ```

mod cache;
mod resolve;

pub use cache::{CacheEntry, Lookup, ResourceCache};
pub use resolve::{map_path, resolve, Resolution};

/// File conventions of one compiling handler type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceFamily {
    /// Short name used in logs
    pub name: &'static str,
    /// Canonical source extension, without the dot
    pub extension: &'static str,
    /// Stem of the index file looked up inside directories
    pub index: &'static str,
    /// Default MIME type of the rendered output
    pub mime: &'static str,
}

impl ResourceFamily {
    /// Index file name, e.g. `index.jst`.
    #[must_use]
    pub fn index_file(&self) -> String {
        format!("{}.{}", self.index, self.extension)
    }
}
