//! Per-handler cache of compiled artifacts.
//!
//! Every compiling handler owns one [`ResourceCache`]; two registrations of
//! the same family never share entries. The whole of
//! [`ResourceCache::get_or_compile`] (resolution, staleness check, file read
//! and compilation) runs under one exclusive lock, so at most one compilation
//! is in flight per cache. A slow compile therefore also blocks lookups of
//! unrelated paths in the same cache.

use super::resolve::{resolve, Resolution};
use crate::compiler::Compiler;
use crate::error::Failure;
use anyhow::Context;
use may::sync::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, info};

/// A compiled resource.
///
/// Entries are immutable once built; a recompilation replaces the map slot
/// with a fresh `Arc`, so a render in progress keeps the artifact it started
/// with.
#[derive(Debug)]
pub struct CacheEntry<A> {
    pub file_path: PathBuf,
    /// Modification time of `file_path` when it was last compiled
    pub last_modified: SystemTime,
    pub source: Arc<str>,
    pub compiled: Arc<str>,
    pub artifact: Arc<A>,
}

impl<A> CacheEntry<A> {
    /// Usable without recompilation iff the stored timestamp is not older
    /// than the file's current modification time.
    #[must_use]
    pub fn is_fresh(&self, current: SystemTime) -> bool {
        self.last_modified >= current
    }
}

/// Result of a cache lookup: an entry or a resolution status.
#[derive(Debug)]
pub enum Lookup<A> {
    Hit(Arc<CacheEntry<A>>),
    /// 403 (directory without index) or 404 (nothing matching)
    Status(u16),
}

impl<A> Lookup<A> {
    #[must_use]
    pub fn entry(self) -> Option<Arc<CacheEntry<A>>> {
        match self {
            Lookup::Hit(entry) => Some(entry),
            Lookup::Status(_) => None,
        }
    }
}

/// Path-keyed cache of artifacts produced by one [`Compiler`].
pub struct ResourceCache<C: Compiler> {
    compiler: C,
    options: Arc<Map<String, Value>>,
    entries: Mutex<HashMap<PathBuf, Arc<CacheEntry<C::Artifact>>>>,
}

impl<C: Compiler> ResourceCache<C> {
    pub fn new(compiler: C) -> Self {
        Self::with_options(compiler, Arc::new(Map::new()))
    }

    /// `options` are passed verbatim to every compile call.
    pub fn with_options(compiler: C, options: Arc<Map<String, Value>>) -> Self {
        Self {
            compiler,
            options,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Number of resolved paths currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve `path`, then return the cached artifact, compiling it first if
    /// it is missing or older than the file on disk.
    ///
    /// Resolution misses come back as [`Lookup::Status`]; read, compile and
    /// artifact construction errors are a [`Failure`] carrying the source
    /// and whatever compiled text exists.
    pub fn get_or_compile(&self, path: &Path) -> Result<Lookup<C::Artifact>, Failure> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let file = match resolve(path, self.compiler.family()) {
            Resolution::File(file) => file,
            other => {
                let status = other.status().unwrap_or(404);
                debug!(path = %path.display(), status, "resource not resolved");
                return Ok(Lookup::Status(status));
            }
        };

        let modified = fs::metadata(&file)
            .and_then(|meta| meta.modified())
            .with_context(|| format!("reading modification time of {}", file.display()))
            .map_err(Failure::new)?;

        if let Some(entry) = entries.get(&file) {
            if entry.is_fresh(modified) {
                debug!(file = %file.display(), "resource cache hit");
                return Ok(Lookup::Hit(Arc::clone(entry)));
            }
        }

        let entry = Arc::new(self.compile(&file, modified)?);
        entries.insert(file, Arc::clone(&entry));
        Ok(Lookup::Hit(entry))
    }

    fn compile(&self, file: &Path, modified: SystemTime) -> Result<CacheEntry<C::Artifact>, Failure> {
        let started = Instant::now();
        let source: Arc<str> = fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))
            .map_err(Failure::new)?
            .into();

        let compiled: Arc<str> = self
            .compiler
            .compile(&source, &self.options, file)
            .map_err(|failure| failure.with_diagnostics(Arc::clone(&source), None))?
            .into();

        let artifact = self
            .compiler
            .load(&compiled, file)
            .map_err(|failure| {
                failure.with_diagnostics(Arc::clone(&source), Some(Arc::clone(&compiled)))
            })?;

        info!(
            family = self.compiler.family().name,
            file = %file.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "compiled resource"
        );

        Ok(CacheEntry {
            file_path: file.to_path_buf(),
            last_modified: modified,
            source,
            compiled,
            artifact: Arc::new(artifact),
        })
    }
}
