use crate::compiler::{Artifact, Compiler};
use crate::dispatcher::{IncludeResolver, Included, Request, Response};
use crate::error::Interrupt;
use crate::resource::{map_path, Lookup, ResourceCache};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// `include(name)` for artifacts rendered by one handler.
///
/// Names are looked up in the handler's own directory first, then (on a
/// 403/404) in the configured include directory. Both go through the
/// handler's cache. A lookup miss is reported back to the caller; a status
/// raised by the included artifact is not a miss and ends the request.
pub struct Includer<C: Compiler> {
    cache: Arc<ResourceCache<C>>,
    dir: PathBuf,
    fallback: Option<PathBuf>,
}

impl<C: Compiler> Includer<C> {
    pub fn new(cache: Arc<ResourceCache<C>>, dir: PathBuf, fallback: Option<PathBuf>) -> Self {
        Self {
            cache,
            dir,
            fallback,
        }
    }

    fn lookup(&self, dir: &Path, name: &str) -> Result<Lookup<C::Artifact>, Interrupt> {
        match map_path(dir, name) {
            Some(path) => Ok(self.cache.get_or_compile(&path)?),
            None => Ok(Lookup::Status(404)),
        }
    }
}

impl<C: Compiler> IncludeResolver for Includer<C> {
    fn include(
        &self,
        name: &str,
        req: &mut Request,
        res: &mut Response,
    ) -> Result<Included, Interrupt> {
        let mut lookup = self.lookup(&self.dir, name)?;
        if let (Lookup::Status(403 | 404), Some(fallback)) = (&lookup, &self.fallback) {
            lookup = self.lookup(fallback, name)?;
        }

        match lookup {
            Lookup::Status(status) => {
                debug!(name, status, "include not resolved");
                Ok(Included::Missing(status))
            }
            Lookup::Hit(entry) => {
                res.source = Some(Arc::clone(&entry.source));
                res.compiled = Some(Arc::clone(&entry.compiled));
                match entry.artifact.invoke(req, res)? {
                    None => Ok(Included::Rendered),
                    Some(status) => {
                        debug!(name, status, "included resource raised a status");
                        Ok(Included::Status(status))
                    }
                }
            }
        }
    }
}
