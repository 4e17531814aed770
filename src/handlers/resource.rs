use super::includer::Includer;
use super::options::HandlerOptions;
use crate::compiler::{Artifact, Compiler};
use crate::compress::{accepts_gzip, Compressor, Gzip};
use crate::dispatcher::{Handler, IncludeResolver, Request, Response};
use crate::error::{Failure, HandlerResult, Interrupt};
use crate::resource::{map_path, Lookup, ResourceCache};
use anyhow::Context;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Cache, include resolver and finalization shared by both handler shapes.
struct Mount<C: Compiler> {
    cache: Arc<ResourceCache<C>>,
    includer: Arc<Includer<C>>,
    options: HandlerOptions,
    compressor: Arc<dyn Compressor>,
}

impl<C: Compiler> Mount<C> {
    fn new(compiler: C, include_dir: PathBuf, options: HandlerOptions) -> Self {
        let cache = Arc::new(ResourceCache::with_options(
            compiler,
            Arc::clone(&options.extra),
        ));
        let includer = Arc::new(Includer::new(
            Arc::clone(&cache),
            include_dir,
            options.include_path.clone(),
        ));
        Self {
            cache,
            includer,
            options,
            compressor: Arc::new(Gzip::default()),
        }
    }

    fn serve(&self, path: &Path, req: &mut Request, res: &mut Response) -> HandlerResult {
        let entry = match self.cache.get_or_compile(path) {
            Ok(Lookup::Hit(entry)) => entry,
            Ok(Lookup::Status(status)) => return Ok(status),
            Err(failure) => {
                res.adopt_diagnostics(&failure);
                return Err(failure.into());
            }
        };

        res.source = Some(Arc::clone(&entry.source));
        res.compiled = Some(Arc::clone(&entry.compiled));
        res.options = Arc::clone(&self.options.extra);
        let includer: Arc<Includer<C>> = Arc::clone(&self.includer);
        res.include = Some(includer as Arc<dyn IncludeResolver>);
        res.out.clear();

        match entry.artifact.invoke(req, res) {
            Ok(None) => {
                self.finalize(req, res)?;
                Ok(200)
            }
            Ok(Some(status)) => {
                debug!(file = %entry.file_path.display(), status, "artifact returned status");
                Ok(status)
            }
            Err(Interrupt::Failure(failure)) => {
                res.adopt_diagnostics(&failure);
                Err(failure.into())
            }
            Err(control) => Err(control),
        }
    }

    /// 200 with the accumulated output, compressed when the client accepts it.
    fn finalize(&self, req: &Request, res: &mut Response) -> Result<(), Failure> {
        let mime = self
            .options
            .content_type
            .as_deref()
            .unwrap_or(self.cache.compiler().family().mime);
        let body = mem::take(&mut res.out).into_bytes();
        let gzip = req.gzip || req.header("accept-encoding").is_some_and(accepts_gzip);

        if gzip && self.options.compress {
            let packed = self
                .compressor
                .compress(&body)
                .context("compressing response body")
                .map_err(Failure::new)?;
            res.write_head(
                200,
                &[
                    ("Content-Type", mime),
                    ("Content-Encoding", self.compressor.encoding()),
                ],
            );
            res.end(packed);
        } else {
            res.write_head(200, &[("Content-Type", mime)]);
            res.end(body);
        }
        Ok(())
    }
}

/// Serves `root/<args joined by '/'>` for its verb.
///
/// `/blog/2024/intro` under a verb `blog` mounted on `views/` resolves
/// `views/2024/intro`, then `views/2024/intro.jst`; `/blog` alone resolves
/// `views/index.jst`.
pub struct ResourceServer<C: Compiler> {
    root: PathBuf,
    mount: Mount<C>,
}

impl<C: Compiler> ResourceServer<C> {
    pub fn new(compiler: C, root: impl Into<PathBuf>, options: HandlerOptions) -> Self {
        let root = root.into();
        Self {
            mount: Mount::new(compiler, root.clone(), options),
            root,
        }
    }

    /// Replace the default gzip encoder.
    #[must_use]
    pub fn with_compressor(mut self, compressor: impl Compressor + 'static) -> Self {
        self.mount.compressor = Arc::new(compressor);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &ResourceCache<C> {
        &self.mount.cache
    }
}

impl<C: Compiler> Handler for ResourceServer<C> {
    fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
        match map_path(&self.root, &req.args.join("/")) {
            Some(path) => self.mount.serve(&path, req, res),
            None => {
                debug!(uri = %req.uri, "path escapes mount root");
                Ok(404)
            }
        }
    }
}

/// Serves one fixed file for its verb; `include` looks next to that file.
pub struct ResourceFile<C: Compiler> {
    file: PathBuf,
    mount: Mount<C>,
}

impl<C: Compiler> ResourceFile<C> {
    pub fn new(compiler: C, file: impl Into<PathBuf>, options: HandlerOptions) -> Self {
        let file = file.into();
        let dir = file
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            mount: Mount::new(compiler, dir, options),
            file,
        }
    }

    #[must_use]
    pub fn with_compressor(mut self, compressor: impl Compressor + 'static) -> Self {
        self.mount.compressor = Arc::new(compressor);
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn cache(&self) -> &ResourceCache<C> {
        &self.mount.cache
    }
}

impl<C: Compiler> Handler for ResourceFile<C> {
    fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
        self.mount.serve(&self.file, req, res)
    }
}
