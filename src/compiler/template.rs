//! Template family: `.jst` files rendered with minijinja.
//!
//! Every artifact owns its own [`Environment`] holding exactly one parsed
//! template, so a recompilation of one file never touches another. The
//! template sees four globals:
//!
//! - `req`: the request (method, uri, verb, args, query, headers)
//! - `data`: the render scratch mapping
//! - `options`: the handler options
//! - `res`: a handle with `include(name)`, `status(code)` and `stop()`
//!
//! Output is streamed straight into `res.out`; an included template writes
//! into the same buffer, so its output lands exactly where it was called.
//! `include` returns the status of a lookup miss (403/404) to the template,
//! while a `res.status(code)` raised inside the included template ends the
//! whole request with `code`.
//!
//! The same machinery backs the script family (see [`super::script`]), where
//! rendered text is dropped and `res` additionally exposes `write_head`,
//! `set_header` and `end`.

use super::{Artifact, Compiler};
use crate::dispatcher::{Included, Request, Response};
use crate::error::{ControlSignal, Failure, Interrupt};
use crate::resource::ResourceFamily;
use minijinja::value::{from_args, Object};
use minijinja::{context, AutoEscape, Environment, Error, ErrorKind, State, Value};
use parking_lot::Mutex;
use serde_json::Map;
use std::fmt;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const TEMPLATE_FAMILY: ResourceFamily = ResourceFamily {
    name: "template",
    extension: "jst",
    index: "index",
    mime: "text/html",
};

/// Source transformation applied before parsing.
pub type Preprocess = Arc<dyn Fn(&str) -> anyhow::Result<String> + Send + Sync>;

/// Compiler for the template family.
#[derive(Clone, Default)]
pub struct TemplateCompiler {
    auto_escape: bool,
    preprocess: Option<Preprocess>,
}

impl fmt::Debug for TemplateCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateCompiler")
            .field("auto_escape", &self.auto_escape)
            .field("preprocess", &self.preprocess.is_some())
            .finish()
    }
}

impl TemplateCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTML-escape every `{{ }}` expression.
    #[must_use]
    pub fn with_auto_escape(mut self, enabled: bool) -> Self {
        self.auto_escape = enabled;
        self
    }

    /// Run `preprocess` over the source before it is parsed.
    #[must_use]
    pub fn with_preprocessor(
        mut self,
        preprocess: impl Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
    ) -> Self {
        self.preprocess = Some(Arc::new(preprocess));
        self
    }
}

impl Compiler for TemplateCompiler {
    type Artifact = TemplateArtifact;

    fn family(&self) -> &ResourceFamily {
        &TEMPLATE_FAMILY
    }

    fn compile(
        &self,
        source: &str,
        _options: &Map<String, serde_json::Value>,
        path: &Path,
    ) -> Result<String, Failure> {
        let normalized = normalize_source(source);
        match &self.preprocess {
            Some(preprocess) => preprocess(&normalized).map_err(|err| {
                Failure::new(err.context(format!("preprocessing {}", path.display())))
            }),
            None => Ok(normalized),
        }
    }

    fn load(&self, compiled: &str, path: &Path) -> Result<TemplateArtifact, Failure> {
        TemplateArtifact::parse(compiled, path, self.auto_escape, Mode::Page)
    }
}

/// Drop a leading byte order mark and turn CRLF into LF.
pub(super) fn normalize_source(source: &str) -> String {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    source.replace("\r\n", "\n")
}

/// Where a render's text goes and how it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Mode {
    /// Text streams into `res.out`; a clean finish leaves finalization to
    /// the handler.
    Page,
    /// Text is dropped; the template writes the response through `res` and
    /// a clean finish ends the request with 200.
    Script,
}

/// A parsed template ready to render.
pub struct TemplateArtifact {
    env: Environment<'static>,
    name: String,
    path: PathBuf,
    mode: Mode,
}

impl fmt::Debug for TemplateArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateArtifact")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Artifact for TemplateArtifact {
    fn invoke(&self, req: &mut Request, res: &mut Response) -> Result<Option<u16>, Interrupt> {
        // The render needs shared access to the pair from the template
        // globals and the output writer at once; move both into an
        // exchange for the duration and hand them back afterwards.
        let exchange = Arc::new(Exchange {
            req: Mutex::new(mem::take(req)),
            res: Mutex::new(mem::take(res)),
        });
        let outcome = self.render(&exchange);
        let (req_back, res_back) = exchange.into_parts();
        *req = req_back;
        *res = res_back;
        outcome
    }
}

impl TemplateArtifact {
    pub(super) fn parse(
        compiled: &str,
        path: &Path,
        auto_escape: bool,
        mode: Mode,
    ) -> Result<Self, Failure> {
        let name = path.display().to_string();
        let mut env = Environment::new();
        env.set_auto_escape_callback(move |_| {
            if auto_escape {
                AutoEscape::Html
            } else {
                AutoEscape::None
            }
        });
        env.add_template_owned(name.clone(), compiled.to_string())
            .map_err(|err| template_failure(&err, path))?;
        Ok(TemplateArtifact {
            env,
            name,
            path: path.to_path_buf(),
            mode,
        })
    }

    fn render(&self, exchange: &Arc<Exchange>) -> Result<Option<u16>, Interrupt> {
        let handle = ResHandle {
            exchange: Arc::clone(exchange),
            mode: self.mode,
        };
        let ctx = {
            let req = exchange.req.lock();
            let res = exchange.res.lock();
            context! {
                req => Value::from_serialize(&*req),
                data => Value::from_serialize(&res.data),
                options => Value::from_serialize(&*res.options),
                res => Value::from_object(handle),
            }
        };

        let template = self
            .env
            .get_template(&self.name)
            .map_err(|err| template_failure(&err, &self.path))?;

        let rendered = match self.mode {
            Mode::Page => template.render_captured_to(ctx, OutWriter(Arc::clone(exchange))),
            Mode::Script => template.render_captured_to(ctx, io::sink()),
        };
        match rendered {
            Ok(_) => Ok(match self.mode {
                Mode::Page => None,
                Mode::Script => Some(200),
            }),
            Err(err) => match find_abort(&err) {
                Some(Abort::Status(code)) => Ok(Some(*code)),
                Some(Abort::Control(signal)) => Err(Interrupt::Control(*signal)),
                Some(Abort::Nested(interrupt)) => Err(interrupt.clone()),
                None => Err(template_failure(&err, &self.path).into()),
            },
        }
    }
}

/// Request/response pair shared between the template globals and the writer.
struct Exchange {
    req: Mutex<Request>,
    res: Mutex<Response>,
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange").finish_non_exhaustive()
    }
}

impl Exchange {
    fn into_parts(self: Arc<Self>) -> (Request, Response) {
        match Arc::try_unwrap(self) {
            Ok(exchange) => (exchange.req.into_inner(), exchange.res.into_inner()),
            // a value captured by the engine still points here
            Err(shared) => (
                mem::take(&mut *shared.req.lock()),
                mem::take(&mut *shared.res.lock()),
            ),
        }
    }

    fn include(&self, name: &str) -> Result<Value, Error> {
        let resolver = self.res.lock().include.as_ref().map(Arc::clone);
        let Some(resolver) = resolver else {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                "res.include is only available inside a compiling handler",
            ));
        };
        let mut req = self.req.lock();
        let mut res = self.res.lock();
        match resolver.include(name, &mut req, &mut res) {
            Ok(Included::Rendered) => Ok(Value::UNDEFINED),
            Ok(Included::Missing(status)) => Ok(Value::from(status)),
            Ok(Included::Status(status)) => Err(abort(Abort::Status(status))),
            Err(interrupt) => Err(abort(Abort::Nested(interrupt))),
        }
    }
}

/// The `res` global.
#[derive(Debug)]
struct ResHandle {
    exchange: Arc<Exchange>,
    mode: Mode,
}

impl Object for ResHandle {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let res = self.exchange.res.lock();
        match key.as_str()? {
            "data" => Some(Value::from_serialize(&res.data)),
            "options" => Some(Value::from_serialize(&*res.options)),
            _ => None,
        }
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        match method {
            "include" => {
                let (name,): (String,) = from_args(args)?;
                self.exchange.include(&name)
            }
            "status" => {
                let (code,): (u16,) = from_args(args)?;
                Err(abort(Abort::Status(code)))
            }
            "stop" => Err(abort(Abort::Control(ControlSignal::Stop))),
            "write_head" | "set_header" | "end" if self.mode == Mode::Page => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("res.{method} is only available in scripts"),
            )),
            "write_head" => {
                let (status, headers): (u16, Option<Value>) = from_args(args)?;
                let headers = match headers {
                    Some(map) => header_pairs(&map)?,
                    None => Vec::new(),
                };
                let borrowed: Vec<(&str, &str)> = headers
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str()))
                    .collect();
                self.exchange.res.lock().write_head(status, &borrowed);
                Ok(Value::UNDEFINED)
            }
            "set_header" => {
                let (name, value): (String, Value) = from_args(args)?;
                self.exchange.res.lock().set_header(&name, value.to_string());
                Ok(Value::UNDEFINED)
            }
            "end" => {
                let (body,): (Option<Value>,) = from_args(args)?;
                let body = body.map(|value| value.to_string()).unwrap_or_default();
                self.exchange.res.lock().end(body);
                Ok(Value::UNDEFINED)
            }
            _ => Err(Error::from(ErrorKind::UnknownMethod)),
        }
    }
}

/// `{name: value}` mapping from a template into header pairs.
fn header_pairs(headers: &Value) -> Result<Vec<(String, String)>, Error> {
    let mut pairs = Vec::new();
    for name in headers.try_iter()? {
        let value = headers.get_item(&name)?;
        pairs.push((name.to_string(), value.to_string()));
    }
    Ok(pairs)
}

/// Appends rendered output to `res.out`.
struct OutWriter(Arc<Exchange>);

impl io::Write for OutWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.res.lock().out.push_str(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Non-output outcomes raised from inside a render.
#[derive(Debug)]
enum Abort {
    Status(u16),
    Control(ControlSignal),
    Nested(Interrupt),
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abort::Status(code) => write!(f, "status {code}"),
            Abort::Control(signal) => write!(f, "{signal}"),
            Abort::Nested(interrupt) => write!(f, "include failed: {interrupt}"),
        }
    }
}

impl std::error::Error for Abort {}

fn abort(reason: Abort) -> Error {
    Error::new(ErrorKind::InvalidOperation, "render aborted").with_source(reason)
}

fn find_abort(err: &Error) -> Option<&Abort> {
    let mut cause = std::error::Error::source(err);
    while let Some(current) = cause {
        if let Some(found) = current.downcast_ref::<Abort>() {
            return Some(found);
        }
        cause = current.source();
    }
    None
}

fn template_failure(err: &Error, fallback: &Path) -> Failure {
    let failure = Failure::msg(format!("{err:#}"));
    let file = err
        .name()
        .map_or_else(|| fallback.to_path_buf(), PathBuf::from);
    match err.line() {
        Some(line) => failure.with_location(file, line),
        None => failure,
    }
}
