//! Script family: `.jss` files that answer a request themselves.
//!
//! A script is a minijinja template run for its side effects. Rendered text
//! is thrown away; the script builds the response through `res`:
//!
//! - `res.write_head(status, {name: value, ...})`
//! - `res.set_header(name, value)`
//! - `res.end(body)`
//! - `res.status(code)` / `res.stop()` / `res.include(name)` as in templates
//!
//! A script that finishes normally ends the request with 200 and its
//! response is sent as written: no content type, no compression. A status
//! raised with `res.status(code)` goes to the dispatcher like any handler
//! status.
//!
//! ```text
//! {%- set who = req.query.name or "world" -%}
//! {{- res.write_head(200, {"Content-Type": "application/json"}) -}}
//! {{- res.end({"hello": who} | tojson) -}}
//! ```

use super::template::{normalize_source, Mode};
use super::{Artifact, Compiler, TemplateArtifact};
use crate::dispatcher::{Request, Response};
use crate::error::{Failure, Interrupt};
use crate::resource::ResourceFamily;
use serde_json::{Map, Value};
use std::path::Path;

pub const SCRIPT_FAMILY: ResourceFamily = ResourceFamily {
    name: "script",
    extension: "jss",
    index: "index",
    mime: "text/plain",
};

/// Compiler for the script family.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCompiler;

impl ScriptCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Compiler for ScriptCompiler {
    type Artifact = ScriptArtifact;

    fn family(&self) -> &ResourceFamily {
        &SCRIPT_FAMILY
    }

    fn compile(
        &self,
        source: &str,
        _options: &Map<String, Value>,
        _path: &Path,
    ) -> Result<String, Failure> {
        Ok(normalize_source(source))
    }

    fn load(&self, compiled: &str, path: &Path) -> Result<ScriptArtifact, Failure> {
        TemplateArtifact::parse(compiled, path, false, Mode::Script).map(ScriptArtifact)
    }
}

/// A parsed script.
#[derive(Debug)]
pub struct ScriptArtifact(TemplateArtifact);

impl Artifact for ScriptArtifact {
    fn invoke(&self, req: &mut Request, res: &mut Response) -> Result<Option<u16>, Interrupt> {
        self.0.invoke(req, res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControlSignal;

    fn script(source: &str) -> ScriptArtifact {
        let path = Path::new("api/test.jss");
        let compiled = ScriptCompiler.compile(source, &Map::new(), path).unwrap();
        ScriptCompiler.load(&compiled, path).unwrap()
    }

    #[test]
    fn test_script_writes_its_own_response() {
        let mut req = Request::new("GET", "/api/hello");
        req.query.insert("name".into(), "ann".into());
        let mut res = Response::new();

        let outcome = script(
            "ignored text\n\
             {{ res.write_head(201, {'Content-Type': 'application/json'}) }}\
             {{ res.set_header('X-Script', 'yes') }}\
             {{ res.end({'hello': req.query.name} | tojson) }}",
        )
        .invoke(&mut req, &mut res)
        .unwrap();

        assert_eq!(outcome, Some(200));
        assert_eq!(res.status(), 201);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.header("x-script"), Some("yes"));
        assert_eq!(res.body_text(), r#"{"hello":"ann"}"#);
        assert!(res.out.is_empty());
    }

    #[test]
    fn test_script_status_and_stop() {
        let mut req = Request::new("GET", "/");
        let mut res = Response::new();
        let outcome = script("{{ res.status(403) }}").invoke(&mut req, &mut res);
        assert_eq!(outcome.unwrap(), Some(403));

        let outcome = script("{{ res.stop() }}").invoke(&mut req, &mut res);
        assert!(matches!(
            outcome,
            Err(Interrupt::Control(ControlSignal::Stop))
        ));
    }

    #[test]
    fn test_syntax_error_fails_load() {
        let err = ScriptCompiler
            .load("{{ res.end(", Path::new("api/broken.jss"))
            .unwrap_err();
        assert_eq!(err.location().map(|l| l.line), Some(1));
    }
}
