//! Stylesheet family: `.css` files parsed and re-printed by lightningcss.
//!
//! Output is minified unless the handler options carry `minify: false`.

use super::{Artifact, Compiler};
use crate::dispatcher::{Request, Response};
use crate::error::{Failure, Interrupt};
use crate::resource::ResourceFamily;
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

pub const STYLESHEET_FAMILY: ResourceFamily = ResourceFamily {
    name: "stylesheet",
    extension: "css",
    index: "index",
    mime: "text/css",
};

#[derive(Debug, Clone, Copy, Default)]
pub struct StylesheetCompiler;

impl StylesheetCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Compiler for StylesheetCompiler {
    type Artifact = StylesheetArtifact;

    fn family(&self) -> &ResourceFamily {
        &STYLESHEET_FAMILY
    }

    fn compile(
        &self,
        source: &str,
        options: &Map<String, Value>,
        path: &Path,
    ) -> Result<String, Failure> {
        let minify = options
            .get("minify")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let sheet = StyleSheet::parse(
            source,
            ParserOptions {
                filename: path.display().to_string(),
                ..ParserOptions::default()
            },
        )
        .map_err(|err| {
            css_failure(
                err.to_string(),
                err.loc.as_ref().map(|loc| loc.line),
                path,
            )
        })?;

        let printed = sheet
            .to_css(PrinterOptions {
                minify,
                ..PrinterOptions::default()
            })
            .map_err(|err| {
                css_failure(
                    err.to_string(),
                    err.loc.as_ref().map(|loc| loc.line),
                    path,
                )
            })?;
        Ok(printed.code)
    }

    fn load(&self, compiled: &str, _path: &Path) -> Result<StylesheetArtifact, Failure> {
        Ok(StylesheetArtifact {
            css: Arc::from(compiled),
        })
    }
}

/// Compiled CSS, appended verbatim to the output buffer.
#[derive(Debug, Clone)]
pub struct StylesheetArtifact {
    css: Arc<str>,
}

impl StylesheetArtifact {
    pub fn css(&self) -> &str {
        &self.css
    }
}

impl Artifact for StylesheetArtifact {
    fn invoke(&self, _req: &mut Request, res: &mut Response) -> Result<Option<u16>, Interrupt> {
        res.out.push_str(&self.css);
        Ok(None)
    }
}

/// lightningcss reports 0-based lines.
fn css_failure(message: String, line: Option<u32>, path: &Path) -> Failure {
    let failure = Failure::msg(format!("{}: {message}", path.display()));
    match line {
        Some(line) => failure.with_location(path, line as usize + 1),
        None => failure,
    }
}
