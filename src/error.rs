//! # Error Module
//!
//! Request handling distinguishes three outcomes that must never be confused
//! with one another:
//!
//! - a numeric status code (`Ok(u16)` from a handler), which drives the
//!   error-handler table,
//! - a [`ControlSignal`], which unwinds request handling without being an
//!   error and must never be rendered as a 500 page,
//! - a [`Failure`], a genuine compile or runtime error that carries enough
//!   context (source text, compiled text, failing location) for the
//!   diagnostic renderer.
//!
//! [`Interrupt`] is the error half of [`HandlerResult`] and is matched by the
//! dispatcher before any generic error handling happens.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of a handler invocation: a status code or an interruption.
pub type HandlerResult = Result<u16, Interrupt>;

/// Non-error signals used to unwind request handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlSignal {
    /// Abort processing: the response has been dealt with, stop here.
    Stop,
    /// End of input: the peer went away mid-request.
    Eof,
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlSignal::Stop => write!(f, "RES.STOP"),
            ControlSignal::Eof => write!(f, "EOF"),
        }
    }
}

impl std::error::Error for ControlSignal {}

/// A file/line pair reported by a compiler or template engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    /// 1-based line number
    pub line: usize,
}

/// A compile-time or run-time failure with its diagnostic context.
///
/// The underlying error is reference counted so a `Failure` can be cloned
/// out of an error chain (template engines only hand out `&dyn Error`) and
/// stored on the response for the 500 page.
#[derive(Clone)]
pub struct Failure {
    error: Arc<anyhow::Error>,
    location: Option<Location>,
    source_text: Option<Arc<str>>,
    compiled_text: Option<Arc<str>>,
}

impl Failure {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: Arc::new(error.into()),
            location: None,
            source_text: None,
            compiled_text: None,
        }
    }

    /// Shorthand for a failure built from a message.
    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::new(anyhow::Error::msg(message))
    }

    #[must_use]
    pub fn with_location(mut self, file: impl AsRef<Path>, line: usize) -> Self {
        self.location = Some(Location {
            file: file.as_ref().to_path_buf(),
            line,
        });
        self
    }

    /// Attach the diagnostic bundle: original source and (possibly partial)
    /// compiled text.
    #[must_use]
    pub fn with_diagnostics(mut self, source: Arc<str>, compiled: Option<Arc<str>>) -> Self {
        self.source_text = Some(source);
        self.compiled_text = compiled;
        self
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn source_text(&self) -> Option<&Arc<str>> {
        self.source_text.as_ref()
    }

    pub fn compiled_text(&self) -> Option<&Arc<str>> {
        self.compiled_text.as_ref()
    }

    /// Full textual stack: the error and every cause, one per line.
    pub fn stack(&self) -> String {
        let mut out = self.error.to_string();
        for cause in self.error.chain().skip(1) {
            out.push_str("\n  caused by: ");
            out.push_str(&cause.to_string());
        }
        if let Some(loc) = &self.location {
            out.push_str(&format!("\n  at {}:{}", loc.file.display(), loc.line));
        }
        out
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("error", &self.error)
            .field("location", &self.location)
            .field("has_source", &self.source_text.is_some())
            .field("has_compiled", &self.compiled_text.is_some())
            .finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{} ({}:{})", self.error, loc.file.display(), loc.line),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for Failure {}

/// Why a handler stopped without producing a status code.
#[derive(Debug, Clone)]
pub enum Interrupt {
    Control(ControlSignal),
    Failure(Failure),
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::Control(signal) => write!(f, "control signal {signal}"),
            Interrupt::Failure(failure) => write!(f, "{failure}"),
        }
    }
}

impl std::error::Error for Interrupt {}

impl From<ControlSignal> for Interrupt {
    fn from(signal: ControlSignal) -> Self {
        Interrupt::Control(signal)
    }
}

impl From<Failure> for Interrupt {
    fn from(failure: Failure) -> Self {
        Interrupt::Failure(failure)
    }
}

impl From<anyhow::Error> for Interrupt {
    fn from(err: anyhow::Error) -> Self {
        Interrupt::Failure(Failure::new(err))
    }
}

impl From<std::io::Error> for Interrupt {
    fn from(err: std::io::Error) -> Self {
        Interrupt::Failure(Failure::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_signal_text() {
        assert_eq!(ControlSignal::Stop.to_string(), "RES.STOP");
        assert_eq!(ControlSignal::Eof.to_string(), "EOF");
    }

    #[test]
    fn test_failure_stack_includes_causes_and_location() {
        let err = anyhow::anyhow!("unexpected token").context("compiling views/a.jst");
        let failure = Failure::new(err).with_location("views/a.jst", 7);
        let stack = failure.stack();
        assert!(stack.starts_with("compiling views/a.jst"));
        assert!(stack.contains("caused by: unexpected token"));
        assert!(stack.ends_with("at views/a.jst:7"));
    }

    #[test]
    fn test_failure_clone_shares_error() {
        let failure = Failure::msg("boom").with_diagnostics(Arc::from("src"), None);
        let copy = failure.clone();
        assert_eq!(copy.to_string(), "boom");
        assert_eq!(copy.source_text().map(|s| &**s), Some("src"));
        assert!(copy.compiled_text().is_none());
    }

    #[test]
    fn test_interrupt_from_signal() {
        let interrupt: Interrupt = ControlSignal::Eof.into();
        assert!(matches!(interrupt, Interrupt::Control(ControlSignal::Eof)));
    }
}
