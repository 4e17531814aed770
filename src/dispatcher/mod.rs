//! # Dispatcher Module
//!
//! The dispatcher owns the verb route table and the status-code error handler
//! table, and runs every request through the same protocol.
//!
//! ## Request Flow
//!
//! 1. The request path is split into a verb (first segment) and positional
//!    `args`; an empty verb becomes `"/"`
//! 2. `beginRequest` listeners run in registration order and may rewrite
//!    `req.verb`, which is re-read before route lookup
//! 3. The verb is looked up; unknown verbs fall back to a route literally
//!    named `"404"`, else the status is 404
//! 4. The handler returns a status code
//! 5. If an error handler is registered for that status, it runs
//! 6. Failures fire `exception` listeners, land on `res.error` and go to the
//!    500 handler (or the built-in diagnostic page)
//! 7. `endRequest` listeners run on every exit path except control signals
//!
//! ## Usage
//!
//! ```rust
//! use jolt::dispatcher::{Application, Request, Response};
//!
//! let mut app = Application::new();
//! app.register_verb_fn("hello", |req: &mut Request, res: &mut Response| {
//!     res.write_head(200, &[("Content-Type", "text/plain")]);
//!     res.end(format!("hello {}", req.args.join("/")));
//!     Ok(200)
//! });
//!
//! let mut req = Request::new("GET", "/hello/world");
//! let mut res = Response::new();
//! app.handle(&mut req, &mut res).unwrap();
//! assert_eq!(res.body_text(), "hello world");
//! ```
//!
//! ## Control Signals
//!
//! A handler returning `Err(Interrupt::Control(_))` unwinds straight out of
//! [`Application::handle`]; no error page is rendered and `endRequest` does
//! not fire.

mod context;
mod core;
pub mod diagnostics;
mod handler;

pub use context::{
    ArgVec, IncludeResolver, Included, Request, Response, MAX_INLINE_ARGS, ROOT_VERB,
};
pub use core::{Application, Event, NOT_FOUND_VERB};
pub use diagnostics::render_internal_error;
pub use handler::{DiagnosticRenderer, FnHandler, Handler};
