//! # jolt
//!
//! **jolt** is a small coroutine-powered application server: a verb
//! dispatcher with status-code driven error pages, plus handlers that compile
//! templates, stylesheets and scripts on demand from disk and keep the
//! compiled form until the source file changes.
//!
//! ## Architecture
//!
//! - **[`dispatcher`]** - verb routing, lifecycle events, error handler table
//!   and the built-in diagnostic pages
//! - **[`resource`]** - path resolution and the per-handler compile cache
//! - **[`compiler`]** - the `Compiler`/`Artifact` seam with the template
//!   (minijinja), stylesheet (lightningcss) and script (minijinja) families
//! - **[`handlers`]** - directory and single-file compiling handlers with
//!   `include` and gzip finalization
//! - **[`server`]** - `may_minihttp` transport glue
//! - **[`config`]**, **[`runtime_config`]**, **[`logging`]** - YAML config,
//!   coroutine tuning and tracing setup
//! - **[`cli`]** - the `jolt` binary
//!
//! ### Request Flow
//!
//! ```text
//! TCP ─▶ JoltService ─▶ Application::handle
//!                         ├─ beginRequest listeners
//!                         ├─ verb ─▶ Handler ─▶ status
//!                         │            └─ ResourceServer ─▶ ResourceCache ─▶ Artifact ─▶ res.out
//!                         ├─ status ─▶ error handler (403 / 404 / 500 / ...)
//!                         └─ endRequest listeners
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jolt::dispatcher::Application;
//! use jolt::handlers::{template_server, HandlerOptions};
//! use jolt::server::{BodyLimits, HttpServer, JoltService};
//! use std::sync::Arc;
//!
//! let mut app = Application::new();
//! app.register_verb("blog", template_server("views/blog", HandlerOptions::default()));
//!
//! let service = JoltService::new(Arc::new(app), BodyLimits::default());
//! let handle = HttpServer(service).start("127.0.0.1:8080").unwrap();
//! handle.join().unwrap();
//! ```
//!
//! ## Error Handling
//!
//! Handlers return `Result<u16, Interrupt>`. A status code selects an error
//! handler; an [`error::Failure`] is rendered by the 500 path with source and
//! compiled listings; an [`error::ControlSignal`] unwinds without rendering.

pub mod cli;
pub mod compiler;
pub mod compress;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod resource;
pub mod runtime_config;
pub mod server;

pub use config::AppConfig;
pub use dispatcher::{Application, Event, Handler, Request, Response};
pub use error::{ControlSignal, Failure, HandlerResult, Interrupt};
