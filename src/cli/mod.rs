//! # CLI Module
//!
//! ## Commands
//!
//! ### `serve`
//!
//! ```bash
//! jolt serve --config app.yaml [--port 9000] [--address 127.0.0.1]
//! ```
//!
//! Loads the config, initialises logging and the coroutine runtime, builds
//! the application and serves until SIGINT/SIGTERM.
//!
//! ### `check`
//!
//! ```bash
//! jolt check views/blog/index.jst
//! ```
//!
//! Compiles one file with its family's compiler and prints the compiled
//! text, or the error with its line and a non-zero exit status.
//!
//! ### `routes`
//!
//! ```bash
//! jolt routes --config app.yaml
//! ```
//!
//! Prints one line per mounted verb.

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{run, run_cli, Cli, Commands};
