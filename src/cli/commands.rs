use crate::compiler::{
    Compiler, ScriptCompiler, StylesheetCompiler, TemplateCompiler, SCRIPT_FAMILY,
    STYLESHEET_FAMILY,
};
use crate::config::AppConfig;
use crate::error::Failure;
use crate::logging;
use crate::runtime_config::RuntimeConfig;
use crate::server::{HttpServer, JoltService};
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde_json::Map;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Command-line interface for jolt
#[derive(Parser, Debug)]
#[command(name = "jolt")]
#[command(about = "jolt application server", long_about = None, version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the application described by a config file
    Serve {
        /// Path to the YAML application config
        #[arg(short, long)]
        config: PathBuf,

        /// Override `listen.port` (and `JOLT_PORT`)
        #[arg(long)]
        port: Option<u16>,

        /// Override `listen.address` (and `JOLT_ADDRESS`)
        #[arg(long)]
        address: Option<String>,
    },
    /// Compile one template, stylesheet or script and print the result
    Check {
        /// The `.jst` or `.css` file to compile
        file: PathBuf,
    },
    /// Print the verb table of a config file
    Routes {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Parse the process arguments and run the selected command.
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run(&cli.command, &mut io::stdout().lock())
}

pub fn run(command: &Commands, out: &mut dyn Write) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            config,
            port,
            address,
        } => serve(config, *port, address.clone()),
        Commands::Check { file } => check(file, out),
        Commands::Routes { config } => routes(config, out),
    }
}

fn serve(path: &Path, port: Option<u16>, address: Option<String>) -> anyhow::Result<()> {
    let _log_guard = logging::init_logging()?;
    RuntimeConfig::from_env().apply();

    let mut config = AppConfig::load(path)?;
    if let Some(port) = port {
        config.listen.port = port;
    }
    if let Some(address) = address {
        config.listen.address = address;
    }

    let app = Arc::new(config.build_application()?);
    info!(
        verbs = ?app.verbs(),
        backlog = config.listen.backlog,
        "application built; backlog is left to the listener's own default"
    );

    install_shutdown_handler()?;
    let service = JoltService::new(app, config.listen.body_limits());
    let handle = HttpServer(service)
        .start(config.listen.socket_addr())
        .with_context(|| format!("binding {}", config.listen.socket_addr()))?;
    handle
        .join()
        .map_err(|e| anyhow!("server coroutine panicked: {e:?}"))
}

#[cfg(unix)]
fn install_shutdown_handler() -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("installing signal handlers")?;
    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!(signal, "shutting down");
            std::process::exit(0);
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn install_shutdown_handler() -> anyhow::Result<()> {
    Ok(())
}

fn check(file: &Path, out: &mut dyn Write) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let extension = file.extension().and_then(|ext| ext.to_str());
    let result = match extension {
        Some(ext) if ext == STYLESHEET_FAMILY.extension => {
            compile_once(&StylesheetCompiler::new(), &source, file)
        }
        Some(ext) if ext == SCRIPT_FAMILY.extension => {
            compile_once(&ScriptCompiler::new(), &source, file)
        }
        _ => compile_once(&TemplateCompiler::new(), &source, file),
    };

    match result {
        Ok(compiled) => {
            writeln!(out, "{compiled}")?;
            Ok(())
        }
        Err(failure) => {
            writeln!(out, "{}", failure.stack())?;
            Err(anyhow!("{} failed to compile", file.display()))
        }
    }
}

fn compile_once<C: Compiler>(compiler: &C, source: &str, file: &Path) -> Result<String, Failure> {
    let compiled = compiler.compile(source, &Map::new(), file)?;
    compiler.load(&compiled, file)?;
    Ok(compiled)
}

fn routes(path: &Path, out: &mut dyn Write) -> anyhow::Result<()> {
    let config = AppConfig::load(path)?;
    config.validate()?;
    let mut mounts: Vec<_> = config.mounts.iter().collect();
    mounts.sort_by(|a, b| a.verb.cmp(&b.verb));
    for mount in mounts {
        writeln!(
            out,
            "/{:<20} {:<16} {}",
            mount.verb.trim_start_matches('/'),
            mount.kind,
            mount.path.display()
        )?;
    }
    Ok(())
}
