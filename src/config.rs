//! # Application Configuration
//!
//! A jolt application is described by a YAML file:
//!
//! ```yaml
//! listen:
//!   port: 8080
//!   address: 0.0.0.0
//!   upload_max_size: 10485760
//! mounts:
//!   - verb: blog
//!     kind: templates
//!     path: views/blog
//!     include_path: views/shared
//!   - verb: site.css
//!     kind: stylesheet_file
//!     path: styles/site.css
//!     options:
//!       minify: false
//!   - verb: api
//!     kind: scripts
//!     path: api
//! ```
//!
//! Relative mount paths are resolved against the directory holding the
//! config file. `JOLT_PORT` and `JOLT_ADDRESS` override the `listen` block.

use crate::compiler::{ScriptCompiler, StylesheetCompiler, TemplateCompiler};
use crate::dispatcher::{Application, ROOT_VERB};
use crate::handlers::{HandlerOptions, ResourceFile, ResourceServer};
use crate::server::BodyLimits;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenConfig {
    pub port: u16,
    pub address: String,
    /// Accept queue length requested from the host
    pub backlog: u32,
    /// Largest accepted request body, in bytes
    pub upload_max_size: usize,
    /// Request body read granularity, in bytes
    pub upload_block_size: usize,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            address: "0.0.0.0".to_string(),
            backlog: 128,
            upload_max_size: 10 * 1024 * 1024,
            upload_block_size: 64 * 1024,
        }
    }
}

impl ListenConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn body_limits(&self) -> BodyLimits {
        BodyLimits {
            max_size: self.upload_max_size,
            block_size: self.upload_block_size,
        }
    }
}

/// What a mount serves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MountKind {
    Templates,
    TemplateFile,
    Stylesheets,
    StylesheetFile,
    Scripts,
    ScriptFile,
}

impl fmt::Display for MountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MountKind::Templates => "templates",
            MountKind::TemplateFile => "template_file",
            MountKind::Stylesheets => "stylesheets",
            MountKind::StylesheetFile => "stylesheet_file",
            MountKind::Scripts => "scripts",
            MountKind::ScriptFile => "script_file",
        };
        f.write_str(name)
    }
}

fn default_compress() -> bool {
    true
}

/// One verb bound to a compiling handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MountConfig {
    pub verb: String,
    pub kind: MountKind,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default = "default_compress")]
    pub compress: bool,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl MountConfig {
    fn handler_options(&self, base: &Path) -> HandlerOptions {
        HandlerOptions {
            include_path: self.include_path.as_ref().map(|p| base.join(p)),
            content_type: self.content_type.clone(),
            compress: self.compress,
            extra: Arc::new(self.options.clone()),
        }
    }

    fn template_compiler(&self) -> TemplateCompiler {
        let auto_escape = self
            .options
            .get("auto_escape")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        TemplateCompiler::new().with_auto_escape(auto_escape)
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub mounts: Vec<MountConfig>,
    /// Directory relative mount paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl AppConfig {
    /// Load a YAML config file and apply the `JOLT_*` overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let mut config = Self::from_yaml_str(&contents)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.base_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> anyhow::Result<Self> {
        let mut config: AppConfig = serde_yaml::from_str(contents)?;
        config.base_dir = PathBuf::from(".");
        Ok(config)
    }

    /// Apply `JOLT_PORT` / `JOLT_ADDRESS` as returned by `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(port) = lookup("JOLT_PORT") {
            self.listen.port = port
                .trim()
                .parse()
                .with_context(|| format!("JOLT_PORT is not a port number: {port}"))?;
        }
        if let Some(address) = lookup("JOLT_ADDRESS") {
            self.listen.address = address;
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Check verbs for duplicates and shape.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for mount in &self.mounts {
            if mount.verb.is_empty() {
                bail!("mount for {} has an empty verb", mount.path.display());
            }
            if mount.verb != ROOT_VERB && mount.verb.contains('/') {
                bail!("verb '{}' must be a single path segment", mount.verb);
            }
            if !seen.insert(mount.verb.as_str()) {
                bail!("verb '{}' is mounted twice", mount.verb);
            }
        }
        Ok(())
    }

    /// Register every mount on a fresh [`Application`].
    pub fn build_application(&self) -> anyhow::Result<Application> {
        self.validate()?;
        let mut app = Application::new();
        for mount in &self.mounts {
            let path = self.resolve(&mount.path);
            if !path.exists() {
                warn!(verb = %mount.verb, path = %path.display(), "mount path does not exist yet");
            }
            let options = mount.handler_options(&self.base_dir);
            match mount.kind {
                MountKind::Templates => {
                    app.register_verb(
                        mount.verb.as_str(),
                        ResourceServer::new(mount.template_compiler(), path, options),
                    );
                }
                MountKind::TemplateFile => {
                    app.register_verb(
                        mount.verb.as_str(),
                        ResourceFile::new(mount.template_compiler(), path, options),
                    );
                }
                MountKind::Stylesheets => {
                    app.register_verb(
                        mount.verb.as_str(),
                        ResourceServer::new(StylesheetCompiler::new(), path, options),
                    );
                }
                MountKind::StylesheetFile => {
                    app.register_verb(
                        mount.verb.as_str(),
                        ResourceFile::new(StylesheetCompiler::new(), path, options),
                    );
                }
                MountKind::Scripts => {
                    app.register_verb(
                        mount.verb.as_str(),
                        ResourceServer::new(ScriptCompiler::new(), path, options),
                    );
                }
                MountKind::ScriptFile => {
                    app.register_verb(
                        mount.verb.as_str(),
                        ResourceFile::new(ScriptCompiler::new(), path, options),
                    );
                }
            }
            info!(verb = %mount.verb, kind = %mount.kind, "mounted");
        }
        Ok(app)
    }
}
