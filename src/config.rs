//! Host configuration
//!
//! Loaded from `hostbridge.toml`:
//!
//! ```toml
//! [host]
//! extension_point = "com.apple.watchkit"
//! platform = "watchos"
//!
//! [logging]
//! level = "debug"
//! verbosity = 1
//!
//! [launch]
//! trace_launch_time = true
//! root_assembly = "App"
//! assembly_path = ["Frameworks/Managed"]
//! ```

use crate::assembly::DirectoryLoader;
use crate::entry::{ContextSelection, HostContext, Platform};
use crate::error::{BridgeError, Result};
use crate::logging::{self, LogConfig, LogOutput};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name searched for by [`BridgeConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "hostbridge.toml";

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "HOSTBRIDGE_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub launch: LaunchConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Context declared explicitly
    #[serde(default)]
    pub context: Option<HostContext>,

    /// `NSExtensionPointIdentifier` of the bundle, if it is an extension
    #[serde(default)]
    pub extension_point: Option<String>,

    /// Target platform; defaults to the one this binary was built for
    #[serde(default)]
    pub platform: Option<Platform>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_format")]
    pub format: String,

    /// Directory for rotated log files; stderr when unset
    #[serde(default)]
    pub directory: Option<String>,

    #[serde(default)]
    pub span_events: bool,

    #[serde(default)]
    pub filter: Option<String>,

    /// Bridge diagnostic verbosity, 0 = silent
    #[serde(default)]
    pub verbosity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchConfig {
    #[serde(default)]
    pub trace_launch_time: bool,

    /// Assembly opened before the entry function runs
    #[serde(default)]
    pub root_assembly: Option<String>,

    /// Directories searched for assembly files; relative entries are taken
    /// from the executable's directory, which is searched when this is empty
    #[serde(default)]
    pub assembly_path: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            directory: None,
            span_events: false,
            filter: None,
            verbosity: 0,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "compact".to_string()
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Path of the nearest `hostbridge.toml` in `start` or its parents
    pub fn find(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|path| path.is_file())
    }

    /// Load the nearest `hostbridge.toml` above `start`, or defaults if there
    /// is none
    pub fn discover_from(start: &Path) -> Result<Self> {
        match Self::find(start) {
            Some(path) => {
                tracing::debug!(event = "config_found", path = %path.display());
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Load the nearest `hostbridge.toml` above the working directory
    pub fn discover() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::discover_from(&cwd)
    }

    /// `HOSTBRIDGE_CONFIG` if set, otherwise [`discover`](Self::discover)
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Self::discover(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.host.platform.unwrap_or_default()
    }

    /// Contexts this configuration declares eligible
    ///
    /// An explicit `context` and an `extension_point` each contribute one.
    pub fn eligible_contexts(&self) -> Vec<HostContext> {
        let mut eligible = Vec::with_capacity(2);
        if let Some(context) = self.host.context {
            eligible.push(context);
        }
        if let Some(point) = self.host.extension_point.as_deref() {
            eligible.push(HostContext::from_extension_point(Some(point), self.platform()));
        }
        eligible
    }

    /// Active context for a binary built for `build`
    ///
    /// A configuration that declares nothing selects `build`. An extension
    /// build stays eligible whatever the configuration declares, so a
    /// configuration naming another context is rejected.
    pub fn selection(&self, build: HostContext) -> Result<ContextSelection> {
        let mut eligible = self.eligible_contexts();
        if eligible.is_empty() || build.is_extension() {
            eligible.insert(0, build);
        }
        ContextSelection::exclusive_on(eligible, self.platform())
    }

    /// Logging configuration described by the `[logging]` section, before
    /// environment overrides
    pub fn log_config(&self) -> Result<LogConfig> {
        let section = &self.logging;

        let level = logging::parse_level(&section.level).ok_or_else(|| {
            BridgeError::InvalidConfig(format!("unknown log level '{}'", section.level))
        })?;
        let format = logging::parse_format(&section.format).ok_or_else(|| {
            BridgeError::InvalidConfig(format!("unknown log format '{}'", section.format))
        })?;

        let mut config = LogConfig::new()
            .with_level(level)
            .with_format(format)
            .with_span_events(section.span_events)
            .with_bridge_level(section.verbosity);

        if let Some(directory) = &section.directory {
            config = config.with_output(LogOutput::File {
                directory: directory.clone(),
                prefix: "hostbridge.log".to_string(),
            });
        }
        if let Some(filter) = &section.filter {
            config = config.with_filter(filter.clone());
        }

        Ok(config)
    }

    /// Loader over the configured assembly directories, resolved against
    /// `base`
    pub fn assembly_loader_in(&self, base: &Path) -> DirectoryLoader {
        if self.launch.assembly_path.is_empty() {
            return DirectoryLoader::new([base]);
        }
        DirectoryLoader::new(self.launch.assembly_path.iter().map(|dir| base.join(dir)))
    }

    /// [`assembly_loader_in`](Self::assembly_loader_in) the directory of the
    /// running executable
    pub fn assembly_loader(&self) -> Result<DirectoryLoader> {
        let exe = std::env::current_exe()?;
        let base = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(self.assembly_loader_in(base))
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BridgeError::InvalidConfig(e.to_string()))
    }
}
