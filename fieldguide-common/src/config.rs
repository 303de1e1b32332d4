//! Bootstrap configuration and root folder resolution
//!
//! Configuration is two-tier:
//! 1. **TOML bootstrap**: root folder, port, logging, intake tuning
//! 2. **Database runtime**: per-installation settings in the `settings` table
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `FIELDGUIDE_ROOT_FOLDER`
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file never aborts startup; defaults are used and a warning is logged.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "FIELDGUIDE_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "fieldguide.db";

/// Blob directory name inside the root folder
pub const BLOB_DIR: &str = "blobs";

/// Bootstrap configuration loaded from TOML
///
/// Cannot change while the service is running.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for database and blobs
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Base URL blobs are published under (e.g. `http://10.0.0.5:5731`)
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Ticket intake tuning
    #[serde(default)]
    pub intake: IntakeSettings,

    /// Signed-in guide's user id (lowest-priority source)
    #[serde(default)]
    pub guide_user_id: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Ticket intake tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeSettings {
    /// Re-trigger cool-down for the same ticket reference (milliseconds)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// How far ahead a tour may start and still be selected as active (minutes)
    #[serde(default = "default_active_window_minutes")]
    pub active_window_minutes: i64,

    /// Blob bucket ticket photos are uploaded to
    #[serde(default = "default_photo_bucket")]
    pub photo_bucket: String,

    /// EventBus channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            active_window_minutes: default_active_window_minutes(),
            photo_bucket: default_photo_bucket(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cooldown_ms() -> u64 {
    2000
}

fn default_active_window_minutes() -> i64 {
    60
}

fn default_photo_bucket() -> String {
    "ticket-photos".to_string()
}

fn default_event_capacity() -> usize {
    100
}

/// Compiled defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was built for
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/fieldguide
        dirs::data_local_dir()
            .map(|d| d.join("fieldguide"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/fieldguide"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("fieldguide"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/fieldguide"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("fieldguide"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\fieldguide"))
    } else {
        PathBuf::from("./fieldguide_data")
    }
}

/// Default TOML path for a module: `<config dir>/fieldguide/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fieldguide").join(format!("{}.toml", module_name)))
}

/// Load TOML bootstrap config
///
/// A missing file yields defaults with a warning; a malformed file is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    info!("Loaded TOML configuration from {}", path.display());
    Ok(config)
}

/// Write TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolves the root folder from CLI, environment, TOML and compiled defaults
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_root: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_root: None,
            toml_root: None,
        }
    }

    pub fn with_cli(mut self, cli_root: Option<PathBuf>) -> Self {
        self.cli_root = cli_root;
        self
    }

    pub fn with_toml(mut self, toml_root: Option<PathBuf>) -> Self {
        self.toml_root = toml_root;
        self
    }

    /// Resolve the root folder (never fails; falls back to the compiled default)
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_root {
            info!(module = %self.module_name, "Root folder: {} (command line)", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder: {} ({})", path, ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            info!(module = %self.module_name, "Root folder: {} (TOML)", path.display());
            return path.clone();
        }

        let path = CompiledDefaults::for_current_platform().root_folder;
        info!(module = %self.module_name, "Root folder: {} (compiled default)", path.display());
        path
    }
}

/// Creates the root folder layout on first start
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder and blob directory if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.blob_root())?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn blob_root(&self) -> PathBuf {
        self.root_folder.join(BLOB_DIR)
    }
}
