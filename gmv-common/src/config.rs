//! Configuration loading and root folder resolution
//!
//! Every setting is resolved with the same priority order:
//! 1. Command-line argument (highest priority; clap also folds in `GMV_*` env vars)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unparsable TOML file never stops startup: it is logged and the
//! compiled defaults are used instead.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ENV_ROOT_FOLDER: &str = "GMV_ROOT_FOLDER";
/// Environment variable overriding the backend base URL
pub const ENV_API_BASE_URL: &str = "GMV_API_BASE_URL";
/// Environment variable carrying the backend bearer token
pub const ENV_API_TOKEN: &str = "GMV_API_TOKEN";

/// Local state database filename inside the root folder
pub const DATABASE_FILENAME: &str = "gmv.db";

/// Default HTTP port for gmv-ui
pub const DEFAULT_PORT: u16 = 5790;

/// Compiled-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub api_base_url: String,
    pub bind_host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub tile_url: String,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was compiled for
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            api_base_url: "http://127.0.0.1:8000/api".to_string(),
            bind_host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            request_timeout_secs: 30,
            tile_url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// OS-dependent default root folder for local UI state
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("gmv"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/gmv"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("gmv"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/gmv"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("gmv"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\gmv"))
    } else {
        PathBuf::from("./gmv_data")
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Thresholds for movement data-quality flags
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QualityConfig {
    /// Endpoint confidence below this marks a segment as low confidence
    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f64,

    /// Implied travel speed above this (km per year) marks a segment as suspicious
    #[serde(default = "default_max_km_per_year")]
    pub max_km_per_year: f64,
}

fn default_low_confidence_threshold() -> f64 {
    0.5
}

fn default_max_km_per_year() -> f64 {
    3000.0
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: default_low_confidence_threshold(),
            max_km_per_year: default_max_km_per_year(),
        }
    }
}

/// On-disk TOML configuration; every field is optional
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub api_base_url: Option<String>,

    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default)]
    pub bind_host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    #[serde(default)]
    pub tile_url: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub quality: QualityConfig,
}

/// Values supplied on the command line (or via clap's env fallback)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub bind_host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub root_folder: PathBuf,
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub bind_host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub tile_url: String,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub quality: QualityConfig,
}

impl Settings {
    /// Merge CLI overrides, environment, TOML and compiled defaults
    pub fn resolve(cli: CliOverrides, toml_config: Option<TomlConfig>) -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        let toml_config = toml_config.unwrap_or_default();

        let root_folder = cli
            .root_folder
            .or_else(|| std::env::var(ENV_ROOT_FOLDER).ok().map(PathBuf::from))
            .or(toml_config.root_folder)
            .unwrap_or(defaults.root_folder);

        let api_base_url = cli
            .api_base_url
            .or_else(|| std::env::var(ENV_API_BASE_URL).ok())
            .or(toml_config.api_base_url)
            .unwrap_or(defaults.api_base_url);

        let api_token = cli
            .api_token
            .or_else(|| std::env::var(ENV_API_TOKEN).ok())
            .or(toml_config.api_token)
            .filter(|t| !t.trim().is_empty());

        Self {
            root_folder,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_token,
            bind_host: cli
                .bind_host
                .or(toml_config.bind_host)
                .unwrap_or(defaults.bind_host),
            port: cli.port.or(toml_config.port).unwrap_or(defaults.port),
            request_timeout_secs: toml_config
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
            tile_url: toml_config.tile_url.unwrap_or(defaults.tile_url),
            log_level: cli
                .log_level
                .or(toml_config.logging.level)
                .unwrap_or(defaults.log_level),
            log_file: toml_config.logging.file.or(defaults.log_file),
            quality: toml_config.quality,
        }
    }
}

/// Locate the TOML config file for a module
///
/// Checks `~/.config/gmv/<module>.toml`, then `/etc/gmv/<module>.toml` on Linux.
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    let filename = format!("{}.toml", module_name);
    let user_config = dirs::config_dir().map(|d| d.join("gmv").join(&filename));

    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/gmv").join(&filename);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load a TOML config file, degrading to `None` on any problem
pub fn load_toml_config(path: &Path) -> Option<TomlConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Config file {} not readable ({}), using defaults", path.display(), e);
            return None;
        }
    };

    match toml::from_str::<TomlConfig>(&content) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            Some(config)
        }
        Err(e) => {
            warn!("Config file {} is invalid ({}), using defaults", path.display(), e);
            None
        }
    }
}

/// Prepares the root folder that holds local UI state
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and parents) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    /// Path of the local state database
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILENAME)
    }
}
