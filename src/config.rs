//! Service configuration.
//!
//! Settings are resolved in three layers, each overriding the previous one:
//!
//! 1. Stock defaults ([`Settings::default`])
//! 2. An optional `config.toml` (path given on the command line)
//! 3. `IMAGE_DEPOT_*` environment variables
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! max_image_mb = 20          # Upload size cap, in MiB
//! max_pixels = 50000000      # Decode ceiling (width x height)
//! default_quality = 85       # JPEG quality when the caller gives none (1-95)
//! store_dir = ".image-depot" # Where uploaded images are kept
//! log_filter = "info"        # tracing filter used when RUST_LOG is unset
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{DEFAULT_MAX_PIXELS, MAX_QUALITY, MIN_QUALITY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_MAX_IMAGE_MB: &str = "IMAGE_DEPOT_MAX_IMAGE_MB";
pub const ENV_MAX_PIXELS: &str = "IMAGE_DEPOT_MAX_PIXELS";
pub const ENV_DEFAULT_QUALITY: &str = "IMAGE_DEPOT_DEFAULT_QUALITY";
pub const ENV_STORE_DIR: &str = "IMAGE_DEPOT_STORE_DIR";
pub const ENV_LOG_FILTER: &str = "IMAGE_DEPOT_LOG_FILTER";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("invalid value for {name}: {value:?}")]
    Env { name: &'static str, value: String },
}

/// Service settings.
///
/// All fields have defaults; a config file need only name the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Largest accepted upload, in MiB.
    pub max_image_mb: u64,
    /// Largest accepted source image, as width × height.
    pub max_pixels: u64,
    /// Quality used when an upload does not specify one.
    pub default_quality: u8,
    /// Directory of the filesystem image store.
    pub store_dir: PathBuf,
    /// `tracing` filter directive, used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_image_mb: 20,
            max_pixels: DEFAULT_MAX_PIXELS,
            default_quality: 85,
            store_dir: PathBuf::from(".image-depot"),
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&self.default_quality) {
            return Err(ConfigError::Validation(format!(
                "default_quality must be {MIN_QUALITY}-{MAX_QUALITY}"
            )));
        }
        if self.max_pixels == 0 {
            return Err(ConfigError::Validation("max_pixels must be positive".into()));
        }
        if self.max_image_mb == 0 {
            return Err(ConfigError::Validation("max_image_mb must be positive".into()));
        }
        Ok(())
    }

    /// Apply `IMAGE_DEPOT_*` overrides read through `lookup`.
    ///
    /// Takes the lookup as a function so tests need not touch the process
    /// environment.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup(ENV_MAX_IMAGE_MB) {
            self.max_image_mb = parse_env(ENV_MAX_IMAGE_MB, v)?;
        }
        if let Some(v) = lookup(ENV_MAX_PIXELS) {
            self.max_pixels = parse_env(ENV_MAX_PIXELS, v)?;
        }
        if let Some(v) = lookup(ENV_DEFAULT_QUALITY) {
            self.default_quality = parse_env(ENV_DEFAULT_QUALITY, v)?;
        }
        if let Some(v) = lookup(ENV_STORE_DIR) {
            self.store_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_LOG_FILTER) {
            self.log_filter = v;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { name, value })
}

// =============================================================================
// Config loading and validation
// =============================================================================

/// Parse settings from TOML text. Missing keys take their defaults.
pub fn parse_settings(content: &str) -> Result<Settings, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Resolve settings from defaults, an optional config file, and the
/// variables visible through `lookup`, then validate the result.
pub fn resolve_settings(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Settings, ConfigError> {
    let mut settings = match path {
        Some(path) => parse_settings(&fs::read_to_string(path)?)?,
        None => Settings::default(),
    };
    settings.apply_env(lookup)?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings using the process environment.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    resolve_settings(path, |name| std::env::var(name).ok())
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Image Depot Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Every key can also be set through the environment, which wins over this file:
#   IMAGE_DEPOT_MAX_IMAGE_MB, IMAGE_DEPOT_MAX_PIXELS,
#   IMAGE_DEPOT_DEFAULT_QUALITY, IMAGE_DEPOT_STORE_DIR, IMAGE_DEPOT_LOG_FILTER
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Upload limits
# ---------------------------------------------------------------------------

# Largest accepted upload in MiB. Reading stops as soon as this is exceeded.
max_image_mb = 20

# Largest accepted source image as width x height. Checked from the image
# header, before any pixel data is decoded.
max_pixels = 50000000

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------

# JPEG quality used when an upload gives none (1 = worst, 95 = best).
default_quality = 85

# ---------------------------------------------------------------------------
# Storage and logging
# ---------------------------------------------------------------------------

# Directory holding stored images and their metadata sidecars.
store_dir = ".image-depot"

# Log filter (tracing EnvFilter syntax). RUST_LOG takes precedence.
log_filter = "info"
"##
}
