//! Service configuration module.
//!
//! Handles loading, validating, and layering the service's TOML config.
//! Stock defaults are the base layer; the config file is merged on top, and
//! command-line overrides are merged on top of that.
//!
//! ## Configuration Options
//!
//! ```toml
//! # Everything except image_path is optional - defaults shown below
//!
//! image_path = "images"     # Source image directory (required)
//! cache_path = "cache"      # Derivative cache directory (omit to disable caching)
//! cache_url = "/cache/"     # Public URL of cache_path (omit if not exposed)
//! cache_ttl = 2592000       # Seconds a derivative stays valid (0 = forever)
//! default_width = 32        # Placeholder width when the request has none
//! default_height = 32       # Placeholder height when the request has none
//! default_quality = 90      # JPEG quality (1-100)
//! max_dimension = 8192      # Larger requested edges are clamped
//! route_prefix = "/"        # Where the image routes are mounted
//!
//! [placeholder]
//! background = "#eeeeee"
//! text_color = "#777777"
//! font_size = 12.0
//!
//! [server]
//! host = "0.0.0.0"
//! port = 3000
//!
//! [warm]
//! sizes = ["200x200xc"]     # Size tokens rendered by `warm`
//!
//! [processing]
//! max_processes = 4         # Max parallel warm workers (omit for auto = CPU cores)
//!
//! [transforms.default]      # Applied to every derivative
//! kind = "unsharpen"
//! sigma = 0.5
//! threshold = 1
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; only `image_path` is needed:
//!
//! ```toml
//! image_path = "/srv/images"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::cache::DerivativeCache;
use crate::fallback::Placeholder;
use crate::imaging::{Quality, Rgba};
use crate::size::is_size_token;
use crate::transform::{TransformRegistry, TransformSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("image_path is not configured")]
    MissingImagePath,
}

/// Service configuration.
///
/// All fields except `image_path` have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Directory holding the source images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    /// Directory for cached derivatives. Caching is off without it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
    /// Public URL prefix under which `cache_path` is served directly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_url: Option<String>,
    /// Seconds a cached derivative stays valid. 0 disables expiry.
    pub cache_ttl: u64,
    pub default_width: u32,
    pub default_height: u32,
    /// Encoding quality for lossy formats (1-100).
    pub default_quality: u32,
    /// Upper bound for any requested edge, in pixels.
    pub max_dimension: u32,
    /// URL path the image routes are mounted under.
    pub route_prefix: String,
    pub placeholder: PlaceholderConfig,
    pub server: ServerConfig,
    pub warm: WarmConfig,
    pub processing: ProcessingConfig,
    /// Named post-process hooks. The key `default` runs on every derivative.
    pub transforms: BTreeMap<String, TransformSpec>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            image_path: None,
            cache_path: None,
            cache_url: None,
            cache_ttl: 2_592_000,
            default_width: 32,
            default_height: 32,
            default_quality: 90,
            max_dimension: 8192,
            route_prefix: "/".to_string(),
            placeholder: PlaceholderConfig::default(),
            server: ServerConfig::default(),
            warm: WarmConfig::default(),
            processing: ProcessingConfig::default(),
            transforms: BTreeMap::new(),
        }
    }
}

impl ServiceConfig {
    /// A config with defaults everywhere and the given image directory.
    pub fn with_image_path(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: Some(image_path.into()),
            ..Self::default()
        }
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.image_path {
            None => return Err(ConfigError::MissingImagePath),
            Some(p) if p.as_os_str().is_empty() => return Err(ConfigError::MissingImagePath),
            Some(_) => {}
        }
        if !(1..=100).contains(&self.default_quality) {
            return Err(ConfigError::Validation(
                "default_quality must be 1-100".into(),
            ));
        }
        if self.default_width == 0 || self.default_height == 0 {
            return Err(ConfigError::Validation(
                "default_width and default_height must be non-zero".into(),
            ));
        }
        if self.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "max_dimension must be non-zero".into(),
            ));
        }
        if !self.route_prefix.starts_with('/') {
            return Err(ConfigError::Validation(
                "route_prefix must start with '/'".into(),
            ));
        }
        self.placeholder.validate()?;
        for token in &self.warm.sizes {
            if !is_size_token(token) {
                return Err(ConfigError::Validation(format!(
                    "warm.sizes: '{token}' is not a size token (expected e.g. 200x300 or 200x300xc)"
                )));
            }
        }
        for (key, spec) in &self.transforms {
            spec.validate()
                .map_err(|e| ConfigError::Validation(format!("transforms.{key}: {e}")))?;
        }
        Ok(())
    }

    /// The validated source directory.
    pub fn image_root(&self) -> Result<&Path, ConfigError> {
        self.image_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::MissingImagePath)
    }

    /// `cache_url` with a guaranteed trailing `/`.
    pub fn normalized_cache_url(&self) -> Option<String> {
        self.cache_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(with_trailing_slash)
    }

    /// `route_prefix` with a guaranteed trailing `/`.
    pub fn normalized_route_prefix(&self) -> String {
        with_trailing_slash(&self.route_prefix)
    }

    pub fn cache(&self) -> DerivativeCache {
        DerivativeCache::new(self.cache_path.clone(), self.cache_ttl)
    }

    pub fn transform_registry(&self) -> TransformRegistry {
        TransformRegistry::from_specs(&self.transforms)
    }

    /// Placeholder look, with colors parsed.
    pub fn placeholder(&self) -> Result<Placeholder, ConfigError> {
        Ok(Placeholder {
            default_width: self.default_width,
            default_height: self.default_height,
            max_edge: self.max_dimension,
            background: parse_color("placeholder.background", &self.placeholder.background)?,
            text_color: parse_color("placeholder.text_color", &self.placeholder.text_color)?,
            font_size: self.placeholder.font_size,
            quality: Quality::new(self.default_quality),
        })
    }
}

fn with_trailing_slash(s: &str) -> String {
    if s.ends_with('/') {
        s.to_string()
    } else {
        format!("{s}/")
    }
}

fn parse_color(key: &str, value: &str) -> Result<Rgba, ConfigError> {
    Rgba::parse_hex(value).ok_or_else(|| {
        ConfigError::Validation(format!("{key}: '{value}' is not a hex color"))
    })
}

/// Placeholder look.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderConfig {
    /// Canvas color (`#rgb`, `#rrggbb` or `#rrggbbaa`).
    pub background: String,
    /// Message color.
    pub text_color: String,
    /// Message size in pixels.
    pub font_size: f32,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            background: "#eeeeee".to_string(),
            text_color: "#777777".to_string(),
            font_size: 12.0,
        }
    }
}

impl PlaceholderConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        parse_color("placeholder.background", &self.background)?;
        parse_color("placeholder.text_color", &self.text_color)?;
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(ConfigError::Validation(
                "placeholder.font_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Cache pre-warming settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarmConfig {
    /// Size tokens rendered for every source image by `warm`.
    pub sizes: Vec<String>,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel warm workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ServiceConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge overlays onto a base value in order, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<ServiceConfig, ConfigError> {
    let merged = overlays.into_iter().fold(base, merge_toml);
    let config: ServiceConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the service config.
///
/// Layers, lowest first: stock defaults, the file at `path` (if given), then
/// `overrides` (typically built from command-line flags). Unknown keys are
/// rejected and the result is validated.
pub fn load_config(
    path: Option<&Path>,
    overrides: Option<toml::Value>,
) -> Result<ServiceConfig, ConfigError> {
    let file = path.map(load_raw_config).transpose()?;
    resolve_config(stock_defaults_value(), file.into_iter().chain(overrides))
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Image Resize Server Configuration
# =================================
# Only image_path is required. Values shown below are the defaults.
# Unknown keys will cause an error.

# Directory holding the source images (required).
image_path = "images"

# Directory for cached derivatives. Omit to disable caching.
# cache_path = "cache"

# Public URL under which cache_path is served directly (e.g. by a CDN or
# nginx). When set, generated URLs point straight at fresh cached files.
# cache_url = "/cache/"

# Seconds a cached derivative stays valid. 0 means derivatives only
# expire when their source changes.
cache_ttl = 2592000

# Placeholder size when the request does not specify one.
default_width = 32
default_height = 32

# JPEG encoding quality (1 = worst, 100 = best).
default_quality = 90

# Requested edges above this many pixels are clamped.
max_dimension = 8192

# URL path the image routes are mounted under.
route_prefix = "/"

# ---------------------------------------------------------------------------
# Placeholder images (missing or unreadable sources)
# ---------------------------------------------------------------------------
[placeholder]
background = "#eeeeee"
text_color = "#777777"
font_size = 12.0

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
host = "0.0.0.0"
port = 3000

# ---------------------------------------------------------------------------
# Cache pre-warming
# ---------------------------------------------------------------------------
[warm]
# Size tokens rendered for every source image by the `warm` command.
# sizes = ["200x200xc", "800x0"]
sizes = []

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel warm workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Post-process hooks
# ---------------------------------------------------------------------------
# Hooks are selected by the last part of a size token: 200x200xcxbw runs
# "bw". The hook named "default" runs on every derivative first.
# Kinds: grayscale, invert, blur (sigma), unsharpen (sigma, threshold),
# brighten (value), contrast (value), huerotate (degrees),
# flip_horizontal, flip_vertical, rotate (degrees: 90/180/270).
#
# [transforms.default]
# kind = "unsharpen"
# sigma = 0.5
# threshold = 1
#
# [transforms.bw]
# kind = "grayscale"
"##
}
