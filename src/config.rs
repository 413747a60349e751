//! Configuration for the Canopy S3 gateway

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address to listen on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Backing-store configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Store directory whose immediate children are the buckets
    #[serde(default = "default_bucket_path")]
    pub bucket_path: String,

    /// Durability level used when a request names no storage class
    #[serde(default = "default_durability")]
    pub default_durability: i32,

    /// Maximum length of a full store path (root + bucket + key)
    #[serde(default = "default_max_filename_length")]
    pub max_filename_length: usize,

    /// Indent XML response bodies
    #[serde(default)]
    pub pretty_print: bool,

    /// S3 API version baked into every response namespace
    #[serde(default = "default_s3_version")]
    pub s3_version: String,

    /// Storage class -> durability level, applied to uploads
    #[serde(default = "default_class_to_durability")]
    pub storage_class_mapping_to_durability: HashMap<String, i32>,

    /// Durability level (as a string key) -> storage class, applied to
    /// downloads and listings
    #[serde(default = "default_durability_to_class")]
    pub durability_mapping_to_storage_class: HashMap<String, String>,

    /// Identity reported as the owner of every bucket and object
    #[serde(default = "default_store_user")]
    pub store_user: String,

    /// Log level filter string.
    /// Set via config file or CANOPY_LOG_LEVEL env var. Overridden by RUST_LOG.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Backing-store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Filesystem-backed tree store
    Filesystem {
        /// Directory holding the store
        path: PathBuf,
    },
}

// Default value functions for serde
fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:9980".parse().unwrap()
}

fn default_bucket_path() -> String {
    "/buckets".to_string()
}

fn default_durability() -> i32 {
    2
}

fn default_max_filename_length() -> usize {
    1024
}

fn default_s3_version() -> String {
    "2006-03-01".to_string()
}

fn default_class_to_durability() -> HashMap<String, i32> {
    HashMap::from([
        ("STANDARD".to_string(), 2),
        ("STANDARD_IA".to_string(), 2),
        ("REDUCED_REDUNDANCY".to_string(), 1),
        ("GLACIER".to_string(), 1),
    ])
}

fn default_durability_to_class() -> HashMap<String, String> {
    HashMap::from([
        ("1".to_string(), "REDUCED_REDUNDANCY".to_string()),
        ("2".to_string(), "STANDARD".to_string()),
    ])
}

fn default_store_user() -> String {
    "storage".to_string()
}

fn default_log_level() -> String {
    "canopy=debug,tower_http=info".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Filesystem {
            path: PathBuf::from("./data"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            backend: BackendConfig::default(),
            bucket_path: default_bucket_path(),
            default_durability: default_durability(),
            max_filename_length: default_max_filename_length(),
            pretty_print: false,
            s3_version: default_s3_version(),
            storage_class_mapping_to_durability: default_class_to_durability(),
            durability_mapping_to_storage_class: default_durability_to_class(),
            store_user: default_store_user(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("CANOPY_LISTEN_ADDR") {
            if let Ok(parsed) = addr.parse() {
                config.listen_addr = parsed;
            }
        }

        if let Ok(dir) = std::env::var("CANOPY_DATA_DIR") {
            config.backend = BackendConfig::Filesystem {
                path: PathBuf::from(dir),
            };
        }

        if let Ok(path) = std::env::var("CANOPY_BUCKET_PATH") {
            config.bucket_path = path;
        }

        if let Ok(durability) = std::env::var("CANOPY_DEFAULT_DURABILITY") {
            if let Ok(parsed) = durability.parse() {
                config.default_durability = parsed;
            }
        }

        if let Ok(len) = std::env::var("CANOPY_MAX_FILENAME_LENGTH") {
            if let Ok(parsed) = len.parse() {
                config.max_filename_length = parsed;
            }
        }

        if let Ok(pretty) = std::env::var("CANOPY_PRETTY_PRINT") {
            config.pretty_print = pretty == "true" || pretty == "1";
        }

        if let Ok(user) = std::env::var("CANOPY_STORE_USER") {
            config.store_user = user;
        }

        if let Ok(level) = std::env::var("CANOPY_LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Load configuration from file if it exists, otherwise from environment
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("CANOPY_CONFIG") {
            if let Ok(config) = Self::from_file(&path) {
                return config;
            }
        }

        for path in &["canopy.toml", "/etc/canopy/config.toml"] {
            if std::path::Path::new(path).exists() {
                if let Ok(config) = Self::from_file(path) {
                    return config;
                }
            }
        }

        Self::from_env()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
