pub mod loader;
pub mod schema;

use std::path::PathBuf;
use thiserror::Error;

pub use loader::{load_filter_config, load_filter_config_from_str};
pub use schema::{FilterConfig, SocialRules};

/// Errors from loading or validating filter rule configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid alert subject pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
