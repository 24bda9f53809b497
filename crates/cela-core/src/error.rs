//! Error types for cela-core

use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// No `parsers_dir` is configured.
    #[error(
        "no parsers_dir configured (set it in ~/.config/cela/config.yml or pass --config)"
    )]
    MissingParsersDir,
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
