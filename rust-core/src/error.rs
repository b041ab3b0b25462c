//! Error types.
//!
//! Classifiers never fail: any `{x, y, z}` is either classified or dropped.
//! Errors only exist at the edges of the engine, where text comes in (config
//! files, sample lines, notification lines) or where a caller talks to the
//! service task.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration file could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// An `x y z` sample line was malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("missing {axis} axis")]
    MissingAxis { axis: char },

    #[error("invalid {axis} axis value '{value}'")]
    InvalidAxis { axis: char, value: String },

    #[error("unexpected trailing input '{0}'")]
    TrailingInput(String),
}

/// A notification line could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("missing ' = ' separator in '{0}'")]
    MissingSeparator(String),

    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    #[error("malformed value '{0}', expected type:value")]
    MalformedValue(String),

    #[error("property {property} does not carry a {type_tag} value")]
    TypeMismatch {
        property: String,
        type_tag: String,
    },

    #[error("invalid edge label '{0}'")]
    InvalidEdge(String),

    #[error("invalid bool '{0}'")]
    InvalidBool(String),
}

/// The service task is no longer running.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("context service has shut down")]
    Closed,
}

pub type ConfigResult<T> = Result<T, ConfigError>;
