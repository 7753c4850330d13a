//! Error types for Akeray.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AkerayError>;

#[derive(Error, Debug)]
pub enum AkerayError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AkerayError {
    /// Short machine-readable kind, logged as the `kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            AkerayError::Config(_) => "config",
            AkerayError::Metrics(_) => "metrics",
            AkerayError::Io(_) => "io",
            AkerayError::Toml(_) => "toml",
        }
    }
}
