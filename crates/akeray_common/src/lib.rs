//! Shared types for Akeray components.
//!
//! Holds the wire-level error shape, the status classification, the health
//! payload and the daemon configuration. Nothing here depends on the HTTP stack.

pub mod config;
pub mod error;
pub mod health;
pub mod outcome;
pub mod status;

pub use config::{AkerayConfig, LoggingConfig, ServerConfig, CONFIG_PATH, DEFAULT_CONFIG_PATH};
pub use error::{AkerayError, Result};
pub use health::HealthResponse;
pub use outcome::Outcome;
pub use status::{ErrorBody, StatusClass};
