//! Tracing subscriber setup
//!
//! The subscriber is installed before config is read so config loading can
//! log. `[logging].level` is applied afterwards through a reload handle,
//! unless `--log-level` or RUST_LOG already chose the filter.

use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

/// Filter used until the config file has been read
pub const BOOTSTRAP_LEVEL: &str = "info";

/// Where the active filter directive came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSource {
    Cli(String),
    Env(String),
    Bootstrap,
}

impl FilterSource {
    /// `--log-level` wins over RUST_LOG, which wins over the bootstrap level
    pub fn select(cli_level: Option<&str>, env_level: Option<&str>) -> Self {
        match (cli_level, env_level) {
            (Some(level), _) => FilterSource::Cli(level.to_string()),
            (None, Some(level)) if !level.trim().is_empty() => FilterSource::Env(level.to_string()),
            _ => FilterSource::Bootstrap,
        }
    }

    pub fn directive(&self) -> &str {
        match self {
            FilterSource::Cli(level) | FilterSource::Env(level) => level,
            FilterSource::Bootstrap => BOOTSTRAP_LEVEL,
        }
    }

    /// Whether the config file may still replace the filter
    pub fn accepts_config(&self) -> bool {
        matches!(self, FilterSource::Bootstrap)
    }
}

/// Handle for applying the configured level after startup
pub struct LogHandle {
    source: FilterSource,
    handle: reload::Handle<EnvFilter, Registry>,
}

/// Install the global subscriber
pub fn init(cli_level: Option<&str>) -> LogHandle {
    let env_level = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let source = FilterSource::select(cli_level, env_level.as_deref());

    let (filter, handle) = reload::Layer::new(EnvFilter::new(source.directive()));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    LogHandle { source, handle }
}

impl LogHandle {
    /// Switch to `[logging].level` when nothing more specific was given
    pub fn apply_config_level(&self, level: &str) -> Result<(), reload::Error> {
        if !self.source.accepts_config() {
            return Ok(());
        }
        self.handle.reload(EnvFilter::new(level))
    }
}
