//! Error types for configuration loading and view-state parsing.
//!
//! Runtime map operations never fail: unprojectable markers are dropped,
//! unknown layer ids resolve to no popup, empty input gives an empty layer.

use thiserror::Error;
use worldview_env::EnvError;

/// Invalid map configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid radius table: {0}")]
    RadiusTable(String),

    #[error("Invalid scheduler config: {0}")]
    Scheduler(String),

    #[error("Invalid escalation policy: {0}")]
    Escalation(String),

    #[error("Invalid zoom threshold for {layer}: {reason}")]
    Threshold { layer: String, reason: String },

    #[error("Invalid highlight TTL: {0} ms")]
    HighlightTtl(u64),
}

/// Invalid URL view-state parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewStateError {
    #[error("Parameter {param} is not a number: {value:?}")]
    NotANumber { param: &'static str, value: String },

    #[error("Parameter {param} out of range: {value}")]
    OutOfRange { param: &'static str, value: f64 },

    #[error("Unknown view preset: {0:?}")]
    UnknownView(String),

    #[error("Unknown layer: {0:?}")]
    UnknownLayer(String),

    #[error("Unknown time range: {0:?}")]
    UnknownTimeRange(String),
}

/// Any error surfaced by the map core.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    ViewState(#[from] ViewStateError),

    #[error(transparent)]
    Env(#[from] EnvError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
