//! Error types for the simulation harness.

use thiserror::Error;
use worldview_core::ConfigError;

#[derive(Debug, Error)]
pub enum SimError {
    /// The map core rejected the scenario's configuration
    #[error("map configuration rejected: {0}")]
    Config(#[from] ConfigError),

    /// A feed distribution could not be built from its parameters
    #[error("invalid feed distribution: {0}")]
    Distribution(String),
}
