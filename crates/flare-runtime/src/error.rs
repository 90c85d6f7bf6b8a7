//! Runtime errors

use flare_core::VmError;
use thiserror::Error;

/// Errors raised while setting up or driving a player
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Failed to read the options file
    #[error("Failed to read player options: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML options
    #[error("Failed to parse player options: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize options
    #[error("Failed to serialize player options: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An option is out of range
    #[error("Invalid player options: {0}")]
    InvalidOptions(String),

    /// A worker thread could not be spawned
    #[error("Failed to spawn worker thread {index}: {source}")]
    Spawn {
        /// Worker index
        index: usize,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// A script-level error escaped to the embedder
    #[error(transparent)]
    Vm(#[from] VmError),
}
