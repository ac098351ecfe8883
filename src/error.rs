//! Error types for the interaction tracker

use thiserror::Error;

/// Result type alias for tracker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur around a tracking session.
///
/// The classifier itself never returns these: every failure inside it degrades
/// to "skip this signal". They surface from the collaborators (loader, player
/// factory, configuration, scenario files).
///
/// The type is `Clone` so a memoized bootstrap failure can be handed to every
/// caller waiting on the same load.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Failed to set up a session or runtime component
    #[error("Initialization failed: {0}")]
    InitializationError(String),

    /// The player bootstrap script could not be loaded
    #[error("Failed to load player bootstrap: {0}")]
    BootstrapError(String),

    /// The player factory or a player instance failed
    #[error("Player error: {0}")]
    PlayerError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Input did not resolve to a video identifier
    #[error("No video identifier found in {0:?}")]
    InvalidVideoId(String),

    /// A replay scenario was malformed
    #[error("Invalid scenario: {0}")]
    ScenarioError(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ScenarioError(err.to_string())
    }
}
