//! Error types for the demo binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and the demo run.

/// Top-level error for the demo binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: chronicle_core::config::ConfigError,
    },

    /// The world rejected an operation.
    #[error("world error: {source}")]
    Core {
        /// The underlying core error.
        #[from]
        source: chronicle_core::CoreError,
    },

    /// The demo could not be set up or made no progress.
    #[error("demo error: {message}")]
    Demo {
        /// Description of the failure.
        message: String,
    },
}
