use std::path::PathBuf;

use thiserror::Error;

/// Errors related to application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file could not be read from disk.
    #[error("Failed to read config file {path}")]
    Read {
        /// The path that was attempted.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file was read but did not parse as valid TOML.
    #[error("Failed to parse config file {path}: {message}")]
    Parse {
        /// The path that was parsed.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },
}
