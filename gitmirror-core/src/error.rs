//! Error types for gitmirror-core.

use thiserror::Error;

/// Pre-flight configuration failures. None of these ever reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no source repository provided")]
    MissingSource,

    #[error("no destination repository provided")]
    MissingDestination,

    /// Known hosts were given both by value and by file path.
    #[error("host public keys provided via both file path and content")]
    ConflictingHostKeySources,

    #[error("SSH authentication requires host public keys")]
    MissingHostKeySource,
}
