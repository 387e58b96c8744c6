//! Error types for gitmirror-sync.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::Stage;

/// Failures reported by a transport or a reference store.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` executable exited unsuccessfully.
    #[error("git command failed: git {args:?}: {stderr}")]
    CommandFailed { args: Vec<String>, stderr: String },

    #[error("git is not installed or not in PATH")]
    GitNotInstalled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output from git that could not be parsed as a reference listing.
    #[error("unexpected git output: {0}")]
    Malformed(String),

    #[error("remote not found: {0}")]
    RemoteNotFound(String),

    #[error("reference not found: {0}")]
    RefNotFound(String),

    /// A non-forced update would move an existing reference.
    #[error("rejected non-forced update of {0}")]
    Rejected(String),

    /// Failure injected through the in-memory transport.
    #[error("{0}")]
    Injected(String),
}

/// Failures while building SSH authentication material.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to set up the SSH key: {0}")]
    InvalidKey(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`AuthError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> AuthError {
    AuthError::Io {
        path: path.into(),
        source,
    }
}

/// A mirror operation failure, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("failed to stage the source repository: {0}")]
    Staging(#[source] GitError),

    #[error("failed to filter out the refs: {0}")]
    Filter(#[source] GitError),

    #[error("failed to set up authentication: {0}")]
    AuthSetup(#[from] AuthError),

    #[error("failed to push to destination: {0}")]
    Push(#[source] GitError),

    #[error("failed to list the destination remote: {0}")]
    List(#[source] GitError),

    #[error("failed to prune destination: {0}")]
    Prune(#[source] GitError),
}

impl MirrorError {
    /// The stage at which the mirror operation stopped.
    pub fn stage(&self) -> Stage {
        match self {
            MirrorError::Staging(_) => Stage::Staging,
            MirrorError::Filter(_) => Stage::Filter,
            MirrorError::AuthSetup(_) => Stage::Auth,
            MirrorError::Push(_) => Stage::Push,
            MirrorError::List(_) => Stage::List,
            MirrorError::Prune(_) => Stage::Prune,
        }
    }
}
