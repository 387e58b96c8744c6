//! # gitmirror-sync
//!
//! Reference reconciliation and the mirror pipeline.
//!
//! Call [`mirror`] with a validated [`gitmirror_core::Config`] and a
//! [`Transport`] ([`GitCli`] in production, [`MemoryTransport`] in tests) to
//! make the destination match the filtered source.

pub mod auth;
pub mod error;
pub mod git_cli;
pub mod memory;
pub mod pipeline;
pub mod refs;
pub mod transport;

pub use auth::AuthMethod;
pub use error::{AuthError, GitError, MirrorError};
pub use git_cli::{BareRepo, GitCli};
pub use memory::{MemoryRepo, MemoryTransport};
pub use pipeline::{mirror, mirror_excluding, MirrorReport, Stage, DEFAULT_EXCLUDE_PREFIXES};
pub use refs::{extra_references, filter_out, prune_specs, to_delete_specs};
pub use transport::{Outcome, RefStore, Transport};
