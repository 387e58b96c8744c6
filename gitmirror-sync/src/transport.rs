//! Seams between the mirror protocol and the version-control backend.
//!
//! [`RefStore`] is the repository view the filter and diff engine work on.
//! [`Transport`] moves references between a privately owned staging
//! repository and remote repositories addressed by URL.

use gitmirror_core::{RefName, RefSpec, Reference};

use crate::auth::AuthMethod;
use crate::error::GitError;

/// Branch a fresh staging repository's `HEAD` points at.
pub const DEFAULT_HEAD_TARGET: &str = "refs/heads/master";

/// Result of a fetch or push that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// At least one reference was created, moved or deleted.
    Updated,
    /// Nothing to do; the other side already matched.
    UpToDate,
}

/// Reference enumeration and mutation over one repository.
///
/// Enumeration is always fresh: callers must not reuse a listing across a
/// mutation.
pub trait RefStore {
    /// Every reference currently held, in no particular order.
    fn references(&self) -> Result<Vec<Reference>, GitError>;

    /// Create or overwrite a reference.
    fn set_reference(&mut self, reference: &Reference) -> Result<(), GitError>;

    /// Remove a reference. Removing a missing reference is an error.
    fn remove_reference(&mut self, name: &RefName) -> Result<(), GitError>;
}

/// Fetch, push and listing against remote repositories.
pub trait Transport {
    /// Repository type used to stage the source's references.
    type Staging: RefStore;

    /// Create a fresh, empty staging repository owned by the caller.
    fn init_staging(&self) -> Result<Self::Staging, GitError>;

    /// Fetch `specs` from `remote` into `staging`.
    fn fetch(
        &self,
        staging: &mut Self::Staging,
        remote: &str,
        specs: &[RefSpec],
    ) -> Result<Outcome, GitError>;

    /// Push `specs` from `staging` to `remote`.
    fn push(
        &self,
        staging: &Self::Staging,
        remote: &str,
        specs: &[RefSpec],
        force: bool,
        auth: Option<&AuthMethod>,
    ) -> Result<Outcome, GitError>;

    /// References advertised by `remote`.
    fn list_remote_refs(
        &self,
        remote: &str,
        auth: Option<&AuthMethod>,
    ) -> Result<Vec<Reference>, GitError>;
}

/// Map `name` through a `src` pattern onto `dst`.
///
/// Patterns ending in `*` match by prefix and carry the matched suffix over;
/// anything else must match exactly.
pub fn map_through(name: &str, src: &str, dst: &str) -> Option<String> {
    match (src.strip_suffix('*'), dst.strip_suffix('*')) {
        (Some(src_prefix), Some(dst_prefix)) => name
            .strip_prefix(src_prefix)
            .map(|rest| format!("{dst_prefix}{rest}")),
        (None, _) if name == src => Some(dst.to_string()),
        _ => None,
    }
}
