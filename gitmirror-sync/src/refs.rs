//! Reference filtering and the prune diff.
//!
//! [`filter_out`] narrows a staging repository to the references that should
//! reach the destination. [`prune_specs`] then compares that view with what
//! the destination advertises and yields the delete refspecs for everything
//! the destination holds that the filtered source does not.

use std::collections::HashSet;

use gitmirror_core::{RefName, RefSpec, Reference};

use crate::error::GitError;
use crate::transport::RefStore;

/// Remove from `store` every reference whose name starts with any of
/// `exclude_prefixes`.
///
/// Each reference is removed at most once even when several prefixes match.
/// An empty prefix list does not touch the store; the empty prefix matches
/// every name. The first failed removal aborts the walk; references removed
/// before it stay removed.
pub fn filter_out<S, P>(store: &mut S, exclude_prefixes: &[P]) -> Result<Vec<RefName>, GitError>
where
    S: RefStore + ?Sized,
    P: AsRef<str>,
{
    if exclude_prefixes.is_empty() {
        return Ok(Vec::new());
    }

    let mut removed = Vec::new();
    for reference in store.references()? {
        let excluded = exclude_prefixes
            .iter()
            .any(|prefix| reference.name.has_prefix(prefix.as_ref()));
        if excluded {
            store.remove_reference(&reference.name)?;
            tracing::debug!("filtered out: {}", reference.name);
            removed.push(reference.name);
        }
    }
    Ok(removed)
}

/// The elements of `candidate` whose name does not appear in `baseline`.
///
/// Comparison is by name only: a reference present on both sides with a
/// different target is not extra. Candidate order and duplicates are kept.
pub fn extra_references(baseline: &[Reference], candidate: &[Reference]) -> Vec<Reference> {
    let known: HashSet<&RefName> = baseline.iter().map(|r| &r.name).collect();
    candidate
        .iter()
        .filter(|r| !known.contains(&r.name))
        .cloned()
        .collect()
}

/// One delete refspec per reference, in input order, duplicates included.
pub fn to_delete_specs(refs: &[Reference]) -> Vec<RefSpec> {
    refs.iter().map(|r| RefSpec::delete(r.name.clone())).collect()
}

/// Delete refspecs for every `candidate` reference missing from `baseline`.
pub fn prune_specs(baseline: &[Reference], candidate: &[Reference]) -> Vec<RefSpec> {
    to_delete_specs(&extra_references(baseline, candidate))
}
