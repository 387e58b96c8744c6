//! In-memory repositories and transport.
//!
//! [`MemoryTransport`] serves remotes from a map of URL to [`MemoryRepo`].
//! It follows the same contract as the `git` backed transport, including the
//! up-to-date sentinel, so the mirror pipeline can run without touching the
//! filesystem or the network. Failures can be injected per operation.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use gitmirror_core::{RefName, RefSpec, RefTarget, Reference};

use crate::auth::AuthMethod;
use crate::error::GitError;
use crate::transport::{map_through, Outcome, RefStore, Transport, DEFAULT_HEAD_TARGET};

// ---------------------------------------------------------------------------
// MemoryRepo
// ---------------------------------------------------------------------------

/// A repository that only holds references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRepo {
    refs: BTreeMap<RefName, RefTarget>,
    /// Removals left before [`RefStore::remove_reference`] starts failing.
    removals_before_failure: Option<usize>,
    /// Enumerations left before [`RefStore::references`] starts failing.
    enumerations_before_failure: Cell<Option<usize>>,
}

impl Default for MemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepo {
    /// An empty repository whose `HEAD` points at [`DEFAULT_HEAD_TARGET`].
    pub fn new() -> Self {
        let mut refs = BTreeMap::new();
        refs.insert(
            RefName::from("HEAD"),
            RefTarget::Symbolic(RefName::from(DEFAULT_HEAD_TARGET)),
        );
        Self {
            refs,
            removals_before_failure: None,
            enumerations_before_failure: Cell::new(None),
        }
    }

    /// A repository with every name in `names` pointing at `id`.
    pub fn with_refs<'a>(names: impl IntoIterator<Item = &'a str>, id: &str) -> Self {
        let mut repo = Self::new();
        for name in names {
            repo.refs.insert(
                RefName::from(name),
                RefTarget::Direct(id.into()),
            );
        }
        repo
    }

    /// Make removals fail once `n` of them have succeeded.
    pub fn fail_removal_after(&mut self, n: usize) {
        self.removals_before_failure = Some(n);
    }

    /// Make enumeration fail once `n` enumerations have succeeded.
    pub fn fail_enumeration_after(&mut self, n: usize) {
        self.enumerations_before_failure.set(Some(n));
    }

    pub fn get(&self, name: &str) -> Option<&RefTarget> {
        self.refs.get(&RefName::from(name))
    }

    pub fn sorted_names(&self) -> Vec<String> {
        self.refs.keys().map(|n| n.0.clone()).collect()
    }

    /// Follow symbolic references until a direct one is found.
    fn resolve(&self, name: &RefName) -> Option<&RefTarget> {
        let mut current = name;
        let mut seen = HashSet::new();
        loop {
            if !seen.insert(current) {
                return None;
            }
            let target = self.refs.get(current)?;
            match target {
                RefTarget::Symbolic(next) => current = next,
                RefTarget::Direct(_) => return Some(target),
            }
        }
    }

    /// What a remote advertises: direct references plus resolvable `HEAD`,
    /// the latter reported by its resolved target.
    fn advertised(&self) -> Vec<Reference> {
        self.refs
            .iter()
            .filter_map(|(name, target)| match target {
                RefTarget::Direct(_) => Some(Reference {
                    name: name.clone(),
                    target: target.clone(),
                }),
                RefTarget::Symbolic(_) => self.resolve(name).map(|resolved| Reference {
                    name: name.clone(),
                    target: resolved.clone(),
                }),
            })
            .collect()
    }
}

impl RefStore for MemoryRepo {
    fn references(&self) -> Result<Vec<Reference>, GitError> {
        match self.enumerations_before_failure.get() {
            Some(0) => return Err(GitError::Injected("cannot list references".to_string())),
            Some(left) => self.enumerations_before_failure.set(Some(left - 1)),
            None => {}
        }
        Ok(self
            .refs
            .iter()
            .map(|(name, target)| Reference {
                name: name.clone(),
                target: target.clone(),
            })
            .collect())
    }

    fn set_reference(&mut self, reference: &Reference) -> Result<(), GitError> {
        self.refs
            .insert(reference.name.clone(), reference.target.clone());
        Ok(())
    }

    fn remove_reference(&mut self, name: &RefName) -> Result<(), GitError> {
        if let Some(left) = self.removals_before_failure.as_mut() {
            if *left == 0 {
                return Err(GitError::Injected(format!("cannot remove {name}")));
            }
            *left -= 1;
        }
        self.refs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| GitError::RefNotFound(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

/// Transport operations, used to inject failures and inspect calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    InitStaging,
    Fetch,
    Push,
    List,
}

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub remote: String,
    pub specs: Vec<String>,
    pub force: bool,
    pub authenticated: bool,
}

/// Serves remotes held in memory.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    remotes: Mutex<HashMap<String, MemoryRepo>>,
    staging_template: Mutex<Option<MemoryRepo>>,
    failures: Mutex<HashMap<Operation, usize>>,
    calls: Mutex<Vec<Call>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the repository served at `url`.
    pub fn with_remote(self, url: &str, repo: MemoryRepo) -> Self {
        self.lock_remotes().insert(url.to_string(), repo);
        self
    }

    /// Hand out clones of `repo` from [`Transport::init_staging`].
    pub fn with_staging(self, repo: MemoryRepo) -> Self {
        *self
            .staging_template
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(repo);
        self
    }

    /// Fail the `nth` (0-based) future call of `operation`.
    pub fn fail_on(self, operation: Operation, nth: usize) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(operation, nth);
        self
    }

    /// Snapshot of the repository served at `url`.
    pub fn remote(&self, url: &str) -> Option<MemoryRepo> {
        self.lock_remotes().get(url).cloned()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn lock_remotes(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemoryRepo>> {
        self.remotes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(
        &self,
        operation: Operation,
        remote: &str,
        specs: &[RefSpec],
        force: bool,
        auth: Option<&AuthMethod>,
    ) -> Result<(), GitError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Call {
                operation,
                remote: remote.to_string(),
                specs: specs.iter().map(ToString::to_string).collect(),
                force,
                authenticated: auth.is_some(),
            });

        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        match failures.get(&operation).copied() {
            Some(0) => {
                failures.remove(&operation);
                Err(GitError::Injected(format!("{operation:?} failed")))
            }
            Some(n) => {
                failures.insert(operation, n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Copy every direct reference of `from` matched by `specs` into `to`.
fn transfer(
    from: &MemoryRepo,
    to: &mut MemoryRepo,
    specs: &[RefSpec],
    force: bool,
) -> Result<Outcome, GitError> {
    let mut outcome = Outcome::UpToDate;
    for spec in specs {
        match spec {
            RefSpec::Update { src, dst } => {
                for (name, target) in &from.refs {
                    let RefTarget::Direct(_) = target else {
                        continue;
                    };
                    let Some(mapped) = map_through(name.as_str(), src, dst) else {
                        continue;
                    };
                    let mapped = RefName::from(mapped);
                    match to.refs.get(&mapped) {
                        Some(existing) if existing == target => {}
                        Some(_) if !force => return Err(GitError::Rejected(mapped.0)),
                        _ => {
                            to.refs.insert(mapped, target.clone());
                            outcome = Outcome::Updated;
                        }
                    }
                }
            }
            RefSpec::Delete { dst } => {
                if to.refs.remove(dst).is_none() {
                    return Err(GitError::RefNotFound(dst.to_string()));
                }
                outcome = Outcome::Updated;
            }
        }
    }
    Ok(outcome)
}

impl Transport for MemoryTransport {
    type Staging = MemoryRepo;

    fn init_staging(&self) -> Result<MemoryRepo, GitError> {
        self.record(Operation::InitStaging, "", &[], false, None)?;
        Ok(self
            .staging_template
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .unwrap_or_default())
    }

    fn fetch(
        &self,
        staging: &mut MemoryRepo,
        remote: &str,
        specs: &[RefSpec],
    ) -> Result<Outcome, GitError> {
        self.record(Operation::Fetch, remote, specs, false, None)?;
        let remotes = self.lock_remotes();
        let source = remotes
            .get(remote)
            .ok_or_else(|| GitError::RemoteNotFound(remote.to_string()))?;
        transfer(source, staging, specs, true)
    }

    fn push(
        &self,
        staging: &MemoryRepo,
        remote: &str,
        specs: &[RefSpec],
        force: bool,
        auth: Option<&AuthMethod>,
    ) -> Result<Outcome, GitError> {
        self.record(Operation::Push, remote, specs, force, auth)?;
        let mut remotes = self.lock_remotes();
        let destination = remotes
            .get_mut(remote)
            .ok_or_else(|| GitError::RemoteNotFound(remote.to_string()))?;
        // Work on a copy so a rejected push leaves the remote untouched.
        let mut updated = destination.clone();
        let outcome = transfer(staging, &mut updated, specs, force)?;
        *destination = updated;
        Ok(outcome)
    }

    fn list_remote_refs(
        &self,
        remote: &str,
        auth: Option<&AuthMethod>,
    ) -> Result<Vec<Reference>, GitError> {
        self.record(Operation::List, remote, &[], false, auth)?;
        self.lock_remotes()
            .get(remote)
            .map(MemoryRepo::advertised)
            .ok_or_else(|| GitError::RemoteNotFound(remote.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_repo_has_symbolic_head() {
        let repo = MemoryRepo::new();
        assert_eq!(
            repo.get("HEAD"),
            Some(&RefTarget::Symbolic(RefName::from(DEFAULT_HEAD_TARGET)))
        );
    }

    #[test]
    fn unresolvable_head_is_not_advertised() {
        let transport = MemoryTransport::new().with_remote("mem://r", MemoryRepo::new());
        assert!(transport.list_remote_refs("mem://r", None).unwrap().is_empty());
    }

    #[test]
    fn fetch_reports_up_to_date_on_second_run() {
        let transport = MemoryTransport::new()
            .with_remote("mem://src", MemoryRepo::with_refs(["refs/heads/master"], "1"));
        let mut staging = transport.init_staging().unwrap();
        let first = transport
            .fetch(&mut staging, "mem://src", &[RefSpec::mirror()])
            .unwrap();
        let second = transport
            .fetch(&mut staging, "mem://src", &[RefSpec::mirror()])
            .unwrap();
        assert_eq!(first, Outcome::Updated);
        assert_eq!(second, Outcome::UpToDate);
    }

    #[test]
    fn non_forced_push_rejects_moving_refs() {
        let transport = MemoryTransport::new()
            .with_remote("mem://dst", MemoryRepo::with_refs(["refs/heads/a"], "old"));
        let staging = MemoryRepo::with_refs(["refs/heads/a", "refs/heads/b"], "new");

        let err = transport
            .push(&staging, "mem://dst", &[RefSpec::mirror()], false, None)
            .unwrap_err();
        assert!(matches!(err, GitError::Rejected(_)));
        assert_eq!(
            transport.remote("mem://dst").unwrap().sorted_names(),
            vec!["HEAD", "refs/heads/a"],
            "rejected push must not partially apply"
        );

        transport
            .push(&staging, "mem://dst", &[RefSpec::mirror()], true, None)
            .unwrap();
        assert_eq!(
            transport.remote("mem://dst").unwrap().get("refs/heads/a"),
            Some(&RefTarget::Direct("new".into()))
        );
    }

    #[test]
    fn deleting_a_missing_ref_fails() {
        let transport = MemoryTransport::new().with_remote("mem://dst", MemoryRepo::new());
        let err = transport
            .push(
                &MemoryRepo::new(),
                "mem://dst",
                &[RefSpec::delete("refs/heads/nope")],
                false,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, GitError::RefNotFound(_)));
    }

    #[test]
    fn injected_failure_hits_the_nth_call_only() {
        let transport = MemoryTransport::new()
            .with_remote("mem://r", MemoryRepo::new())
            .fail_on(Operation::List, 1);
        assert!(transport.list_remote_refs("mem://r", None).is_ok());
        assert!(transport.list_remote_refs("mem://r", None).is_err());
        assert!(transport.list_remote_refs("mem://r", None).is_ok());
        assert_eq!(transport.calls().len(), 3);
    }
}
