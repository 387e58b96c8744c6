//! Transport backed by the `git` executable.
//!
//! Staging happens in a bare repository inside a [`TempDir`]; the directory
//! is removed when the [`BareRepo`] is dropped. Authentication is handed to
//! git through `GIT_SSH_COMMAND`.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use gitmirror_core::{RefName, RefSpec, RefTarget, Reference};

use crate::auth::AuthMethod;
use crate::error::GitError;
use crate::transport::{Outcome, RefStore, Transport, DEFAULT_HEAD_TARGET};

const STAGING_DIR_PREFIX: &str = "git-mirror-staging-";
const UP_TO_DATE_MARKER: &str = "Everything up-to-date";
const HEAD: &str = "HEAD";

// ---------------------------------------------------------------------------
// Command runner
// ---------------------------------------------------------------------------

/// Run `git` with `args`, optionally inside `dir`, and return its output.
fn run_git<I, S>(
    program: &Path,
    dir: Option<&Path>,
    args: I,
    auth: Option<&AuthMethod>,
) -> Result<GitOutput, GitError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<String> = args
        .into_iter()
        .map(|a| a.as_ref().to_string_lossy().into_owned())
        .collect();

    let mut cmd = Command::new(program);
    if let Some(dir) = dir {
        cmd.arg("-C").arg(dir);
    }
    // Output is matched against git's untranslated messages.
    cmd.args(&args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("LC_ALL", "C");
    if let Some(auth) = auth {
        cmd.env("GIT_SSH_COMMAND", auth.ssh_command());
    }

    tracing::trace!("running: git {}", args.join(" "));

    let output = cmd.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            tracing::warn!("git not found in PATH");
            GitError::GitNotInstalled
        } else {
            GitError::Io(e)
        }
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if output.status.success() {
        Ok(GitOutput { stdout, stderr })
    } else {
        Err(GitError::CommandFailed { args, stderr })
    }
}

struct GitOutput {
    stdout: String,
    stderr: String,
}

// ---------------------------------------------------------------------------
// BareRepo
// ---------------------------------------------------------------------------

/// A bare repository in a temporary directory.
#[derive(Debug)]
pub struct BareRepo {
    program: PathBuf,
    dir: TempDir,
    /// `HEAD` cannot be deleted from a live repository; once removed it is
    /// only hidden from this view.
    head_removed: bool,
}

impl BareRepo {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn git<I, S>(&self, args: I) -> Result<GitOutput, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        run_git(&self.program, Some(self.path()), args, None)
    }

    fn head(&self) -> Result<Option<Reference>, GitError> {
        if self.head_removed {
            return Ok(None);
        }
        if let Ok(out) = self.git(["symbolic-ref", "-q", HEAD]) {
            return Ok(Some(Reference::symbolic(HEAD, out.stdout.trim())));
        }
        match self.git(["rev-parse", "-q", "--verify", HEAD]) {
            Ok(out) => Ok(Some(Reference::direct(HEAD, out.stdout.trim()))),
            Err(GitError::CommandFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl RefStore for BareRepo {
    fn references(&self) -> Result<Vec<Reference>, GitError> {
        let out = self.git(["for-each-ref", "--format=%(objectname) %(refname)"])?;
        let mut refs = parse_ref_lines(&out.stdout, ' ')?;
        if let Some(head) = self.head()? {
            refs.push(head);
        }
        Ok(refs)
    }

    fn set_reference(&mut self, reference: &Reference) -> Result<(), GitError> {
        match &reference.target {
            RefTarget::Direct(id) => {
                self.git(["update-ref", reference.name.as_str(), id.0.as_str()])?;
            }
            RefTarget::Symbolic(target) => {
                self.git(["symbolic-ref", reference.name.as_str(), target.as_str()])?;
            }
        }
        if reference.name.as_str() == HEAD {
            self.head_removed = false;
        }
        Ok(())
    }

    fn remove_reference(&mut self, name: &RefName) -> Result<(), GitError> {
        if name.as_str() == HEAD {
            if self.head_removed {
                return Err(GitError::RefNotFound(name.to_string()));
            }
            self.head_removed = true;
            return Ok(());
        }
        self.git(["update-ref", "-d", name.as_str()])?;
        Ok(())
    }
}

/// Parse `<oid><sep><name>` lines. Peeled tag entries (`^{}`) are skipped.
fn parse_ref_lines(output: &str, sep: char) -> Result<Vec<Reference>, GitError> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.ends_with("^{}"))
        .map(|line| {
            let (id, name) = line
                .split_once(sep)
                .ok_or_else(|| GitError::Malformed(line.to_string()))?;
            Ok(Reference::direct(name.trim(), id.trim()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// GitCli
// ---------------------------------------------------------------------------

/// [`Transport`] that shells out to `git`.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    /// Use `git` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    /// Use a specific git executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Transport for GitCli {
    type Staging = BareRepo;

    fn init_staging(&self) -> Result<BareRepo, GitError> {
        let dir = tempfile::Builder::new()
            .prefix(STAGING_DIR_PREFIX)
            .tempdir()?;
        run_git(
            &self.program,
            None,
            [OsStr::new("init"), OsStr::new("--bare"), OsStr::new("-q"), dir.path().as_os_str()],
            None,
        )?;
        let repo = BareRepo {
            program: self.program.clone(),
            dir,
            head_removed: false,
        };
        repo.git(["symbolic-ref", HEAD, DEFAULT_HEAD_TARGET])?;
        tracing::debug!("staging repository at {}", repo.path().display());
        Ok(repo)
    }

    fn fetch(
        &self,
        staging: &mut BareRepo,
        remote: &str,
        specs: &[RefSpec],
    ) -> Result<Outcome, GitError> {
        let before: HashSet<Reference> = staging.references()?.into_iter().collect();

        let mut args = vec![
            "fetch".to_string(),
            "--update-head-ok".to_string(),
            "--no-tags".to_string(),
            "--".to_string(),
            remote.to_string(),
        ];
        args.extend(specs.iter().map(ToString::to_string));
        staging.git(&args)?;

        let after: HashSet<Reference> = staging.references()?.into_iter().collect();
        Ok(if before == after {
            Outcome::UpToDate
        } else {
            Outcome::Updated
        })
    }

    fn push(
        &self,
        staging: &BareRepo,
        remote: &str,
        specs: &[RefSpec],
        force: bool,
        auth: Option<&AuthMethod>,
    ) -> Result<Outcome, GitError> {
        let mut args = vec!["push".to_string()];
        if force {
            args.push("--force".to_string());
        }
        args.push("--".to_string());
        args.push(remote.to_string());
        args.extend(specs.iter().map(ToString::to_string));

        let out = run_git(&self.program, Some(staging.path()), &args, auth)?;
        Ok(if out.stderr.contains(UP_TO_DATE_MARKER) {
            Outcome::UpToDate
        } else {
            Outcome::Updated
        })
    }

    fn list_remote_refs(
        &self,
        remote: &str,
        auth: Option<&AuthMethod>,
    ) -> Result<Vec<Reference>, GitError> {
        let out = run_git(&self.program, None, ["ls-remote", "--", remote], auth)?;
        parse_ref_lines(&out.stdout, '\t')
    }
}
