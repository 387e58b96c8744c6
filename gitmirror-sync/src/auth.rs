//! SSH authentication material for the destination remote.
//!
//! An [`AuthMethod`] owns everything the transport needs to authenticate:
//! the private key, written to an owner-only temporary file, and the host key
//! source used to verify the server. Host keys given by value are written to
//! their own temporary file. Both files are removed when the `AuthMethod` is
//! dropped.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use gitmirror_core::SshConf;

use crate::error::{io_err, AuthError};

/// User name presented to the SSH server.
pub const SSH_USER: &str = "git";

const KEY_FILE_PREFIX: &str = "git-mirror-key-";
const KNOWN_HOSTS_FILE_PREFIX: &str = "git-mirror-known_hosts-";

/// Where the server's host key is verified against.
#[derive(Debug)]
pub enum KnownHosts {
    /// Known hosts content materialised to a temporary file.
    Materialized(NamedTempFile),
    /// An existing `known_hosts` file supplied by path.
    Path(PathBuf),
    /// Let ssh use its own default lookup.
    Default,
}

/// SSH key authentication with strict host key checking.
#[derive(Debug)]
pub struct AuthMethod {
    user: String,
    key_file: NamedTempFile,
    known_hosts: KnownHosts,
}

impl AuthMethod {
    /// Build authentication from `ssh`, or `None` when no private key is set.
    ///
    /// Host keys given by value take precedence over the path; an empty path
    /// falls back to ssh's default lookup.
    pub fn from_config(ssh: &SshConf) -> Result<Option<Self>, AuthError> {
        if ssh.private_key.is_empty() {
            return Ok(None);
        }
        check_private_key(&ssh.private_key)?;

        let key_file = write_owner_only(KEY_FILE_PREFIX, &with_trailing_newline(&ssh.private_key))?;
        let known_hosts = if !ssh.known_hosts.is_empty() {
            KnownHosts::Materialized(write_owner_only(
                KNOWN_HOSTS_FILE_PREFIX,
                &with_trailing_newline(&ssh.known_hosts),
            )?)
        } else if !ssh.known_hosts_path.is_empty() {
            KnownHosts::Path(PathBuf::from(&ssh.known_hosts_path))
        } else {
            KnownHosts::Default
        };

        Ok(Some(Self {
            user: SSH_USER.to_string(),
            key_file,
            known_hosts,
        }))
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn key_path(&self) -> &Path {
        self.key_file.path()
    }

    /// The `known_hosts` file ssh will read, if one was configured.
    pub fn known_hosts_path(&self) -> Option<&Path> {
        match &self.known_hosts {
            KnownHosts::Materialized(file) => Some(file.path()),
            KnownHosts::Path(path) => Some(path),
            KnownHosts::Default => None,
        }
    }

    /// Command line for `GIT_SSH_COMMAND`.
    ///
    /// The user is passed as `-o User=`; a `user@` in the remote URL still
    /// takes precedence.
    pub fn ssh_command(&self) -> String {
        let mut cmd = format!(
            "ssh -i {} -o User={} -o IdentitiesOnly=yes -o StrictHostKeyChecking=yes -o BatchMode=yes",
            shell_quote(&self.key_path().to_string_lossy()),
            shell_quote(&self.user)
        );
        if let Some(path) = self.known_hosts_path() {
            cmd.push_str(" -o UserKnownHostsFile=");
            cmd.push_str(&shell_quote(&path.to_string_lossy()));
        }
        cmd
    }
}

/// Reject anything that is not an armoured private key.
fn check_private_key(key: &str) -> Result<(), AuthError> {
    let key = key.trim();
    let armoured = key.starts_with("-----BEGIN ")
        && key.lines().next().is_some_and(|l| l.ends_with("PRIVATE KEY-----"))
        && key.ends_with("PRIVATE KEY-----");
    if !armoured {
        return Err(AuthError::InvalidKey(
            "expected a PEM or OpenSSH armoured private key".to_string(),
        ));
    }
    if key.contains("Proc-Type: 4,ENCRYPTED") {
        return Err(AuthError::InvalidKey(
            "passphrase protected keys are not supported".to_string(),
        ));
    }
    Ok(())
}

fn with_trailing_newline(content: &str) -> String {
    if content.ends_with('\n') {
        content.to_string()
    } else {
        format!("{content}\n")
    }
}

/// Create a uniquely named temporary file readable and writable by the owner
/// only, and fill it with `content`.
fn write_owner_only(prefix: &str, content: &str) -> Result<NamedTempFile, AuthError> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .tempfile()
        .map_err(|e| io_err(std::env::temp_dir(), e))?;
    set_owner_only(file.path())?;
    file.write_all(content.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|e| io_err(file.path(), e))?;
    Ok(file)
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<(), AuthError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<(), AuthError> {
    Ok(())
}

/// Single-quote `value` for a POSIX shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
