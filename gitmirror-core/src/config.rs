//! Mirror configuration: environment resolution, validation and display.
//!
//! Explicit values (CLI flags) are merged with environment fallbacks by
//! [`resolve`], which applies [`RESOLVE_STEPS`] in order. Each step is a pure
//! function of the current configuration and the environment and owns exactly
//! one field.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::ConfigError;
use crate::mask::mask;

/// Environment snapshot handed to the resolver.
pub type Env = HashMap<String, String>;

pub const ENV_SRC_REPO: &str = "SRC_REPO";
pub const ENV_SERVER_URL: &str = "SERVER_URL";
pub const ENV_REPOSITORY_NAME: &str = "REPOSITORY_NAME";
pub const ENV_DST_REPO: &str = "DST_REPO";
pub const ENV_SSH_PRIVATE_KEY: &str = "SSH_PRIVATE_KEY";
pub const ENV_SSH_KNOWN_HOSTS: &str = "SSH_KNOWN_HOSTS";

/// Every variable the resolver reads, in precedence order.
pub const ENV_VARS: [&str; 6] = [
    ENV_SRC_REPO,
    ENV_SERVER_URL,
    ENV_REPOSITORY_NAME,
    ENV_DST_REPO,
    ENV_SSH_PRIVATE_KEY,
    ENV_SSH_KNOWN_HOSTS,
];

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// SSH material used to authenticate against the destination.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct SshConf {
    pub private_key: String,
    /// Known hosts content, `known_hosts` file format.
    pub known_hosts: String,
    /// Path to a `known_hosts` file. Exclusive with `known_hosts`.
    pub known_hosts_path: String,
}

impl fmt::Debug for SshConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshConf")
            .field("private_key", &mask(&self.private_key))
            .field("known_hosts", &mask(&self.known_hosts))
            .field("known_hosts_path", &self.known_hosts_path)
            .finish()
    }
}

/// Everything a mirror operation needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Config {
    pub src_repo: String,
    pub dst_repo: String,
    pub ssh: SshConf,
    pub debug: bool,
}

impl Config {
    /// Whether SSH authentication is configured.
    pub fn auth_enabled(&self) -> bool {
        !self.ssh.private_key.is_empty()
    }

    /// Indented JSON rendering with the private key and the known hosts
    /// content replaced by their digest. The known hosts path is not secret
    /// and is shown as is.
    pub fn pretty(&self) -> String {
        let mut masked = self.clone();
        masked.ssh.private_key = mask(&self.ssh.private_key);
        masked.ssh.known_hosts = mask(&self.ssh.known_hosts);
        serde_json::to_string_pretty(&masked).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// A single resolver step. Steps never read fields they do not own.
pub type ResolveStep = fn(Config, &Env) -> Config;

/// Resolver steps in precedence order.
pub const RESOLVE_STEPS: [ResolveStep; 4] = [
    resolve_src_repo,
    resolve_dst_repo,
    resolve_private_key,
    resolve_known_hosts,
];

/// Merge `explicit` with fallbacks from `env`.
pub fn resolve(explicit: Config, env: &Env) -> Config {
    RESOLVE_STEPS
        .iter()
        .fold(explicit, |conf, step| step(conf, env))
}

/// Source: explicit value, then `SRC_REPO`, then `SERVER_URL/REPOSITORY_NAME`.
///
/// The fallback is a literal join with a single `/`; slashes already present
/// on either side are kept.
pub fn resolve_src_repo(mut conf: Config, env: &Env) -> Config {
    if !conf.src_repo.is_empty() {
        return conf;
    }
    if let Some(src) = env.get(ENV_SRC_REPO) {
        conf.src_repo = src.clone();
        return conf;
    }
    let server = env.get(ENV_SERVER_URL);
    let repo = env.get(ENV_REPOSITORY_NAME);
    if server.is_some() || repo.is_some() {
        conf.src_repo = format!(
            "{}/{}",
            server.map(String::as_str).unwrap_or_default(),
            repo.map(String::as_str).unwrap_or_default()
        );
    }
    conf
}

/// Destination: explicit value, then `DST_REPO`. Never derived.
pub fn resolve_dst_repo(mut conf: Config, env: &Env) -> Config {
    if conf.dst_repo.is_empty() {
        conf.dst_repo = env.get(ENV_DST_REPO).cloned().unwrap_or_default();
    }
    conf
}

/// The private key always comes from the environment, even when empty.
pub fn resolve_private_key(mut conf: Config, env: &Env) -> Config {
    conf.ssh.private_key = env.get(ENV_SSH_PRIVATE_KEY).cloned().unwrap_or_default();
    conf
}

/// Known hosts content always comes from the environment, even when empty.
pub fn resolve_known_hosts(mut conf: Config, env: &Env) -> Config {
    conf.ssh.known_hosts = env.get(ENV_SSH_KNOWN_HOSTS).cloned().unwrap_or_default();
    conf
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check that `conf` is complete and its authentication inputs consistent.
///
/// A configuration without a private key is valid; authentication is then
/// disabled and a warning is logged.
pub fn validate(conf: &Config) -> Result<(), ConfigError> {
    if conf.src_repo.is_empty() {
        return Err(ConfigError::MissingSource);
    }
    tracing::info!("source repository: {}", conf.src_repo);

    if conf.dst_repo.is_empty() {
        return Err(ConfigError::MissingDestination);
    }
    tracing::info!("destination repository: {}", conf.dst_repo);

    if !conf.auth_enabled() {
        tracing::warn!("configured with no authentication");
        return Ok(());
    }

    match (
        conf.ssh.known_hosts.is_empty(),
        conf.ssh.known_hosts_path.is_empty(),
    ) {
        (false, false) => Err(ConfigError::ConflictingHostKeySources),
        (true, true) => Err(ConfigError::MissingHostKeySource),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
