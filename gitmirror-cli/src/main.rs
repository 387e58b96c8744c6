//! git-mirror — mirror every reference of one git repository into another.
//!
//! # Usage
//!
//! ```text
//! git-mirror [--source-repository <url>] [--destination-repository <url>]
//!            [--ssh-known-hosts-path <path>] [--debug] [--json]
//! ```

mod logging;
mod terminate;

use std::collections::HashMap;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use gitmirror_core::{config::ENV_VARS, resolve, validate, Config, Env, SshConf};
use gitmirror_sync::{mirror, GitCli, MirrorReport};

use terminate::{fatal, ProcessExit};

const AFTER_HELP: &str = "\
Environment:
  SRC_REPO         Source repository URL. Used when --source-repository is not given.
  SERVER_URL       Together with REPOSITORY_NAME, builds the source as
                   SERVER_URL/REPOSITORY_NAME when neither the flag nor
                   SRC_REPO is set.
  REPOSITORY_NAME  See SERVER_URL.
  DST_REPO         Destination repository URL. Used when
                   --destination-repository is not given.
  SSH_PRIVATE_KEY  Private key for the destination. Enables SSH authentication.
  SSH_KNOWN_HOSTS  Known hosts content used to verify the destination host.
                   Mutually exclusive with --ssh-known-hosts-path.

Flags take precedence over the environment. Pull request references
(refs/pull/*) are never mirrored. Set RUST_LOG to tune logging.";

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug, Default)]
#[command(
    name = "git-mirror",
    version,
    about = "Mirror all references of a git repository to another remote",
    long_about = None,
    after_help = AFTER_HELP,
)]
struct Cli {
    /// Source repository URL.
    #[arg(long = "source-repository", value_name = "URL")]
    source_repository: Option<String>,

    /// Destination repository URL.
    #[arg(long = "destination-repository", value_name = "URL")]
    destination_repository: Option<String>,

    /// Path to a known_hosts file used to verify the destination host.
    #[arg(long = "ssh-known-hosts-path", value_name = "PATH")]
    ssh_known_hosts_path: Option<String>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Print the mirror report as JSON instead of a summary line.
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Configuration carried by the flags alone.
    fn explicit_config(&self) -> Config {
        Config {
            src_repo: self.source_repository.clone().unwrap_or_default(),
            dst_repo: self.destination_repository.clone().unwrap_or_default(),
            ssh: SshConf {
                known_hosts_path: self.ssh_known_hosts_path.clone().unwrap_or_default(),
                ..Default::default()
            },
            debug: self.debug,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.debug);

    match run(&cli, &collect_env()) {
        Ok(report) => {
            if let Err(err) = print_report(&report, cli.json) {
                fatal(&err, &ProcessExit);
            }
        }
        Err(err) => fatal(&err, &ProcessExit),
    }
}

/// Resolve, validate and mirror.
fn run(cli: &Cli, env: &Env) -> Result<MirrorReport> {
    let conf = resolve(cli.explicit_config(), env);
    tracing::debug!("configuration:\n{}", conf.pretty());

    validate(&conf).context("configuration failed")?;
    mirror(&conf, &GitCli::new()).context("mirror operation failed")
}

/// Snapshot of the variables the resolver reads. Unset variables are absent.
fn collect_env() -> Env {
    ENV_VARS
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
        .collect::<HashMap<_, _>>()
}

fn print_report(report: &MirrorReport, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(report).context("failed to render mirror report")?;
        println!("{rendered}");
        return Ok(());
    }

    let status = if report.push_up_to_date && report.pruned.is_empty() {
        "up to date".green().bold()
    } else {
        "mirrored".green().bold()
    };
    let elapsed = report.finished_at - report.started_at;
    println!(
        "✓ {status} ({} pushed, {} filtered, {} pruned) in {}ms",
        report.pushed,
        report.filtered.len(),
        report.pruned.len(),
        elapsed.num_milliseconds()
    );
    for name in &report.pruned {
        println!("  {} {name}", "-".red());
    }
    Ok(())
}
