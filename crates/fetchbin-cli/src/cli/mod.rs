//! CLI for the fetchbin release installer.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use fetchbin_core::config;
use fetchbin_core::pipeline::PipelineError;
use fetchbin_core::platform::Platform;
use fetchbin_core::version::VersionRequest;

use commands::{
    run_checksum, run_completions, run_install, run_platform, run_resolve, run_validate,
    run_versions,
};

/// Top-level CLI for fetchbin.
#[derive(Debug, Parser)]
#[command(name = "fetchbin", version)]
#[command(about = "fetchbin: install verified release binaries from a trusted release table", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Release table to resolve against.
#[derive(Debug, Clone, Args)]
pub struct TableArg {
    /// Release table file (TOML, or JSON when it ends in `.json`).
    #[arg(long, short = 't', value_name = "FILE")]
    pub table: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct InstallArgs {
    /// Version to install (`1.3.5`, `v1.3.5` or `latest`).
    pub version: VersionRequest,

    #[command(flatten)]
    pub table: TableArg,

    /// Install for this platform instead of the host (`linux/x86_64` or a target triple).
    #[arg(long, value_name = "PLATFORM")]
    pub platform: Option<Platform>,

    /// Exact destination path for the executable.
    #[arg(long, value_name = "PATH", conflicts_with = "bin_dir")]
    pub dest: Option<PathBuf>,

    /// Directory to install into (default: config `bin_dir`, else ~/.local/bin).
    #[arg(long, value_name = "DIR")]
    pub bin_dir: Option<PathBuf>,

    /// Accept plain-HTTP artifact URLs.
    #[arg(long)]
    pub allow_http: bool,

    /// Fail instead of waiting when another install holds the destination.
    #[arg(long)]
    pub no_wait: bool,

    /// Do not print progress.
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Resolve, download, verify, extract and install a release binary.
    Install(InstallArgs),

    /// Show which archive would be installed, without downloading.
    Resolve {
        version: VersionRequest,
        #[command(flatten)]
        table: TableArg,
        #[arg(long, value_name = "PLATFORM")]
        platform: Option<Platform>,
        /// Print the descriptor as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List versions in the release table, newest first.
    Versions {
        #[command(flatten)]
        table: TableArg,
        /// Only versions with an archive for this platform.
        #[arg(long, value_name = "PLATFORM")]
        platform: Option<Platform>,
    },

    /// Check a release table for structural and digest problems.
    Validate {
        #[command(flatten)]
        table: TableArg,
    },

    /// Print the detected host platform and its target triple.
    Platform,

    /// Compute SHA-256 of a file (e.g. to fill in a release table).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },

    /// Print shell completions.
    Completions {
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Install(args) => {
                let cfg = config::load_or_init()
                    .map_err(|e| fetchbin_core::Error::Config(format!("{:#}", e)))?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_install(&cfg, args).await?
            }
            CliCommand::Resolve {
                version,
                table,
                platform,
                json,
            } => run_resolve(&table.table, &version, platform, json)?,
            CliCommand::Versions { table, platform } => run_versions(&table.table, platform)?,
            CliCommand::Validate { table } => run_validate(&table.table)?,
            CliCommand::Platform => run_platform()?,
            CliCommand::Checksum { path } => run_checksum(&path)?,
            CliCommand::Completions { shell } => run_completions(shell, &mut Cli::command()),
        }

        Ok(())
    }
}

/// Process exit status for an error returned by a command.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<PipelineError>() {
        return e.exit_code();
    }
    if let Some(e) = err.downcast_ref::<fetchbin_core::Error>() {
        return e.exit_code();
    }
    1
}

#[cfg(test)]
mod tests;
