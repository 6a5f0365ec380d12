//! The CLI surface: `download`, `verify`, `place`, `clean`, `config`,
//! plus shell-completions and state-backup maintenance subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use modfetch_fs::PlaceMode;

use crate::logging::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "modfetch", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "modfetch.toml")]
    pub config: PathBuf,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Human)]
    pub log_format: LogFormat,

    /// Repeat for more verbosity (-v, -vv); RUST_LOG overrides this.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch one artifact or a batch manifest of them.
    #[command(alias = "dl")]
    Download(DownloadArgs),

    /// Recompute and check an already-downloaded file's SHA-256.
    Verify(VerifyArgs),

    /// Place a finalized artifact into application target directories.
    Place(PlaceArgs),

    /// Vacuum terminal downloads and orphaned `.part` files older than N days.
    Clean(CleanArgs),

    /// Validate or print the resolved configuration.
    Config(ConfigArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// State store maintenance (backup, integrity check).
    #[command(subcommand)]
    State(StateCommand),
}

#[derive(Debug, clap::Args)]
pub struct DownloadArgs {
    /// Source URI (`hf://...`, `civitai://...`, or `http(s)://...`).
    #[arg(long, conflicts_with = "batch", required_unless_present = "batch")]
    pub url: Option<String>,

    /// Destination path; inferred from the URI's basename under
    /// `general.download_root` when omitted.
    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// Expected SHA-256, hex-encoded.
    #[arg(long)]
    pub sha256: Option<String>,

    /// Artifact kind; inferred by classification when omitted.
    #[arg(long = "type")]
    pub kind: Option<String>,

    /// YAML batch manifest of jobs.
    #[arg(long, conflicts_with_all = ["url", "dest", "sha256", "kind"])]
    pub batch: Option<PathBuf>,

    /// Start over instead of resuming from any existing `.part`/store state.
    #[arg(long)]
    pub no_resume: bool,

    /// Place the finalized artifact into its application target directories.
    #[arg(long)]
    pub place: bool,

    #[arg(long, value_enum)]
    pub mode: Option<CliPlaceMode>,

    /// Print a final JSON summary per job instead of human-readable progress.
    #[arg(long)]
    pub summary_json: bool,
}

#[derive(Debug, clap::Args)]
pub struct VerifyArgs {
    #[arg(long)]
    pub path: PathBuf,
}

#[derive(Debug, clap::Args)]
pub struct PlaceArgs {
    #[arg(long)]
    pub path: PathBuf,

    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, value_enum, default_value_t = CliPlaceMode::Symlink)]
    pub mode: CliPlaceMode,
}

#[derive(Debug, clap::Args)]
pub struct CleanArgs {
    #[arg(long)]
    pub days: u32,

    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Load the config file and report errors, if any.
    Validate,
    /// Print the fully-resolved configuration as TOML.
    Print,
}

#[derive(Debug, clap::Args)]
pub struct CompletionsArgs {
    pub shell: clap_complete::Shell,
}

#[derive(Debug, Subcommand)]
pub enum StateCommand {
    /// Copy the state store to a new location while quiescent.
    Backup { path: PathBuf },
    /// Report integrity anomalies (orphan chunks, zero-size completes).
    Check,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliPlaceMode {
    Symlink,
    Hardlink,
    Copy,
}

impl From<CliPlaceMode> for PlaceMode {
    fn from(mode: CliPlaceMode) -> Self {
        match mode {
            CliPlaceMode::Symlink => PlaceMode::Symlink,
            CliPlaceMode::Hardlink => PlaceMode::Hardlink,
            CliPlaceMode::Copy => PlaceMode::Copy,
        }
    }
}
