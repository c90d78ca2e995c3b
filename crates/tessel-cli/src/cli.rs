//! Command-line interface definition.
//!
//! - `tessel build` - run the pipeline and write the output directory
//! - `tessel check` - validate configuration and entry files without building

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use tessel_config::BuildMode;

/// Tessel - static asset pipeline for game-client overlays
#[derive(Parser, Debug)]
#[command(
    name = "tessel",
    version,
    about = "Build game-client assets into content-addressed chunks"
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the configured entries into the output directory
    Build(BuildArgs),

    /// Validate configuration and entry files without building
    Check(CheckArgs),
}

impl Command {
    pub fn cwd(&self) -> Option<&Path> {
        match self {
            Command::Build(args) => args.cwd.as_deref(),
            Command::Check(args) => args.cwd.as_deref(),
        }
    }

    pub fn config(&self) -> Option<&Path> {
        match self {
            Command::Build(args) => args.config.as_deref(),
            Command::Check(args) => args.config.as_deref(),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Entry points, as `path` or `name=path`. Replaces the configured entries.
    #[arg(value_name = "ENTRY")]
    pub entries: Vec<String>,

    /// Config file (defaults to tessel.toml or the `tessel` field of package.json)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Build mode; overrides NODE_ENV and the config file
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Output directory, relative to the project root
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Maximum number of concurrent transform jobs
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Keep files from previous builds in the output directory
    #[arg(long)]
    pub no_clean: bool,

    /// Project root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Config file (defaults to tessel.toml or the `tessel` field of package.json)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Validate the profile of this mode; overrides NODE_ENV
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Project root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Development,
    Production,
}

impl From<ModeArg> for BuildMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Development => BuildMode::Development,
            ModeArg::Production => BuildMode::Production,
        }
    }
}
