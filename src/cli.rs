use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Dump what's on your mind and have it sorted into four quadrants.
/// Data lives in ~/.brainsort unless --dir or the config file says otherwise.
#[derive(Parser)]
#[command(name = "bsort", version, about = "Brain-dump task organizer")]
pub struct Cli {
    /// Act as this user instead of the last one who logged in.
    #[arg(long, short, global = true)]
    pub user: Option<String>,

    /// Path to the YAML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (overrides the config file).
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
