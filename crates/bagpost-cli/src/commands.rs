use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "bagpost")]
#[command(about = "Names, tags and uploads vehicle bag recordings to the archive", long_about = None)]
pub struct Cli {
    /// Log to file only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Descend into subdirectories
    #[arg(short, long, global = true)]
    pub recursive: bool,

    /// Archive base URL
    #[arg(short, long, global = true)]
    pub url: Option<String>,

    /// Directory to work in (defaults to the configured scan root)
    #[arg(short, long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate names, tag and upload every recording under the scan root
    Process,
    /// Prefix every recording in the directory with a vehicle type and name
    Rename {
        #[arg(long = "type")]
        vehicle_type: String,
        #[arg(long)]
        name: String,
    },
    /// Print configuration values
    PrintConfig,
}
