use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "spikesort",
    version,
    about = "Trigger-driven spike sorting pipeline for electrophysiology sessions",
    long_about = "Scan the data folder for sessions carrying a spikesort_me.flag marker and run \
                  each probe through sync extraction, QC, sorting, export and compression.\n\
                  Settings and wiring descriptors are read from the configuration directory."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory holding settings.json and the wiring descriptors
    #[arg(long, env = "SPIKESORT_CONFIG_DIR", default_value = ".", global = true)]
    pub config_dir: PathBuf,
}

#[derive(Subcommand)]
pub enum Command {
    /// Process every triggered session under the data folder
    Run(RunArgs),
    /// List triggered sessions without processing them
    Discover(DiscoverArgs),
    /// Load the configuration and report what a run would use
    Validate(ValidateArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Print the run summary as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Write the JSON summary to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args)]
pub struct DiscoverArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
