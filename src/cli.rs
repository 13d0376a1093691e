use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "schemadiff")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Validate resource config, diff it against prior state, show the result", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress everything but errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compute the diff between prior state and desired config
    Diff(DiffArgs),

    /// Apply the diff and print the resulting resource view
    Show(ShowArgs),

    /// Check a config against a schema without diffing
    Validate(InputArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared Arguments
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Schema file (.json or .toml)
    #[arg(short, long, env = "SCHEMADIFF_SCHEMA")]
    pub schema: PathBuf,

    /// Desired configuration file (.json or .toml)
    #[arg(short, long, env = "SCHEMADIFF_CONFIG")]
    pub config: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct DiffArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Prior state file (.json or .toml); omit for a new resource
    #[arg(long, env = "SCHEMADIFF_STATE")]
    pub state: Option<PathBuf>,

    /// Print the diff as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Prior state file (.json or .toml); omit for a new resource
    #[arg(long, env = "SCHEMADIFF_STATE")]
    pub state: Option<PathBuf>,

    /// Assign this id to the view and print the resulting state
    #[arg(long)]
    pub id: Option<String>,

    /// Print the view as JSON
    #[arg(long)]
    pub json: bool,
}
