mod cli;
mod commands;
mod display;
mod inputs;
mod schema_file;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Diff(args) => commands::diff::run(&ctx, args),
        Command::Show(args) => commands::show::run(&ctx, args),
        Command::Validate(args) => commands::validate::run(&ctx, args),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "schemadiff", &mut io::stdout());
            Ok(())
        }
    }
}
