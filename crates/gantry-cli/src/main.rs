use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod console;
mod manifest;
mod reporter;

/// Gantry test-automation orchestration engine.
///
/// Gantry discovers tests contributed by framework adapters, builds a
/// test tree, and executes it with live progress and cancellation.
///
/// EXAMPLES:
///     gantry run                     Run the package in ./gantry.toml
///     gantry run -f math             Run tests whose name contains "math"
///     gantry explore --json          Dump the discovered tree as JSON
///
/// ENVIRONMENT VARIABLES:
///     GANTRY_JSON       Set to '1' for JSON output by default
///     NO_COLOR          Set to disable colored output
#[derive(Parser)]
#[command(name = "gantry")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a test package
    ///
    /// Loads the package manifest, explores every artifact root for
    /// suite files, and executes the discovered tree. Exits with code
    /// 1 when any test fails or the run does not finish cleanly.
    ///
    /// EXAMPLES:
    ///     gantry run                      Run ./gantry.toml
    ///     gantry run pkg/gantry.toml      Run a specific package
    ///     gantry run -f arithmetic        Only matching subtrees
    ///     gantry run --dry-run            Walk the tree, execute nothing
    #[command(visible_alias = "r")]
    Run {
        /// Path to the package manifest
        #[arg(default_value = "gantry.toml")]
        package: PathBuf,
        /// Filter tests by name substring
        #[arg(long, short = 'f')]
        filter: Option<String>,
        /// Show a line for every executed node
        #[arg(long, short = 'v')]
        verbose: bool,
        /// Output the report as JSON
        #[arg(long, env = "GANTRY_JSON")]
        json: bool,
        /// Disable colored output
        #[arg(long)]
        no_color: bool,
        /// Disable the progress spinner
        #[arg(long)]
        no_progress: bool,
        /// Discover and walk the tree without executing tests
        #[arg(long)]
        dry_run: bool,
    },

    /// Discover tests without running them
    ///
    /// Prints the test tree the frameworks contribute for the
    /// package, including ignored nodes and discovery annotations.
    ///
    /// EXAMPLES:
    ///     gantry explore                  Show the tree
    ///     gantry explore --json           Dump the tree as JSON
    #[command(visible_alias = "e")]
    Explore {
        /// Path to the package manifest
        #[arg(default_value = "gantry.toml")]
        package: PathBuf,
        /// Output the tree as JSON
        #[arg(long, env = "GANTRY_JSON")]
        json: bool,
        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            package,
            filter,
            verbose,
            json,
            no_color,
            no_progress,
            dry_run,
        } => commands::run::run(commands::run::RunArgs {
            package,
            filter,
            verbose,
            json,
            no_color,
            no_progress,
            dry_run,
        }),
        Commands::Explore {
            package,
            json,
            no_color,
        } => commands::explore::run(commands::explore::ExploreArgs {
            package,
            json,
            no_color,
        }),
    }
}
