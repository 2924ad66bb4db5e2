//! Entry point for the `gracesim` binary.

use anyhow::Result;
use clap::Parser;

use gracesim_cli::{Cli, Commands};
use gracesim_core::{init_logging, LogFormat};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    });

    match cli.command {
        Commands::Simulate(args) => gracesim_cli::commands::simulate::execute(&args, &cli.output_dir),
        Commands::CheckPermissions(args) => {
            gracesim_cli::commands::check_permissions::execute(&args, &cli.output_dir)
        }
        Commands::SanityCheck(args) => {
            gracesim_cli::commands::sanity_check::execute(&args, &cli.output_dir)
        }
        Commands::Listen(args) => gracesim_cli::commands::listen::execute(&args, &cli.output_dir),
    }
}
