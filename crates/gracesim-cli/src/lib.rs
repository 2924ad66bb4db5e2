//! # gracesim-cli
//!
//! Command-line interface for the gracesim event-candidate simulator.
//!
//! ## Commands
//!
//! - `gracesim simulate` - Submit a stream of fake candidates and
//!   their follow-ups to a fake database
//! - `gracesim check-permissions` - Probe which classifications and
//!   labels the store accepts
//! - `gracesim sanity-check` - End-to-end smoke test of the fake store
//! - `gracesim listen` - Tail an alert file and print messages as they
//!   arrive

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// gracesim - a fake event-candidate database and its simulators.
#[derive(Debug, Parser)]
#[command(name = "gracesim")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the fake database and generated payloads.
    #[arg(long, short = 'o', env = "GRACESIM_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Emit logs as JSON instead of compact text.
    #[arg(long)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Submit a stream of fake candidates and their follow-ups.
    Simulate(commands::simulate::SimulateArgs),
    /// Probe which classifications and labels the store accepts.
    CheckPermissions(commands::check_permissions::CheckPermissionsArgs),
    /// End-to-end smoke test of the fake store.
    SanityCheck(commands::sanity_check::SanityCheckArgs),
    /// Tail an alert file and print messages as they arrive.
    Listen(commands::listen::ListenArgs),
}
