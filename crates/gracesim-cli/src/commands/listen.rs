//! Listen command - tail the alert file and print messages.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use gracesim_core::{AlertMonitor, FakeDb};

/// Arguments for the listen command.
#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Only print messages broadcast on this channel.
    #[arg(long, short = 'c')]
    pub channel: Option<String>,

    /// Replay the whole alert file instead of starting at its end.
    #[arg(long)]
    pub from_start: bool,

    /// Seconds between polls of the alert file.
    #[arg(long, default_value = "0.1")]
    pub cadence: f64,

    /// Stop after printing this many messages; omit to run until
    /// interrupted.
    #[arg(long, short = 'n')]
    pub max_messages: Option<usize>,
}

/// Execute the listen command.
///
/// # Errors
///
/// Returns an error if the alert file is missing or unreadable.
pub fn execute(args: &ListenArgs, output_dir: &Path) -> Result<()> {
    let path = output_dir.join(FakeDb::ALERT_FILE);
    let mut monitor = if args.from_start {
        AlertMonitor::attach_from_start(&path)
    } else {
        AlertMonitor::attach(&path)
    }
    .with_context(|| format!("attaching to {}", path.display()))?;

    let mut remaining = args.max_messages;
    let cadence = Duration::from_secs_f64(args.cadence.max(0.0));
    monitor.monitor(cadence, |channel, message| {
        if remaining == Some(0) {
            return false;
        }
        if args
            .channel
            .as_deref()
            .is_some_and(|wanted| wanted != channel)
        {
            return true;
        }
        match serde_json::to_string(message) {
            Ok(json) => println!("{channel} {json}"),
            Err(err) => eprintln!("unprintable alert on {channel}: {err}"),
        }
        match remaining.as_mut() {
            Some(n) => {
                *n = n.saturating_sub(1);
                *n > 0
            }
            None => true,
        }
    })?;
    Ok(())
}
