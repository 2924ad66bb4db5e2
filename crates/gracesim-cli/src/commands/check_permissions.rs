//! Check-permissions command - probe the store's allow-lists.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use gracesim_core::{Classification, EventDb, FakeDb, GraceId, Label};
use gracesim_sim::PipelineEvent;

/// Arguments for the check-permissions command.
#[derive(Debug, Args)]
pub struct CheckPermissionsArgs {
    /// GPS time stamped into the probe payloads.
    #[arg(long, default_value = "1137250000.0")]
    pub gps: f64,

    /// False-alarm rate stamped into the probe payloads.
    #[arg(long, default_value = "1e-9")]
    pub far: f64,

    /// Detectors named in the probe payloads.
    #[arg(long, short = 'i', value_delimiter = ',', default_values = ["H1", "L1"])]
    pub instruments: Vec<String>,
}

/// Execute the check-permissions command.
///
/// Attempts an event creation for every classification in the static
/// allow-list, then every known label against the first event that was
/// created, and prints which attempts succeeded and which failed.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or a probe payload
/// cannot be written; individual rejections are reported, not fatal.
pub fn execute(args: &CheckPermissionsArgs, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output dir {}", output_dir.display()))?;
    let db = FakeDb::open(output_dir)?;

    let mut created: Vec<(Classification, GraceId)> = Vec::new();
    let mut rejected: Vec<(Classification, String)> = Vec::new();
    for classification in Classification::all_allowed() {
        let event = PipelineEvent::new(
            classification,
            args.gps,
            args.far,
            args.instruments.clone(),
            output_dir,
        );
        let initial_file = event.write_initial_data()?;
        match db.create_event(classification, &initial_file) {
            Ok(record) => created.push((classification, record.graceid)),
            Err(err) => rejected.push((classification, err.to_string())),
        }
    }
    info!(created = created.len(), rejected = rejected.len(), "creation probes done");

    println!("event creation:");
    for (classification, graceid) in &created {
        println!("  ok      {classification} -> {graceid}");
    }
    for (classification, err) in &rejected {
        println!("  denied  {classification}: {err}");
    }

    let Some(&(_, graceid)) = created.first() else {
        println!("no event was created; skipping label probes");
        return Ok(());
    };

    println!("labels (against {graceid}):");
    for label in Label::all() {
        match db.write_label(graceid, &label) {
            Ok(_) => println!("  ok      {}", label.as_str()),
            Err(err) => println!("  denied  {}: {err}", label.as_str()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn probes_every_allowed_combination() {
        let tmp = TempDir::new().unwrap();
        let args = CheckPermissionsArgs {
            gps: 1_137_250_000.0,
            far: 1e-9,
            instruments: vec!["H1".to_string(), "L1".to_string()],
        };
        execute(&args, tmp.path()).unwrap();

        let db = FakeDb::open(tmp.path()).unwrap();
        // Every allow-listed classification creates, so the store holds
        // one event per combination.
        assert_eq!(db.ids().unwrap().len(), Classification::all_allowed().len());

        // Labels were probed against the first creation, which is the
        // first Test combination and thus the first T-prefixed id.
        let first: GraceId = "T000000".parse().unwrap();
        let labelled = db.labels(first).unwrap();
        assert_eq!(labelled.len(), Label::all().len());
    }
}
