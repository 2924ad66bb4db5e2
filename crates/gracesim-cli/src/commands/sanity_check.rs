//! Sanity-check command - end-to-end smoke test of the fake store.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;

use gracesim_core::{
    AlertMonitor, AlertType, Classification, Error, EventDb, FakeDb, Group, Label, Pipeline,
    Search,
};
use gracesim_sim::PipelineEvent;

/// Arguments for the sanity-check command.
#[derive(Debug, Args)]
pub struct SanityCheckArgs {
    /// GPS time stamped into the probe event.
    #[arg(long, default_value = "1137250000.0")]
    pub gps: f64,

    /// False-alarm rate stamped into the probe event.
    #[arg(long, default_value = "1e-9")]
    pub far: f64,
}

struct Checklist {
    failed: usize,
}

impl Checklist {
    fn new() -> Self {
        Self { failed: 0 }
    }

    fn check(&mut self, name: &str, outcome: Result<()>) {
        match outcome {
            Ok(()) => println!("  ok      {name}"),
            Err(err) => {
                self.failed += 1;
                println!("  FAILED  {name}: {err:#}");
            }
        }
    }
}

/// Execute the sanity-check command.
///
/// Creates one Test event, exercises every annotation and query path
/// against it, and verifies the audit trail, printing a checklist.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or any check fails.
#[allow(clippy::too_many_lines)]
pub fn execute(args: &SanityCheckArgs, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output dir {}", output_dir.display()))?;
    let db = FakeDb::open(output_dir)?;
    let mut list = Checklist::new();

    // Creation.
    let classification = Classification::new(Group::Test, Pipeline::Cwb, Some(Search::AllSky));
    let event = PipelineEvent::new(
        classification,
        args.gps,
        args.far,
        vec!["H1".to_string(), "L1".to_string()],
        output_dir,
    );
    let initial_file = event.write_initial_data()?;
    let record = db
        .create_event(classification, &initial_file)
        .context("event creation")?;
    let graceid = record.graceid;
    println!("created {graceid}");

    // Query: the record parsed its initial data.
    list.check("queried record matches payload", {
        let view = db.event(graceid).context("event query")?;
        let gpstime = view.record.gpstime.context("gpstime not parsed")?;
        let far = view.record.far.context("far not parsed")?;
        if (gpstime - args.gps).abs() > 1e-3 {
            bail!("gpstime {gpstime} != {}", args.gps);
        }
        if (far - args.far).abs() > args.far * 1e-6 {
            bail!("far {far} != {}", args.far);
        }
        Ok(())
    });

    // Annotations.
    list.check(
        "write a text log",
        db.write_log(graceid, "sanity check log", None, &[])
            .map(|_| ())
            .map_err(anyhow::Error::from),
    );
    list.check("upload a file", {
        let upload = output_dir.join("sanity_check.txt");
        fs::write(&upload, "payload\n").context("writing probe file")?;
        db.write_file(graceid, &upload)
            .map(|_| ())
            .map_err(anyhow::Error::from)
    });
    list.check(
        "apply a label",
        db.write_label(graceid, &Label::parse("INJ")?)
            .map(|_| ())
            .map_err(anyhow::Error::from),
    );
    list.check(
        "label removal is refused",
        match db.remove_label(graceid, &Label::parse("INJ")?) {
            Err(Error::NotSupported(_)) => Ok(()),
            Err(err) => bail!("wrong error: {err}"),
            Ok(()) => bail!("removal unexpectedly succeeded"),
        },
    );

    // Listings.
    list.check("log sequence is dense", {
        let page = db.logs(graceid)?;
        if page.num_rows != page.log.len() {
            bail!("numRows {} != {} entries", page.num_rows, page.log.len());
        }
        for (ind, entry) in page.log.iter().enumerate() {
            if entry.n != ind {
                bail!("entry {ind} numbered {}", entry.n);
            }
        }
        Ok(())
    });
    list.check("file listing holds the upload", {
        let files = db.files(graceid)?;
        if files.contains_key("sanity_check.txt") {
            Ok(())
        } else {
            bail!("sanity_check.txt missing from {:?}", files.keys())
        }
    });
    list.check("label listing holds the label", {
        let labels = db.labels(graceid)?;
        if labels.iter().any(|l| l.name.as_str() == "INJ") {
            Ok(())
        } else {
            bail!("INJ missing")
        }
    });

    // Audit: creation emitted `new` first, every mutation an alert.
    list.check("audit trail starts with a creation alert", {
        let mut monitor = AlertMonitor::attach_from_start(db.alert_path())?;
        let alerts: Vec<_> = monitor
            .poll()?
            .into_iter()
            .filter(|(_, m)| m.uid == graceid)
            .collect();
        match alerts.first() {
            Some((channel, first)) if matches!(first.alert_type, AlertType::New) => {
                if channel == &classification.channel() {
                    Ok(())
                } else {
                    bail!("creation alert on channel {channel}")
                }
            }
            Some((_, first)) => bail!("first alert is {:?}", first.alert_type),
            None => bail!("no alerts for {graceid}"),
        }
    });

    if list.failed > 0 {
        bail!("{} check(s) failed", list.failed);
    }
    println!("all checks passed");
    Ok(())
}
