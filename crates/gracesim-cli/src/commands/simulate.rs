//! Simulate command - submit a stream of fake candidates.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use clap::{ArgGroup, Args};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use gracesim_core::FakeDb;
use gracesim_sched::{ContinueOnFailure, Driver, Schedule, SystemClock};
use gracesim_sim::{config, ArrivalDistribution, EventConfig};

/// Arrival distribution choices exposed on the command line.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum Distrib {
    /// Poisson process: exponentially distributed gaps.
    Poisson,
    /// Fixed gaps of `1/rate`.
    #[default]
    Uniform,
}

impl From<Distrib> for ArrivalDistribution {
    fn from(d: Distrib) -> Self {
        match d {
            Distrib::Poisson => Self::Poisson,
            Distrib::Uniform => Self::Uniform,
        }
    }
}

/// Arguments for the simulate command.
#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("extent")
        .required(true)
        .args(["num_events", "duration"]),
))]
pub struct SimulateArgs {
    /// Number of events to simulate.
    #[arg(long, short = 'N')]
    pub num_events: Option<u64>,

    /// Duration of the experiment in seconds.
    #[arg(long, short = 'D')]
    pub duration: Option<f64>,

    /// Event rate in Hz.
    #[arg(long, short = 'r', default_value = "0.1")]
    pub event_rate: f64,

    /// Distribution of events in time.
    #[arg(long, default_value = "uniform")]
    pub distrib: Distrib,

    /// Comma-delimited list of participating detectors.
    #[arg(long, short = 'i', value_delimiter = ',', required = true)]
    pub instruments: Vec<String>,

    /// Seconds waited between building the schedule and executing it.
    #[arg(long, short = 'p', default_value = "5.0")]
    pub pause: f64,

    /// False-alarm rate assigned to every candidate.
    #[arg(long, default_value = "1e-9")]
    pub far: f64,

    /// Seed for the random generator; omit for a fresh run each time.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Allow event creation with a group other than Test.
    #[arg(long, short = 's')]
    pub unsafe_uploads: bool,

    /// Print the schedule without executing anything.
    #[arg(long, short = 'T')]
    pub dry_run: bool,

    /// Print every scheduled action before the run starts.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Event-type config files; one is chosen at random per event.
    #[arg(required = true)]
    pub configs: Vec<PathBuf>,
}

/// Seconds between the GPS epoch (1980-01-06) and now, ignoring leap
/// seconds; close enough for fake payloads.
fn gps_now() -> f64 {
    let epoch = Utc.with_ymd_and_hms(1980, 1, 6, 0, 0, 0).single();
    let epoch = epoch.unwrap_or_else(Utc::now);
    let elapsed = Utc::now() - epoch;
    elapsed.num_milliseconds() as f64 / 1000.0
}

/// Execute the simulate command.
///
/// # Errors
///
/// Returns an error for bad arguments, unreadable configs, or a store
/// failure the continue policy cannot absorb.
pub fn execute(args: &SimulateArgs, output_dir: &Path) -> Result<()> {
    if args.instruments.len() < 2 {
        bail!("please specify at least 2 detectors via --instruments");
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output dir {}", output_dir.display()))?;

    let configs: Vec<EventConfig> = args
        .configs
        .iter()
        .map(|path| {
            EventConfig::load(path).with_context(|| format!("loading {}", path.display()))
        })
        .collect::<Result<_>>()?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let waits = draw_waits(args, &mut rng);
    if waits.is_empty() {
        println!("no event times drawn; nothing to do");
        return Ok(());
    }
    info!(
        events = waits.len(),
        rate = args.event_rate,
        "drew event times spanning {:.3} sec",
        waits.iter().sum::<f64>()
    );

    // Compose one global schedule: each event's fragment keeps its
    // internal relative delays and is shifted out to its arrival time.
    let db = FakeDb::open(output_dir)?;
    let start_gps = gps_now();
    let mut sched = Schedule::new();
    let mut delay = 0.0;
    for (ind, wait) in waits.iter().enumerate() {
        delay += wait;
        let config = configs.choose(&mut rng).context("no event configs")?;
        let (_, mut fragment) = config::gen_schedule(
            start_gps + delay,
            args.far,
            &args.instruments,
            config,
            !args.unsafe_uploads,
            output_dir,
            &mut rng,
        )?;
        info!(event = ind, delay, actions = fragment.len(), "composed event fragment");
        fragment.shift_delay(delay);
        sched.append(&mut fragment);
    }

    sched.anchor(Utc::now());
    sched.shift_deadline(args.pause)?;
    if args.verbose {
        for action in sched.iter() {
            println!("  {action}");
        }
    }

    let driver = Driver::new(SystemClock).dry_run(args.dry_run);
    let report = driver.run(sched, &db, &mut ContinueOnFailure)?;

    println!(
        "executed {} actions: {} succeeded, {} failed",
        report.executed,
        report.succeeded,
        report.failures.len()
    );
    for (action, err) in &report.failures {
        println!("  FAILED {action}: {err}");
    }
    Ok(())
}

fn draw_waits<R: Rng + ?Sized>(args: &SimulateArgs, rng: &mut R) -> Vec<f64> {
    let distrib = ArrivalDistribution::from(args.distrib);
    let mut waits = Vec::new();
    if let Some(n) = args.num_events {
        while (waits.len() as u64) < n {
            waits.push(distrib.draw_dt(args.event_rate, rng));
        }
    } else if let Some(duration) = args.duration {
        let mut t = 0.0;
        loop {
            let dt = distrib.draw_dt(args.event_rate, rng);
            t += dt;
            if t >= duration {
                break;
            }
            waits.push(dt);
        }
    }
    // The first event fires immediately.
    if let Some(first) = waits.first_mut() {
        *first = 0.0;
    }
    waits
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: SimulateArgs,
    }

    fn parse(argv: &[&str]) -> SimulateArgs {
        Harness::parse_from(argv).args
    }

    #[test]
    fn first_wait_is_forced_to_zero() {
        let args = parse(&[
            "x", "--num-events", "4", "--instruments", "H1,L1", "events.toml",
        ]);
        let mut rng = StdRng::seed_from_u64(1);
        let waits = draw_waits(&args, &mut rng);
        assert_eq!(waits.len(), 4);
        assert!((waits[0]).abs() < f64::EPSILON);
        // Uniform default: remaining gaps are exactly 1/rate.
        for wait in &waits[1..] {
            assert!((wait - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn duration_bounds_the_event_train() {
        let args = parse(&[
            "x", "--duration", "35", "--instruments", "H1,L1", "events.toml",
        ]);
        let mut rng = StdRng::seed_from_u64(1);
        let waits = draw_waits(&args, &mut rng);
        // Gaps of 10 s fit at 10, 20, 30 within 35 s.
        assert_eq!(waits.len(), 3);
    }

    #[test]
    fn gps_epoch_is_in_the_past() {
        assert!(gps_now() > 1e9);
    }
}
