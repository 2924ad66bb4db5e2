//! Shared building blocks for probability-gated upload chains.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::Deserialize;

use gracesim_core::{Error, Result};
use gracesim_sched::{Action, EventHandle, Op};

use crate::arrival::jittered;

fn certain_prob() -> f64 {
    1.0
}

/// One probability-gated step of a follow-up chain.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Stage {
    /// Mean delay added when the stage runs.
    pub delay: f64,
    /// Standard deviation of the delay.
    #[serde(default)]
    pub jitter: f64,
    /// Probability the stage runs at all.
    #[serde(default = "certain_prob")]
    pub prob: f64,
}

impl Stage {
    /// A stage with the given mean delay and jitter, certain to run.
    #[must_use]
    pub fn certain(delay: f64, jitter: f64) -> Self {
        Self {
            delay,
            jitter,
            prob: 1.0,
        }
    }

    /// Rolls the stage's gate.
    pub fn passes<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen::<f64>() < self.prob
    }

    /// Draws the stage's jittered delay.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        jittered(self.delay, self.jitter, rng)
    }
}

/// Creates an empty upload payload on disk.
pub(crate) fn touch(path: &Path) -> Result<()> {
    fs::write(path, b"").map_err(|e| Error::io(format!("touching {}", path.display()), e))
}

/// A log-entry action at the given relative delay.
pub(crate) fn log(
    handle: &EventHandle,
    dt: f64,
    message: &str,
    filename: Option<PathBuf>,
    tags: &[String],
) -> Action {
    Action::new(
        dt,
        Op::WriteLog {
            handle: handle.clone(),
            message: message.to_string(),
            filename,
            tag_names: tags.to_vec(),
        },
    )
}
