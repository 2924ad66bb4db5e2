//! Inter-event arrival times.

use rand::Rng;
use serde::Deserialize;

/// How gaps between simulated events are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrivalDistribution {
    /// Exponential gaps: events form a Poisson process at the given
    /// rate.
    Poisson,
    /// A fixed gap of `1/rate` between events.
    #[default]
    Uniform,
}

impl ArrivalDistribution {
    /// Draws one inter-event gap in seconds for the given rate in Hz.
    pub fn draw_dt<R: Rng + ?Sized>(self, rate: f64, rng: &mut R) -> f64 {
        match self {
            Self::Poisson => poisson_dt(rate, rng),
            Self::Uniform => uniform_dt(rate),
        }
    }
}

/// Exponentially distributed gap via inverse-CDF sampling.
pub fn poisson_dt<R: Rng + ?Sized>(rate: f64, rng: &mut R) -> f64 {
    let u: f64 = rng.gen();
    -(1.0 - u).ln() / rate
}

/// The fixed gap of a uniform event train.
#[must_use]
pub fn uniform_dt(rate: f64) -> f64 {
    1.0 / rate
}

/// A normal draw around `delay` with standard deviation `jitter`,
/// clamped at zero. Degenerate jitter collapses to the mean.
pub fn jittered<R: Rng + ?Sized>(delay: f64, jitter: f64, rng: &mut R) -> f64 {
    let dt = match rand_distr::Normal::new(delay, jitter) {
        Ok(normal) => rng.sample(normal),
        Err(_) => delay,
    };
    dt.max(0.0)
}

/// A draw uniform in log-space over `[lo, hi]`, for false-alarm
/// probabilities spanning decades.
pub fn log_uniform<R: Rng + ?Sized>(lo: f64, hi: f64, rng: &mut R) -> f64 {
    let u: f64 = rng.gen();
    (lo.ln() + u * (hi.ln() - lo.ln())).exp()
}
