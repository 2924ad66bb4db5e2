//! Follow-up generators for event-candidate simulation.
//!
//! Everything that reacts to a candidate in the real system has a
//! simulator here: the search pipelines that create events
//! ([`pipelines`]), control-room and advocate signoffs ([`humans`]),
//! data-quality products ([`dq`]), parameter-estimation engines
//! ([`pe`]), and a few loose reporters ([`misc`]). Each produces a
//! [`Schedule`](gracesim_sched::Schedule) fragment of relative-delay
//! actions; [`config::gen_schedule`] composes the fragments for one
//! event from a TOML event-type description.
//!
//! All randomness flows through a caller-supplied [`rand::Rng`], so a
//! seeded `StdRng` reproduces a run exactly.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod arrival;
pub mod chain;
pub mod config;
pub mod dq;
pub mod humans;
pub mod misc;
pub mod pe;
pub mod pipelines;

pub use arrival::ArrivalDistribution;
pub use chain::Stage;
pub use config::{gen_schedule, EventConfig};
pub use pipelines::PipelineEvent;
