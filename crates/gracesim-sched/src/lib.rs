//! Delayed-action scheduling for event-candidate simulation.
//!
//! This crate turns "what should happen to an event, and when" into a
//! replayable plan:
//!
//! - [`EventHandle`] shares a not-yet-assigned identifier between the
//!   actions of one logical event.
//! - [`Action`] and [`Op`] describe one deferred operation against an
//!   event store.
//! - [`Schedule`] keeps actions sorted by delay with stable ties, and
//!   merges plan fragments.
//! - [`Driver`] anchors nothing itself; it replays an already-anchored
//!   schedule against an [`EventDb`](gracesim_core::EventDb) behind a
//!   [`Clock`], applying a caller-supplied failure policy.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod action;
pub mod clock;
pub mod driver;
pub mod handle;
pub mod schedule;

pub use action::{secs_to_duration, Action, Op};
pub use clock::{Clock, SimulatedClock, SystemClock};
pub use driver::{AbortOnFailure, ContinueOnFailure, Driver, FailureHandler, RunReport};
pub use handle::EventHandle;
pub use schedule::Schedule;
