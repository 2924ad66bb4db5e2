//! # gracesim-core
//!
//! The fake event-candidate database and its audit side channel.
//!
//! This crate provides everything the scheduling engine executes
//! against:
//!
//! - **Identifiers & classification**: [`GraceId`] and the static
//!   (group, pipeline, search) allow-list
//! - **Labels**: the fixed workflow-state vocabulary
//! - **Store**: [`FakeDb`], a filesystem-backed stand-in for the real
//!   service's write/query API, behind the [`EventDb`] trait
//! - **Audit channel**: one [`AlertMessage`] per store mutation,
//!   broadcast over an append-only file that listeners can tail
//! - **Query mini-language**: the small grammar accepted by
//!   [`FakeDb::events`]
//!
//! The scheduling engine lives in `gracesim-sched` and the follow-up
//! generators in `gracesim-sim`; neither is needed to use the store
//! directly.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod alert;
pub mod audit;
pub mod error;
pub mod id;
pub mod initial_data;
pub mod label;
pub mod observability;
pub mod query;
pub mod store;

pub use alert::{AlertMonitor, AlertWriter};
pub use audit::{AlertMessage, AlertType};
pub use error::{error_family, Error, Result};
pub use id::{Classification, GraceId, Group, Pipeline, Search};
pub use label::Label;
pub use observability::{init_logging, LogFormat};
pub use query::Query;
pub use store::{EventDb, EventRecord, EventView, FakeDb, LabelEntry, LogEntry, LogPage};
