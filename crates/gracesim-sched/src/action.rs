//! A unit of deferred work.
//!
//! An [`Action`] pairs a relative delay with one operation from the
//! closed [`Op`] set. Its deadline stays undefined until the owning
//! schedule is anchored to a reference time; waiting on or
//! expiry-testing an undeadlined action is a state error.
//!
//! Execution dispatches by exhaustive match on the operation kind —
//! never by inspecting concrete types — and goes through the
//! [`EventDb`] trait, so the same plan replays against the fake store
//! or a real backend client.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};

use gracesim_core::{Classification, Error, EventDb, Label, Result};

use crate::handle::EventHandle;

/// Converts fractional seconds into a chrono duration.
///
/// Sub-microsecond residue is dropped; delays are jittered human and
/// pipeline timescales, not precision timestamps.
#[must_use]
pub fn secs_to_duration(secs: f64) -> Duration {
    Duration::microseconds((secs * 1e6) as i64)
}

/// The closed set of operations an action can perform.
#[derive(Debug, Clone)]
pub enum Op {
    /// Create the event record and assign its identifier into the
    /// shared handle.
    CreateEvent {
        /// Handle the new identifier is published through.
        handle: EventHandle,
        /// Classification triple for the new record.
        classification: Classification,
        /// The pipeline's initial-data upload.
        initial_file: PathBuf,
    },
    /// Append a log entry, optionally attaching one file.
    WriteLog {
        /// Handle resolving the target event.
        handle: EventHandle,
        /// Message text.
        message: String,
        /// Optional file to attach.
        filename: Option<PathBuf>,
        /// Tags for the entry.
        tag_names: Vec<String>,
    },
    /// Apply a label (the store couples a log entry to it).
    WriteLabel {
        /// Handle resolving the target event.
        handle: EventHandle,
        /// The label to apply.
        label: Label,
    },
    /// Remove a label; always fails, mirroring the real service.
    RemoveLabel {
        /// Handle resolving the target event.
        handle: EventHandle,
        /// The label that would be removed.
        label: Label,
    },
    /// Upload a file (an empty-message log entry).
    WriteFile {
        /// Handle resolving the target event.
        handle: EventHandle,
        /// The file to upload.
        filename: PathBuf,
    },
}

impl Op {
    /// Returns the handle this operation targets.
    #[must_use]
    pub fn handle(&self) -> &EventHandle {
        match self {
            Self::CreateEvent { handle, .. }
            | Self::WriteLog { handle, .. }
            | Self::WriteLabel { handle, .. }
            | Self::RemoveLabel { handle, .. }
            | Self::WriteFile { handle, .. } => handle,
        }
    }

    /// Returns the operation kind name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreateEvent { .. } => "CreateEvent",
            Self::WriteLog { .. } => "WriteLog",
            Self::WriteLabel { .. } => "WriteLabel",
            Self::RemoveLabel { .. } => "RemoveLabel",
            Self::WriteFile { .. } => "WriteFile",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tolerate an unassigned handle: actions are printed for
        // diagnostics before creation runs.
        let target = self
            .handle()
            .get_or_none()
            .map_or_else(|| "<unassigned>".to_string(), |id| id.to_string());
        match self {
            Self::CreateEvent { classification, .. } => {
                write!(f, "CreateEvent({classification})")
            }
            Self::WriteLog { message, .. } => write!(f, "WriteLog({target}, {message:?})"),
            Self::WriteLabel { label, .. } => write!(f, "WriteLabel({target}, {label})"),
            Self::RemoveLabel { label, .. } => write!(f, "RemoveLabel({target}, {label})"),
            Self::WriteFile { filename, .. } => {
                write!(f, "WriteFile({target}, {})", filename.display())
            }
        }
    }
}

/// One deferred operation with its scheduling state.
#[derive(Debug, Clone)]
pub struct Action {
    delay_secs: f64,
    deadline: Option<DateTime<Utc>>,
    op: Op,
}

impl Action {
    /// Creates an action that should run `delay_secs` after the
    /// schedule's reference time.
    #[must_use]
    pub fn new(delay_secs: f64, op: Op) -> Self {
        Self {
            delay_secs,
            deadline: None,
            op,
        }
    }

    /// Returns the relative delay in seconds.
    #[must_use]
    pub fn delay_secs(&self) -> f64 {
        self.delay_secs
    }

    /// Returns the absolute deadline, if anchored.
    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Returns the operation.
    #[must_use]
    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Adds `dt` seconds to the relative delay (pre-anchor shift).
    pub(crate) fn shift_delay(&mut self, dt: f64) {
        self.delay_secs += dt;
    }

    /// Adds `dt` seconds to the assigned deadline (post-anchor shift).
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeadlineUnset`] if not anchored.
    pub(crate) fn shift_deadline(&mut self, dt: f64) -> Result<()> {
        match self.deadline.as_mut() {
            Some(deadline) => {
                *deadline += secs_to_duration(dt);
                Ok(())
            }
            None => Err(Error::DeadlineUnset),
        }
    }

    /// Derives the absolute deadline from a reference time.
    pub fn set_deadline(&mut self, reference: DateTime<Utc>) {
        self.deadline = Some(reference + secs_to_duration(self.delay_secs));
    }

    /// Returns true if the deadline has passed at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeadlineUnset`] if not anchored.
    pub fn has_expired(&self, now: DateTime<Utc>) -> Result<bool> {
        self.deadline.map(|d| now > d).ok_or(Error::DeadlineUnset)
    }

    /// Executes the operation against `db`.
    ///
    /// A failed execution leaves the store unchanged; failures are
    /// never retried here — the driver decides what happens next.
    ///
    /// # Errors
    ///
    /// Propagates the store's rejection, or the handle's state error
    /// when the target event has not been created yet.
    pub fn execute(&self, db: &dyn EventDb) -> Result<()> {
        match &self.op {
            Op::CreateEvent {
                handle,
                classification,
                initial_file,
            } => {
                let record = db.create_event(*classification, initial_file)?;
                handle.set(record.graceid)
            }
            Op::WriteLog {
                handle,
                message,
                filename,
                tag_names,
            } => {
                db.write_log(handle.get()?, message, filename.as_deref(), tag_names)?;
                Ok(())
            }
            Op::WriteLabel { handle, label } => {
                db.write_label(handle.get()?, label)?;
                Ok(())
            }
            Op::RemoveLabel { handle, label } => db.remove_label(handle.get()?, label),
            Op::WriteFile { handle, filename } => {
                db.write_file(handle.get()?, filename)?;
                Ok(())
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{:.3}s {}", self.delay_secs, self.op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn log_action(delay: f64) -> Action {
        Action::new(
            delay,
            Op::WriteLog {
                handle: EventHandle::new(),
                message: "hello".to_string(),
                filename: None,
                tag_names: Vec::new(),
            },
        )
    }

    #[test]
    fn deadline_is_reference_plus_delay() {
        let mut action = log_action(2.5);
        let t0 = Utc.with_ymd_and_hms(2016, 1, 19, 0, 0, 0).unwrap();
        action.set_deadline(t0);
        assert_eq!(
            action.deadline().unwrap(),
            t0 + Duration::milliseconds(2500)
        );
    }

    #[test]
    fn expiry_requires_a_deadline() {
        let action = log_action(0.0);
        assert!(matches!(
            action.has_expired(Utc::now()),
            Err(Error::DeadlineUnset)
        ));
    }

    #[test]
    fn shift_deadline_requires_anchor() {
        let mut action = log_action(1.0);
        assert!(matches!(
            action.shift_deadline(5.0),
            Err(Error::DeadlineUnset)
        ));
        action.set_deadline(Utc::now());
        assert!(action.shift_deadline(5.0).is_ok());
    }

    #[test]
    fn display_tolerates_unassigned_handle() {
        let text = log_action(1.0).to_string();
        assert!(text.contains("<unassigned>"), "{text}");
    }
}
