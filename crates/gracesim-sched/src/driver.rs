//! Replays an anchored schedule against a backend.
//!
//! The driver iterates a schedule front to back: block until each
//! action's deadline, execute it, move on. Execution order is the
//! schedule's sorted order — a guarantee on issue order, not firing
//! time. If one action overruns the gap to the next deadline, the next
//! wait is simply a no-op; nothing is dropped for being late.
//!
//! What happens on a failed action is the caller's policy, expressed
//! through [`FailureHandler`]: collect-and-continue for permission
//! probing and bulk simulation, abort for strict runs, or an
//! interactive confirmation at the CLI seam.

use tracing::{debug, info, warn};

use gracesim_core::{error_family, Error, EventDb, Result};

use crate::action::Action;
use crate::clock::Clock;
use crate::schedule::Schedule;

/// Decides whether a run continues after a failed action.
pub trait FailureHandler {
    /// Called with the failed action and its error; return `true` to
    /// keep going, `false` to abort the run.
    fn on_failure(&mut self, action: &Action, err: &Error) -> bool;
}

/// Aborts the run on the first failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortOnFailure;

impl FailureHandler for AbortOnFailure {
    fn on_failure(&mut self, _action: &Action, _err: &Error) -> bool {
        false
    }
}

/// Collects failures and keeps going.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinueOnFailure;

impl FailureHandler for ContinueOnFailure {
    fn on_failure(&mut self, _action: &Action, _err: &Error) -> bool {
        true
    }
}

/// Outcome of one driven schedule.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Actions executed (or printed, under dry-run).
    pub executed: usize,
    /// Actions that completed without error.
    pub succeeded: usize,
    /// Failed actions: a printable summary plus the error.
    pub failures: Vec<(String, Error)>,
}

impl RunReport {
    /// Returns true if every executed action succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives schedules to completion with real or simulated pacing.
pub struct Driver<C> {
    clock: C,
    dry_run: bool,
}

impl<C: Clock> Driver<C> {
    /// Creates a driver over the given clock.
    #[must_use]
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            dry_run: false,
        }
    }

    /// Print-only mode: actions are traced at their deadlines but
    /// never executed.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the driver's clock.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Replays `schedule` against `db` in order.
    ///
    /// The schedule must be anchored; the run aborts with
    /// [`Error::DeadlineUnset`] at the first unanchored action.
    ///
    /// # Errors
    ///
    /// Returns the failing action's error when `handler` declines to
    /// continue. Failures the handler absorbs land in the report
    /// instead.
    pub fn run(
        &self,
        schedule: Schedule,
        db: &dyn EventDb,
        handler: &mut dyn FailureHandler,
    ) -> Result<RunReport> {
        let mut report = RunReport::default();
        info!(actions = schedule.len(), dry_run = self.dry_run, "starting schedule replay");

        for action in schedule {
            let deadline = action.deadline().ok_or(Error::DeadlineUnset)?;
            self.clock.sleep_until(deadline);
            debug!(action = %action, "executing");
            report.executed += 1;

            if self.dry_run {
                report.succeeded += 1;
                continue;
            }
            match action.execute(db) {
                Ok(()) => report.succeeded += 1,
                Err(err) => {
                    warn!(action = %action, family = error_family(&err), %err, "action failed");
                    let keep_going = handler.on_failure(&action, &err);
                    report.failures.push((action.to_string(), err));
                    if !keep_going {
                        let (_, err) = report.failures.pop().expect("just pushed");
                        return Err(err);
                    }
                }
            }
        }

        info!(
            executed = report.executed,
            succeeded = report.succeeded,
            failed = report.failures.len(),
            "schedule replay finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Op;
    use crate::clock::SimulatedClock;
    use crate::handle::EventHandle;
    use chrono::TimeZone;
    use chrono::Utc;
    use gracesim_core::{Classification, FakeDb, Group, Label, Pipeline};
    use std::time::Duration;
    use tempfile::TempDir;

    fn anchored(actions: Vec<Action>, t0: chrono::DateTime<Utc>) -> Schedule {
        let mut schedule = Schedule::new();
        schedule.insert_batch(actions);
        schedule.anchor(t0);
        schedule
    }

    #[test]
    fn replays_in_order_with_recorded_waits() {
        let tmp = TempDir::new().unwrap();
        let db = FakeDb::open(tmp.path().join("db")).unwrap();
        let coinc = tmp.path().join("coinc.json");
        std::fs::write(&coinc, "{}").unwrap();

        let handle = EventHandle::new();
        let actions = vec![
            Action::new(
                0.0,
                Op::CreateEvent {
                    handle: handle.clone(),
                    classification: Classification::new(Group::Test, Pipeline::Gstlal, None),
                    initial_file: coinc,
                },
            ),
            Action::new(
                2.0,
                Op::WriteLabel {
                    handle: handle.clone(),
                    label: Label::parse("EM_READY").unwrap(),
                },
            ),
        ];

        let t0 = Utc.with_ymd_and_hms(2016, 1, 19, 0, 0, 0).unwrap();
        let driver = Driver::new(SimulatedClock::starting_at(t0));
        let report = driver
            .run(anchored(actions, t0), &db, &mut AbortOnFailure)
            .unwrap();

        assert_eq!(report.executed, 2);
        assert!(report.is_clean());
        assert_eq!(
            driver.clock().waits(),
            vec![Duration::ZERO, Duration::from_secs(2)]
        );

        let id = handle.get().unwrap();
        let labels = db.labels(id).unwrap();
        assert_eq!(labels[0].name.as_str(), "EM_READY");
    }

    #[test]
    fn continue_policy_collects_failures() {
        let tmp = TempDir::new().unwrap();
        let db = FakeDb::open(tmp.path().join("db")).unwrap();

        // Annotating before creation is a state error per action.
        let orphan = EventHandle::new();
        let actions = vec![
            Action::new(
                0.0,
                Op::WriteLog {
                    handle: orphan.clone(),
                    message: "too early".to_string(),
                    filename: None,
                    tag_names: Vec::new(),
                },
            ),
            Action::new(
                1.0,
                Op::RemoveLabel {
                    handle: orphan,
                    label: Label::parse("INJ").unwrap(),
                },
            ),
        ];

        let t0 = Utc.with_ymd_and_hms(2016, 1, 19, 0, 0, 0).unwrap();
        let driver = Driver::new(SimulatedClock::starting_at(t0));
        let report = driver
            .run(anchored(actions, t0), &db, &mut ContinueOnFailure)
            .unwrap();

        assert_eq!(report.executed, 2);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failures.len(), 2);
    }

    #[test]
    fn abort_policy_stops_at_first_failure() {
        let tmp = TempDir::new().unwrap();
        let db = FakeDb::open(tmp.path().join("db")).unwrap();

        let orphan = EventHandle::new();
        let actions = vec![Action::new(
            0.0,
            Op::WriteLog {
                handle: orphan,
                message: "too early".to_string(),
                filename: None,
                tag_names: Vec::new(),
            },
        )];

        let t0 = Utc.with_ymd_and_hms(2016, 1, 19, 0, 0, 0).unwrap();
        let driver = Driver::new(SimulatedClock::starting_at(t0));
        let err = driver
            .run(anchored(actions, t0), &db, &mut AbortOnFailure)
            .unwrap_err();
        assert!(matches!(err, Error::NotYetAssigned));
    }

    #[test]
    fn unanchored_schedule_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let db = FakeDb::open(tmp.path().join("db")).unwrap();

        let mut schedule = Schedule::new();
        schedule.insert(Action::new(
            0.0,
            Op::WriteLog {
                handle: EventHandle::new(),
                message: String::new(),
                filename: None,
                tag_names: Vec::new(),
            },
        ));

        let t0 = Utc.with_ymd_and_hms(2016, 1, 19, 0, 0, 0).unwrap();
        let driver = Driver::new(SimulatedClock::starting_at(t0));
        let err = driver.run(schedule, &db, &mut AbortOnFailure).unwrap_err();
        assert!(matches!(err, Error::DeadlineUnset));
    }

    #[test]
    fn dry_run_executes_nothing() {
        let tmp = TempDir::new().unwrap();
        let db = FakeDb::open(tmp.path().join("db")).unwrap();
        let coinc = tmp.path().join("coinc.json");
        std::fs::write(&coinc, "{}").unwrap();

        let handle = EventHandle::new();
        let actions = vec![Action::new(
            0.0,
            Op::CreateEvent {
                handle: handle.clone(),
                classification: Classification::new(Group::Test, Pipeline::Gstlal, None),
                initial_file: coinc,
            },
        )];

        let t0 = Utc.with_ymd_and_hms(2016, 1, 19, 0, 0, 0).unwrap();
        let driver = Driver::new(SimulatedClock::starting_at(t0)).dry_run(true);
        let report = driver
            .run(anchored(actions, t0), &db, &mut AbortOnFailure)
            .unwrap();

        assert_eq!(report.executed, 1);
        assert!(handle.get_or_none().is_none());
        assert!(db.ids().unwrap().is_empty());
    }
}
