//! Miscellaneous follow-ups that don't belong to dq or pe.

use rand::Rng;

use gracesim_sched::{EventHandle, Schedule};

use crate::chain::{log, Stage};

/// The external GRB/neutrino coincidence search report.
#[derive(Debug, Clone)]
pub struct ExternalTriggers {
    /// Gate and delay for the completion message.
    pub report: Stage,
}

impl ExternalTriggers {
    /// Creates the coincidence-search reporter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            report: Stage::certain(60.0, 10.0),
        }
    }

    /// Builds the single completion message, if the gate passes.
    #[must_use]
    pub fn gen_schedule<R: Rng + ?Sized>(&self, handle: &EventHandle, rng: &mut R) -> Schedule {
        let mut sched = Schedule::new();
        if self.report.passes(rng) {
            sched.insert(log(
                handle,
                self.report.draw(rng),
                "Coincidence search complete",
                None,
                &[],
            ));
        }
        sched
    }
}

impl Default for ExternalTriggers {
    fn default() -> Self {
        Self::new()
    }
}

/// The unblind-injection check report.
#[derive(Debug, Clone)]
pub struct UnblindInjections {
    /// Gate and delay for the report message.
    pub report: Stage,
}

impl UnblindInjections {
    /// Creates the injection-check reporter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            report: Stage::certain(60.0, 10.0),
        }
    }

    /// Builds the single report message, if the gate passes.
    #[must_use]
    pub fn gen_schedule<R: Rng + ?Sized>(&self, handle: &EventHandle, rng: &mut R) -> Schedule {
        let mut sched = Schedule::new();
        if self.report.passes(rng) {
            sched.insert(log(
                handle,
                self.report.draw(rng),
                "No unblind injections in window",
                None,
                &[],
            ));
        }
        sched
    }
}

impl Default for UnblindInjections {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gracesim_sched::Op;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn reports_when_gate_passes() {
        let mut rng = StdRng::seed_from_u64(1);
        let sched = ExternalTriggers::new().gen_schedule(&EventHandle::new(), &mut rng);
        assert_eq!(sched.len(), 1);
        let Op::WriteLog { message, .. } = sched.iter().next().unwrap().op() else {
            unreachable!()
        };
        assert_eq!(message, "Coincidence search complete");
    }

    #[test]
    fn silent_when_gated_off() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut check = UnblindInjections::new();
        check.report.prob = 0.0;
        let sched = check.gen_schedule(&EventHandle::new(), &mut rng);
        assert!(sched.is_empty());
    }
}
