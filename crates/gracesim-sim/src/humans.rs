//! Human signoff simulation.
//!
//! Candidates above threshold get vetted by control-room operators at
//! each site and by an EM-followup advocate. Both interactions are the
//! same shape: a request label goes up shortly after creation, and a
//! decision label follows after a longer, jittered think time. The
//! decision never lands before the request.

use rand::Rng;

use gracesim_core::{Label, Result};
use gracesim_sched::{Action, EventHandle, Op, Schedule};

use crate::arrival::jittered;

/// Who is signing off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignoffRole {
    /// A detector site operator (H1 or L1).
    Site(String),
    /// The EM-followup advocate.
    Advocate,
}

impl SignoffRole {
    /// Label requesting this signoff.
    fn request_label(&self) -> String {
        match self {
            // Site requests go through the operator queue.
            Self::Site(ifo) => format!("{ifo}OPS"),
            Self::Advocate => "ADVREQ".to_string(),
        }
    }

    /// Label recording the decision.
    fn decision_label(&self, approved: bool) -> String {
        let name = match self {
            Self::Site(ifo) => ifo.as_str(),
            Self::Advocate => "ADV",
        };
        if approved {
            format!("{name}OK")
        } else {
            format!("{name}NO")
        }
    }
}

/// One human's signoff behavior for one event.
#[derive(Debug, Clone)]
pub struct Signoff {
    role: SignoffRole,
    /// Mean delay before the request label, and its jitter.
    pub request_delay: f64,
    /// Standard deviation of the request delay.
    pub request_jitter: f64,
    /// Mean think time before the decision label.
    pub respond_delay: f64,
    /// Standard deviation of the think time.
    pub respond_jitter: f64,
    /// Probability the human responds at all.
    pub respond_prob: f64,
    /// Probability the decision is an approval.
    pub success_prob: f64,
}

impl Signoff {
    /// Creates a signoff with no delay and certain approval; adjust
    /// the public fields to taste.
    #[must_use]
    pub fn new(role: SignoffRole) -> Self {
        Self {
            role,
            request_delay: 0.0,
            request_jitter: 0.0,
            respond_delay: 60.0,
            respond_jitter: 10.0,
            respond_prob: 1.0,
            success_prob: 1.0,
        }
    }

    /// Builds this human's label actions.
    ///
    /// `request` and `respond` switch the two halves independently.
    /// When both are on, the decision delay is floored at the request
    /// delay so the decision never precedes its own request.
    ///
    /// # Errors
    ///
    /// Returns [`gracesim_core::Error::InvalidLabel`] only if the role
    /// produces a name outside the label vocabulary, which indicates a
    /// misconfigured site name.
    pub fn gen_schedule<R: Rng + ?Sized>(
        &self,
        handle: &EventHandle,
        request: bool,
        respond: bool,
        rng: &mut R,
    ) -> Result<Schedule> {
        let mut sched = Schedule::new();

        let mut request_dt = 0.0;
        if request {
            request_dt = jittered(self.request_delay, self.request_jitter, rng);
            sched.insert(Action::new(
                request_dt,
                Op::WriteLabel {
                    handle: handle.clone(),
                    label: Label::parse(&self.role.request_label())?,
                },
            ));
        }

        if respond && rng.gen::<f64>() < self.respond_prob {
            let mut respond_dt = jittered(self.respond_delay, self.respond_jitter, rng);
            if request {
                respond_dt = respond_dt.max(request_dt);
            }
            let approved = rng.gen::<f64>() < self.success_prob;
            sched.insert(Action::new(
                respond_dt,
                Op::WriteLabel {
                    handle: handle.clone(),
                    label: Label::parse(&self.role.decision_label(approved))?,
                },
            ));
        }

        Ok(sched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn labels(sched: &Schedule) -> Vec<String> {
        sched
            .iter()
            .map(|a| match a.op() {
                Op::WriteLabel { label, .. } => label.as_str().to_string(),
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn site_request_and_approval() {
        let mut rng = StdRng::seed_from_u64(3);
        let signoff = Signoff::new(SignoffRole::Site("H1".to_string()));
        let sched = signoff
            .gen_schedule(&EventHandle::new(), true, true, &mut rng)
            .unwrap();
        assert_eq!(labels(&sched), vec!["H1OPS", "H1OK"]);
    }

    #[test]
    fn advocate_rejection() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut signoff = Signoff::new(SignoffRole::Advocate);
        signoff.success_prob = 0.0;
        let sched = signoff
            .gen_schedule(&EventHandle::new(), true, true, &mut rng)
            .unwrap();
        assert_eq!(labels(&sched), vec!["ADVREQ", "ADVNO"]);
    }

    #[test]
    fn decision_never_precedes_request() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut signoff = Signoff::new(SignoffRole::Site("L1".to_string()));
        // Large request jitter forces overlap with the response draw.
        signoff.request_delay = 120.0;
        signoff.request_jitter = 60.0;
        signoff.respond_delay = 30.0;
        signoff.respond_jitter = 5.0;

        for _ in 0..100 {
            let sched = signoff
                .gen_schedule(&EventHandle::new(), true, true, &mut rng)
                .unwrap();
            // The decision is floored at the request delay, so the
            // request label always sorts first (ties keep insertion
            // order).
            let seen = labels(&sched);
            assert_eq!(seen.len(), 2);
            assert_eq!(seen[0], "L1OPS");
        }
    }

    #[test]
    fn silent_human_produces_no_decision() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut signoff = Signoff::new(SignoffRole::Site("H1".to_string()));
        signoff.respond_prob = 0.0;
        let sched = signoff
            .gen_schedule(&EventHandle::new(), true, true, &mut rng)
            .unwrap();
        assert_eq!(labels(&sched), vec!["H1OPS"]);
    }

    #[test]
    fn unknown_site_is_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        let signoff = Signoff::new(SignoffRole::Site("V1".to_string()));
        assert!(signoff
            .gen_schedule(&EventHandle::new(), true, true, &mut rng)
            .is_err());
    }
}
