//! Parameter-estimation follow-up chains.
//!
//! Four engines annotate a candidate after creation: BAYESTAR (rapid
//! CBC localization), LALInference, LIB, and BayesWave. Each is one
//! probability-gated chain of log uploads culminating in a skymap, and
//! each skymap can trigger the shared plotting follow-ups (a Mollweide
//! projection and a skyviewer export) keyed off the FITS filename.

use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::debug;

use gracesim_core::Result;
use gracesim_sched::{EventHandle, Schedule};

use crate::chain::{log, touch, Stage};

const PE_TAG: &str = "pe";
const SKY_LOC_TAG: &str = "sky_loc";

/// Optional plotting follow-ups applied to an uploaded skymap.
#[derive(Debug, Clone, Default)]
pub struct SkymapFollowups {
    /// The Mollweide projection upload, if configured.
    pub plot: Option<Stage>,
    /// The skyviewer JSON export, if configured.
    pub viewer: Option<Stage>,
}

impl SkymapFollowups {
    /// Builds the follow-up actions for a skymap uploaded at `base_dt`.
    fn gen_schedule<R: Rng + ?Sized>(
        &self,
        handle: &EventHandle,
        base_dt: f64,
        fits: &str,
        out_dir: &Path,
        rng: &mut R,
    ) -> Result<Schedule> {
        let sky = [SKY_LOC_TAG.to_string()];
        let mut sched = Schedule::new();
        if let Some(plot) = self.plot.filter(|s| s.passes(rng)) {
            let filename = out_dir.join(format!("{}.png", fits_stem(fits)));
            touch(&filename)?;
            sched.insert(log(
                handle,
                base_dt + plot.draw(rng),
                &format!("Mollweide projection of {fits}"),
                Some(filename),
                &sky,
            ));
        }
        if let Some(viewer) = self.viewer.filter(|s| s.passes(rng)) {
            let filename = out_dir.join(format!("{}.json", fits_stem(fits)));
            touch(&filename)?;
            // The skyviewer upload carries no message text.
            sched.insert(log(handle, base_dt + viewer.draw(rng), "", Some(filename), &sky));
        }
        Ok(sched)
    }
}

/// The FITS filename without its `.fits[.gz]` suffix.
fn fits_stem(fits: &str) -> &str {
    fits.trim_end_matches(".gz").trim_end_matches(".fits")
}

/// The rapid BAYESTAR localization chain.
#[derive(Debug, Clone)]
pub struct Bayestar {
    /// Probability the chain runs at all.
    pub prob: f64,
    /// Delay to the "starting" announcement.
    pub start: Stage,
    /// Delay from start to the skymap upload.
    pub skymap: Stage,
    /// Delay from skymap to completion.
    pub finish: Stage,
    /// Plotting follow-ups applied to the skymap.
    pub followups: SkymapFollowups,
    out_dir: PathBuf,
}

impl Bayestar {
    /// Creates a BAYESTAR chain writing payloads into `out_dir`.
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            prob: 1.0,
            start: Stage::certain(30.0, 5.0),
            skymap: Stage::certain(10.0, 2.0),
            finish: Stage::certain(5.0, 1.0),
            followups: SkymapFollowups::default(),
            out_dir: out_dir.into(),
        }
    }

    /// Builds the localization chain.
    ///
    /// # Errors
    ///
    /// Returns [`gracesim_core::Error::Io`] if a payload cannot be
    /// written.
    pub fn gen_schedule<R: Rng + ?Sized>(
        &self,
        handle: &EventHandle,
        rng: &mut R,
    ) -> Result<Schedule> {
        let mut sched = Schedule::new();
        if rng.gen::<f64>() >= self.prob {
            debug!("BAYESTAR never ran");
            return Ok(sched);
        }

        let mut dt = self.start.draw(rng);
        sched.insert(log(handle, dt, "INFO:BAYESTAR:starting sky localization", None, &[]));

        dt += self.skymap.draw(rng);
        let fits = "bayestar.fits.gz";
        let path = self.out_dir.join(fits);
        touch(&path)?;
        sched.insert(log(
            handle,
            dt,
            "INFO:BAYESTAR:uploaded sky map",
            Some(path),
            &[SKY_LOC_TAG.to_string()],
        ));
        sched.append(&mut self.followups.gen_schedule(handle, dt, fits, &self.out_dir, rng)?);

        dt += self.finish.draw(rng);
        sched.insert(log(handle, dt, "INFO:BAYESTAR:sky localization complete", None, &[]));
        Ok(sched)
    }
}

/// The LALInference online estimation chain.
#[derive(Debug, Clone)]
pub struct LalInference {
    /// Probability the chain runs at all.
    pub prob: f64,
    /// Delay to the "started" announcement.
    pub start: Stage,
    /// Delay from start to the skymap upload.
    pub skymap: Stage,
    /// Delay from skymap to the posterior-sample upload.
    pub post_samples: Stage,
    /// Plotting follow-ups applied to the skymap.
    pub followups: SkymapFollowups,
    out_dir: PathBuf,
}

impl LalInference {
    /// Creates a LALInference chain writing payloads into `out_dir`.
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            prob: 1.0,
            start: Stage::certain(60.0, 10.0),
            skymap: Stage::certain(600.0, 60.0),
            post_samples: Stage::certain(120.0, 20.0),
            followups: SkymapFollowups::default(),
            out_dir: out_dir.into(),
        }
    }

    /// Builds the estimation chain.
    ///
    /// # Errors
    ///
    /// Returns [`gracesim_core::Error::Io`] if a payload cannot be
    /// written.
    pub fn gen_schedule<R: Rng + ?Sized>(
        &self,
        handle: &EventHandle,
        rng: &mut R,
    ) -> Result<Schedule> {
        let pe = [PE_TAG.to_string()];
        let mut sched = Schedule::new();
        if rng.gen::<f64>() >= self.prob {
            debug!("LALInference never ran");
            return Ok(sched);
        }

        let mut dt = self.start.draw(rng);
        sched.insert(log(handle, dt, "LALInference online estimation started", None, &pe));

        dt += self.skymap.draw(rng);
        let fits = "LALInference_skymap.fits.gz";
        let path = self.out_dir.join(fits);
        touch(&path)?;
        sched.insert(log(handle, dt, "LALInference", Some(path), &[SKY_LOC_TAG.to_string()]));
        sched.append(&mut self.followups.gen_schedule(handle, dt, fits, &self.out_dir, rng)?);

        dt += self.post_samples.draw(rng);
        let samples = self.out_dir.join("posterior_samples.dat");
        touch(&samples)?;
        sched.insert(log(
            handle,
            dt,
            "LALInference online estimation finished",
            Some(samples),
            &pe,
        ));
        Ok(sched)
    }
}

/// The LIB burst parameter-estimation chain.
#[derive(Debug, Clone)]
pub struct Lib {
    /// Probability the chain runs at all.
    pub prob: f64,
    /// Delay to the "started" announcement.
    pub start: Stage,
    /// Delay from start to the Bayes-factor summary.
    pub bayes_factor: Stage,
    /// Delay from the summary to the skymap upload.
    pub skymap: Stage,
    /// Delay from skymap to the posterior-sample upload.
    pub post_samples: Stage,
    /// Plotting follow-ups applied to the skymap.
    pub followups: SkymapFollowups,
    out_dir: PathBuf,
}

impl Lib {
    /// Creates a LIB chain writing payloads into `out_dir`.
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            prob: 1.0,
            start: Stage::certain(60.0, 10.0),
            bayes_factor: Stage::certain(120.0, 20.0),
            skymap: Stage::certain(300.0, 30.0),
            post_samples: Stage::certain(120.0, 20.0),
            followups: SkymapFollowups::default(),
            out_dir: out_dir.into(),
        }
    }

    /// Builds the estimation chain.
    ///
    /// # Errors
    ///
    /// Returns [`gracesim_core::Error::Io`] if a payload cannot be
    /// written.
    pub fn gen_schedule<R: Rng + ?Sized>(
        &self,
        handle: &EventHandle,
        rng: &mut R,
    ) -> Result<Schedule> {
        let pe = [PE_TAG.to_string()];
        let mut sched = Schedule::new();
        if rng.gen::<f64>() >= self.prob {
            debug!("LIB never ran");
            return Ok(sched);
        }

        let mut dt = self.start.draw(rng);
        sched.insert(log(handle, dt, "LIB Parameter estimation started.", None, &pe));

        dt += self.bayes_factor.draw(rng);
        sched.insert(log(handle, dt, "LIB PE summary", None, &pe));

        dt += self.skymap.draw(rng);
        let fits = "LIB_skymap.fits.gz";
        let path = self.out_dir.join(fits);
        touch(&path)?;
        sched.insert(log(handle, dt, "LIB", Some(path), &[SKY_LOC_TAG.to_string()]));
        sched.append(&mut self.followups.gen_schedule(handle, dt, fits, &self.out_dir, rng)?);

        dt += self.post_samples.draw(rng);
        let samples = self.out_dir.join("posterior_samples.dat");
        touch(&samples)?;
        sched.insert(log(handle, dt, "LIB Parameter estimation finished", Some(samples), &pe));
        Ok(sched)
    }
}

/// The BayesWave burst follow-up chain.
#[derive(Debug, Clone)]
pub struct BayesWave {
    /// Probability the chain runs at all.
    pub prob: f64,
    /// Delay to the "launched" announcement.
    pub start: Stage,
    /// Delay from launch to the follow-up results.
    pub post_samples: Stage,
    /// Delay from results to the parameter estimates.
    pub estimate: Stage,
    /// Delay from estimates to the Bayes factors.
    pub bayes_factor: Stage,
    /// Delay from Bayes factors to the skymap upload.
    pub skymap: Stage,
    /// Plotting follow-ups applied to the skymap.
    pub followups: SkymapFollowups,
    out_dir: PathBuf,
}

impl BayesWave {
    /// Creates a BayesWave chain writing payloads into `out_dir`.
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            prob: 1.0,
            start: Stage::certain(60.0, 10.0),
            post_samples: Stage::certain(300.0, 30.0),
            estimate: Stage::certain(60.0, 10.0),
            bayes_factor: Stage::certain(60.0, 10.0),
            skymap: Stage::certain(60.0, 10.0),
            followups: SkymapFollowups::default(),
            out_dir: out_dir.into(),
        }
    }

    /// Builds the follow-up chain. BayesWave has no completion
    /// message; the skymap upload is its last word.
    ///
    /// # Errors
    ///
    /// Returns [`gracesim_core::Error::Io`] if a payload cannot be
    /// written.
    pub fn gen_schedule<R: Rng + ?Sized>(
        &self,
        handle: &EventHandle,
        rng: &mut R,
    ) -> Result<Schedule> {
        let pe = [PE_TAG.to_string()];
        let mut sched = Schedule::new();
        if rng.gen::<f64>() >= self.prob {
            debug!("BayesWave never ran");
            return Ok(sched);
        }

        let mut dt = self.start.draw(rng);
        sched.insert(log(handle, dt, "BayesWaveBurst launched", None, &pe));

        dt += self.post_samples.draw(rng);
        sched.insert(log(handle, dt, "BWB Follow-up results", None, &pe));

        dt += self.estimate.draw(rng);
        sched.insert(log(handle, dt, "BWB parameter estimation", None, &pe));

        dt += self.bayes_factor.draw(rng);
        sched.insert(log(handle, dt, "BWB Bayes Factors", None, &pe));

        dt += self.skymap.draw(rng);
        let fits = "BW_skymap.fits";
        let path = self.out_dir.join(fits);
        touch(&path)?;
        sched.insert(log(handle, dt, "BWB", Some(path), &[SKY_LOC_TAG.to_string()]));
        sched.append(&mut self.followups.gen_schedule(handle, dt, fits, &self.out_dir, rng)?);
        Ok(sched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gracesim_sched::Op;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn entries(sched: &Schedule) -> Vec<(String, Option<String>)> {
        sched
            .iter()
            .map(|a| match a.op() {
                Op::WriteLog { message, filename, .. } => (
                    message.clone(),
                    filename.as_ref().and_then(|f| {
                        f.file_name().map(|n| n.to_string_lossy().into_owned())
                    }),
                ),
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn bayestar_chain_in_order() {
        let tmp = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let sched = Bayestar::new(tmp.path())
            .gen_schedule(&EventHandle::new(), &mut rng)
            .unwrap();

        let seen = entries(&sched);
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].0, "INFO:BAYESTAR:starting sky localization");
        assert_eq!(seen[1].1.as_deref(), Some("bayestar.fits.gz"));
        assert_eq!(seen[2].0, "INFO:BAYESTAR:sky localization complete");
    }

    #[test]
    fn skymap_followups_key_off_the_fits_name() {
        let tmp = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let mut lalinf = LalInference::new(tmp.path());
        lalinf.followups.plot = Some(Stage::certain(30.0, 5.0));
        lalinf.followups.viewer = Some(Stage::certain(30.0, 5.0));
        let sched = lalinf.gen_schedule(&EventHandle::new(), &mut rng).unwrap();

        let seen = entries(&sched);
        assert_eq!(seen.len(), 5);
        assert!(seen
            .iter()
            .any(|(m, f)| m == "Mollweide projection of LALInference_skymap.fits.gz"
                && f.as_deref() == Some("LALInference_skymap.png")));
        assert!(seen
            .iter()
            .any(|(m, f)| m.is_empty() && f.as_deref() == Some("LALInference_skymap.json")));
    }

    #[test]
    fn gated_off_engine_is_silent() {
        let tmp = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let mut bwb = BayesWave::new(tmp.path());
        bwb.prob = 0.0;
        let sched = bwb.gen_schedule(&EventHandle::new(), &mut rng).unwrap();
        assert!(sched.is_empty());
    }

    #[test]
    fn lib_chain_announces_summary_before_skymap() {
        let tmp = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let sched = Lib::new(tmp.path())
            .gen_schedule(&EventHandle::new(), &mut rng)
            .unwrap();

        let messages: Vec<String> = entries(&sched).into_iter().map(|(m, _)| m).collect();
        assert_eq!(
            messages,
            vec![
                "LIB Parameter estimation started.",
                "LIB PE summary",
                "LIB",
                "LIB Parameter estimation finished",
            ]
        );
    }
}
