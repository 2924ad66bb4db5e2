//! Event-type configuration and per-event schedule composition.
//!
//! One TOML file describes one event type: its classification plus
//! the follow-up processes that should react to it. A simulation run
//! loads several of these and picks one at random per event. Only the
//! `[general]` table is required; every follow-up table is opt-in, and
//! omitted timing fields fall back to the process defaults.
//!
//! ```toml
//! [general]
//! group = "Test"
//! pipeline = "gstlal"
//! search = "LowMass"
//!
//! [humans]
//! request = true
//! respond = true
//!
//! [bayestar]
//! start = { delay = 30.0, jitter = 5.0 }
//! ```

use std::fs;
use std::path::Path;

use rand::Rng;
use serde::Deserialize;
use tracing::info;

use gracesim_core::{Classification, Error, Group, Pipeline, Result, Search};
use gracesim_sched::{EventHandle, Schedule};

use crate::chain::Stage;
use crate::dq::{Idq, IdqStages, SegDb};
use crate::humans::{Signoff, SignoffRole};
use crate::misc::{ExternalTriggers, UnblindInjections};
use crate::pe::{BayesWave, Bayestar, LalInference, Lib, SkymapFollowups};
use crate::pipelines::PipelineEvent;

/// The classification an event type is created with.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Analysis group.
    pub group: Group,
    /// Submitting pipeline.
    pub pipeline: Pipeline,
    /// Optional search sub-classification.
    #[serde(default)]
    pub search: Option<Search>,
}

impl GeneralConfig {
    /// The classification triple this config describes.
    #[must_use]
    pub fn classification(&self) -> Classification {
        Classification::new(self.group, self.pipeline, self.search)
    }
}

fn default_respond_delay() -> f64 {
    60.0
}

fn default_respond_jitter() -> f64 {
    10.0
}

fn default_prob() -> f64 {
    1.0
}

/// Human signoff behavior for this event type.
#[derive(Debug, Clone, Deserialize)]
pub struct HumansConfig {
    /// Whether request labels are applied.
    pub request: bool,
    /// Whether decision labels are applied.
    pub respond: bool,
    /// Mean delay before each request label.
    #[serde(default)]
    pub request_delay: f64,
    /// Standard deviation of the request delay.
    #[serde(default)]
    pub request_jitter: f64,
    /// Mean site think time.
    #[serde(default = "default_respond_delay")]
    pub site_respond_delay: f64,
    /// Standard deviation of the site think time.
    #[serde(default = "default_respond_jitter")]
    pub site_respond_jitter: f64,
    /// Probability a site responds at all.
    #[serde(default = "default_prob")]
    pub site_respond_prob: f64,
    /// Probability a site decision is an approval.
    #[serde(default = "default_prob")]
    pub site_success_prob: f64,
    /// Mean advocate think time.
    #[serde(default = "default_respond_delay")]
    pub adv_respond_delay: f64,
    /// Standard deviation of the advocate think time.
    #[serde(default = "default_respond_jitter")]
    pub adv_respond_jitter: f64,
    /// Probability the advocate responds at all.
    #[serde(default = "default_prob")]
    pub adv_respond_prob: f64,
    /// Probability the advocate decision is an approval.
    #[serde(default = "default_prob")]
    pub adv_success_prob: f64,
}

impl HumansConfig {
    fn signoff(&self, role: SignoffRole) -> Signoff {
        let mut signoff = Signoff::new(role.clone());
        signoff.request_delay = self.request_delay;
        signoff.request_jitter = self.request_jitter;
        match role {
            SignoffRole::Site(_) => {
                signoff.respond_delay = self.site_respond_delay;
                signoff.respond_jitter = self.site_respond_jitter;
                signoff.respond_prob = self.site_respond_prob;
                signoff.success_prob = self.site_success_prob;
            }
            SignoffRole::Advocate => {
                signoff.respond_delay = self.adv_respond_delay;
                signoff.respond_jitter = self.adv_respond_jitter;
                signoff.respond_prob = self.adv_respond_prob;
                signoff.success_prob = self.adv_success_prob;
            }
        }
        signoff
    }
}

/// Segment-database query behavior for this event type.
#[derive(Debug, Clone, Deserialize)]
pub struct SegDbConfig {
    /// Veto flags reported, in upload order.
    pub flags: Vec<String>,
    /// Override for the start gate and delay.
    #[serde(default)]
    pub start: Option<Stage>,
    /// Override for the per-flag gate and delay.
    #[serde(default)]
    pub per_flag: Option<Stage>,
}

/// iDQ chain behavior for this event type.
#[derive(Debug, Clone, Deserialize)]
pub struct IdqConfig {
    /// Classifiers reported per instrument.
    pub classifiers: Vec<String>,
    /// Lower bound of the glitch-FAP draw.
    #[serde(default = "IdqConfig::default_min_fap")]
    pub min_fap: f64,
    /// Upper bound of the glitch-FAP draw.
    #[serde(default = "default_prob")]
    pub max_fap: f64,
    /// Per-stage timing overrides.
    #[serde(default)]
    pub stages: IdqStages,
}

impl IdqConfig {
    fn default_min_fap() -> f64 {
        1e-5
    }
}

/// Skymap plotting follow-ups shared by the pe engine configs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowupsConfig {
    /// Mollweide projection upload.
    #[serde(default)]
    pub plot_skymaps: Option<Stage>,
    /// Skyviewer JSON export.
    #[serde(default)]
    pub skyviewer: Option<Stage>,
}

impl FollowupsConfig {
    fn build(&self) -> SkymapFollowups {
        SkymapFollowups {
            plot: self.plot_skymaps,
            viewer: self.skyviewer,
        }
    }
}

/// BAYESTAR chain overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BayestarConfig {
    /// Probability the chain runs at all.
    pub prob: Option<f64>,
    /// Delay to the "starting" announcement.
    pub start: Option<Stage>,
    /// Delay from start to the skymap upload.
    pub skymap: Option<Stage>,
    /// Delay from skymap to completion.
    pub finish: Option<Stage>,
    /// Plotting follow-ups.
    #[serde(flatten)]
    pub followups: FollowupsConfig,
}

/// LALInference chain overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LalInferenceConfig {
    /// Probability the chain runs at all.
    pub prob: Option<f64>,
    /// Delay to the "started" announcement.
    pub start: Option<Stage>,
    /// Delay from start to the skymap upload.
    pub skymap: Option<Stage>,
    /// Delay from skymap to the posterior samples.
    pub post_samples: Option<Stage>,
    /// Plotting follow-ups.
    #[serde(flatten)]
    pub followups: FollowupsConfig,
}

/// LIB chain overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibConfig {
    /// Probability the chain runs at all.
    pub prob: Option<f64>,
    /// Delay to the "started" announcement.
    pub start: Option<Stage>,
    /// Delay from start to the Bayes-factor summary.
    pub bayes_factor: Option<Stage>,
    /// Delay from the summary to the skymap upload.
    pub skymap: Option<Stage>,
    /// Delay from skymap to the posterior samples.
    pub post_samples: Option<Stage>,
    /// Plotting follow-ups.
    #[serde(flatten)]
    pub followups: FollowupsConfig,
}

/// BayesWave chain overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BayesWaveConfig {
    /// Probability the chain runs at all.
    pub prob: Option<f64>,
    /// Delay to the "launched" announcement.
    pub start: Option<Stage>,
    /// Delay from launch to the follow-up results.
    pub post_samples: Option<Stage>,
    /// Delay from results to the parameter estimates.
    pub estimate: Option<Stage>,
    /// Delay from estimates to the Bayes factors.
    pub bayes_factor: Option<Stage>,
    /// Delay from Bayes factors to the skymap upload.
    pub skymap: Option<Stage>,
    /// Plotting follow-ups.
    #[serde(flatten)]
    pub followups: FollowupsConfig,
}

/// One event type: classification plus enabled follow-up processes.
#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    /// Classification of created events.
    pub general: GeneralConfig,
    /// Human signoff simulation.
    #[serde(default)]
    pub humans: Option<HumansConfig>,
    /// Segment-database query chain.
    #[serde(default)]
    pub segdb: Option<SegDbConfig>,
    /// iDQ glitch-identification chain.
    #[serde(default)]
    pub idq: Option<IdqConfig>,
    /// BAYESTAR localization chain.
    #[serde(default)]
    pub bayestar: Option<BayestarConfig>,
    /// LALInference estimation chain.
    #[serde(default)]
    pub lalinference: Option<LalInferenceConfig>,
    /// LIB estimation chain.
    #[serde(default)]
    pub lib: Option<LibConfig>,
    /// BayesWave follow-up chain.
    #[serde(default)]
    pub bayeswave: Option<BayesWaveConfig>,
    /// External coincidence search report.
    #[serde(default)]
    pub external_triggers: Option<Stage>,
    /// Unblind injection check report.
    #[serde(default)]
    pub unblind_injections: Option<Stage>,
}

impl EventConfig {
    /// Loads an event-type config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::InvalidConfig`] if it does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading config {}", path.display()), e))?;
        toml::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))
    }

    /// Parses an event-type config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the text does not parse.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

fn override_stage(stage: &mut Stage, with: Option<Stage>) {
    if let Some(s) = with {
        *stage = s;
    }
}

/// Composes the full schedule for one event.
///
/// Every enabled follow-up contributes a fragment; all fragments share
/// one [`EventHandle`], which the creation action assigns when it
/// runs. In safe mode only `group = "Test"` event types are allowed.
///
/// # Errors
///
/// Returns [`Error::NotSupported`] for a non-Test group in safe mode,
/// [`Error::InvalidLabel`] for a misconfigured signoff site, and
/// [`Error::Io`] if a payload file cannot be written.
#[allow(clippy::too_many_lines)]
pub fn gen_schedule<R: Rng + ?Sized>(
    gps: f64,
    far: f64,
    instruments: &[String],
    config: &EventConfig,
    safe: bool,
    out_dir: &Path,
    rng: &mut R,
) -> Result<(EventHandle, Schedule)> {
    let classification = config.general.classification();
    if safe && classification.group != Group::Test {
        return Err(Error::NotSupported("non-Test event creation in safe mode"));
    }
    info!(%classification, gps, "composing event schedule");

    let handle = EventHandle::new();
    let pipeline = PipelineEvent::new(
        classification,
        gps,
        far,
        instruments.to_vec(),
        out_dir,
    );
    let mut sched = pipeline.gen_schedule(&handle, rng)?;

    if let Some(humans) = &config.humans {
        if humans.request || humans.respond {
            for ifo in instruments {
                let site = humans.signoff(SignoffRole::Site(ifo.clone()));
                sched.append(&mut site.gen_schedule(&handle, humans.request, humans.respond, rng)?);
            }
            let adv = humans.signoff(SignoffRole::Advocate);
            sched.append(&mut adv.gen_schedule(&handle, humans.request, humans.respond, rng)?);
        }
    }

    if let Some(cfg) = &config.segdb {
        let mut segdb = SegDb::new(cfg.flags.clone(), gps, out_dir);
        override_stage(&mut segdb.start, cfg.start);
        override_stage(&mut segdb.per_flag, cfg.per_flag);
        sched.append(&mut segdb.gen_schedule(&handle, rng)?);
    }

    if let Some(cfg) = &config.idq {
        let mut idq = Idq::new(instruments.to_vec(), cfg.classifiers.clone(), gps, out_dir);
        idq.min_fap = cfg.min_fap;
        idq.max_fap = cfg.max_fap;
        idq.stages = cfg.stages.clone();
        sched.append(&mut idq.gen_schedule(&handle, rng)?);
    }

    if let Some(cfg) = &config.bayestar {
        let mut engine = Bayestar::new(out_dir);
        if let Some(prob) = cfg.prob {
            engine.prob = prob;
        }
        override_stage(&mut engine.start, cfg.start);
        override_stage(&mut engine.skymap, cfg.skymap);
        override_stage(&mut engine.finish, cfg.finish);
        engine.followups = cfg.followups.build();
        sched.append(&mut engine.gen_schedule(&handle, rng)?);
    }

    if let Some(cfg) = &config.lalinference {
        let mut engine = LalInference::new(out_dir);
        if let Some(prob) = cfg.prob {
            engine.prob = prob;
        }
        override_stage(&mut engine.start, cfg.start);
        override_stage(&mut engine.skymap, cfg.skymap);
        override_stage(&mut engine.post_samples, cfg.post_samples);
        engine.followups = cfg.followups.build();
        sched.append(&mut engine.gen_schedule(&handle, rng)?);
    }

    if let Some(cfg) = &config.lib {
        let mut engine = Lib::new(out_dir);
        if let Some(prob) = cfg.prob {
            engine.prob = prob;
        }
        override_stage(&mut engine.start, cfg.start);
        override_stage(&mut engine.bayes_factor, cfg.bayes_factor);
        override_stage(&mut engine.skymap, cfg.skymap);
        override_stage(&mut engine.post_samples, cfg.post_samples);
        engine.followups = cfg.followups.build();
        sched.append(&mut engine.gen_schedule(&handle, rng)?);
    }

    if let Some(cfg) = &config.bayeswave {
        let mut engine = BayesWave::new(out_dir);
        if let Some(prob) = cfg.prob {
            engine.prob = prob;
        }
        override_stage(&mut engine.start, cfg.start);
        override_stage(&mut engine.post_samples, cfg.post_samples);
        override_stage(&mut engine.estimate, cfg.estimate);
        override_stage(&mut engine.bayes_factor, cfg.bayes_factor);
        override_stage(&mut engine.skymap, cfg.skymap);
        engine.followups = cfg.followups.build();
        sched.append(&mut engine.gen_schedule(&handle, rng)?);
    }

    if let Some(report) = config.external_triggers {
        let mut ext = ExternalTriggers::new();
        ext.report = report;
        sched.append(&mut ext.gen_schedule(&handle, rng));
    }

    if let Some(report) = config.unblind_injections {
        let mut unblind = UnblindInjections::new();
        unblind.report = report;
        sched.append(&mut unblind.gen_schedule(&handle, rng));
    }

    Ok((handle, sched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gracesim_sched::Op;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
[general]
group = "Test"
pipeline = "gstlal"
search = "LowMass"
"#;

    fn instruments() -> Vec<String> {
        vec!["H1".to_string(), "L1".to_string()]
    }

    #[test]
    fn minimal_config_creates_only_the_pipeline_fragment() {
        let config = EventConfig::parse(MINIMAL).unwrap();
        let tmp = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let (_, sched) =
            gen_schedule(1_137_250_000.0, 1e-9, &instruments(), &config, true, tmp.path(), &mut rng)
                .unwrap();

        let kinds: Vec<_> = sched.iter().map(|a| a.op().kind()).collect();
        assert_eq!(kinds, vec!["CreateEvent", "WriteLog"]);
    }

    #[test]
    fn safe_mode_rejects_non_test_groups() {
        let config = EventConfig::parse(
            "[general]\ngroup = \"Burst\"\npipeline = \"CWB\"\nsearch = \"AllSky\"\n",
        )
        .unwrap();
        let tmp = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let err = gen_schedule(0.0, 1e-9, &instruments(), &config, true, tmp.path(), &mut rng)
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));

        // Unsafe mode allows the same config through.
        assert!(
            gen_schedule(0.0, 1e-9, &instruments(), &config, false, tmp.path(), &mut rng).is_ok()
        );
    }

    #[test]
    fn humans_add_one_signoff_per_site_plus_advocate() {
        let content = format!("{MINIMAL}\n[humans]\nrequest = true\nrespond = true\n");
        let config = EventConfig::parse(&content).unwrap();
        let tmp = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let (_, sched) =
            gen_schedule(1_137_250_000.0, 1e-9, &instruments(), &config, true, tmp.path(), &mut rng)
                .unwrap();

        let labels: Vec<String> = sched
            .iter()
            .filter_map(|a| match a.op() {
                Op::WriteLabel { label, .. } => Some(label.as_str().to_string()),
                _ => None,
            })
            .collect();
        // Request + decision per site and for the advocate.
        assert_eq!(labels.len(), 6);
        for expected in ["H1OPS", "L1OPS", "ADVREQ"] {
            assert!(labels.iter().any(|l| l == expected), "{labels:?}");
        }
    }

    #[test]
    fn all_fragments_share_one_handle() {
        let content = format!(
            "{MINIMAL}\n[humans]\nrequest = true\nrespond = true\n\n[segdb]\nflags = [\"H1:X:1\"]\n\n[bayestar]\n\n[external_triggers]\ndelay = 60.0\n"
        );
        let config = EventConfig::parse(&content).unwrap();
        let tmp = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let (handle, sched) =
            gen_schedule(1_137_250_000.0, 1e-9, &instruments(), &config, true, tmp.path(), &mut rng)
                .unwrap();

        // Creation is present exactly once and nothing has run yet.
        let creates = sched.iter().filter(|a| a.op().kind() == "CreateEvent").count();
        assert_eq!(creates, 1);
        assert!(handle.get_or_none().is_none());

        // Every fragment's actions observe the same identifier cell.
        let id = "T000042".parse().unwrap();
        handle.set(id).unwrap();
        for action in sched.iter() {
            assert_eq!(action.op().handle().get().unwrap(), id);
        }
    }

    #[test]
    fn stage_tables_override_defaults() {
        let content = format!(
            "{MINIMAL}\n[bayestar]\nprob = 1.0\nstart = {{ delay = 1.0, jitter = 0.0 }}\nskymap = {{ delay = 1.0, jitter = 0.0 }}\nfinish = {{ delay = 1.0, jitter = 0.0 }}\n"
        );
        let config = EventConfig::parse(&content).unwrap();
        let tmp = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let (_, sched) =
            gen_schedule(1_137_250_000.0, 1e-9, &instruments(), &config, true, tmp.path(), &mut rng)
                .unwrap();

        // With zero jitter the BAYESTAR chain lands at exactly 1, 2, 3
        // seconds.
        let bayestar_delays: Vec<f64> = sched
            .iter()
            .filter(|a| matches!(a.op(), Op::WriteLog { message, .. } if message.contains("BAYESTAR")))
            .map(gracesim_sched::Action::delay_secs)
            .collect();
        assert_eq!(bayestar_delays, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn malformed_config_is_rejected() {
        assert!(matches!(
            EventConfig::parse("not toml at all ["),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            EventConfig::parse("[general]\ngroup = \"NotAGroup\"\npipeline = \"gstlal\"\n"),
            Err(Error::InvalidConfig(_))
        ));
    }
}
