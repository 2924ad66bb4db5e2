//! Event-creation uploads for each search pipeline.
//!
//! Each pipeline announces a candidate with its own payload format:
//! CWB uploads a multi-line summary text, LIB a JSON parameter dump,
//! and the CBC coincidence pipelines a coincidence stub followed by an
//! amplitude-spectral-density upload. The payloads are stubs with
//! fixed detector parameters; only the GPS time and false-alarm rate
//! vary per event, which is exactly what the store's initial-data
//! parsers extract.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

use gracesim_core::{Classification, Error, Pipeline, Result};
use gracesim_sched::{Action, EventHandle, Op, Schedule};

use crate::arrival::jittered;

/// Fixed CWB summary fields surrounding the per-event values.
const CWB_TRIGGER_BODY: &str = "nevent:     1
ndim:       2
run:        1
rho:        6.135850
netCC:      0.789861
netED:      0.013624
likelihood: 1.078950e+02
ifo:        L1 H1
duration:   0.040769 0.265625
frequency:  1778.375732 1776.344116
low:        1696.000000
high:       1840.000000
snr:        6.258973e+01 4.643370e+01
";

/// One pipeline's contribution to a single event: the creation upload
/// plus its follow-up annotations.
#[derive(Debug, Clone)]
pub struct PipelineEvent {
    classification: Classification,
    gps: f64,
    far: f64,
    instruments: Vec<String>,
    out_dir: PathBuf,
    followup_delay: f64,
    followup_jitter: f64,
}

impl PipelineEvent {
    /// Creates a pipeline event writer for one candidate.
    #[must_use]
    pub fn new(
        classification: Classification,
        gps: f64,
        far: f64,
        instruments: Vec<String>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            classification,
            gps,
            far,
            instruments,
            out_dir: out_dir.into(),
            followup_delay: 10.0,
            followup_jitter: 2.0,
        }
    }

    /// Overrides the follow-up upload timing.
    #[must_use]
    pub fn followup_timing(mut self, delay: f64, jitter: f64) -> Self {
        self.followup_delay = delay;
        self.followup_jitter = jitter;
        self
    }

    /// Returns the classification this event will be created with.
    #[must_use]
    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// Writes the pipeline's initial-data payload and returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the payload cannot be written.
    pub fn write_initial_data(&self) -> Result<PathBuf> {
        match self.classification.pipeline {
            Pipeline::Cwb => self.write_cwb_trigger(),
            Pipeline::Lib => self.write_lib_json(),
            _ => self.write_coinc_stub(),
        }
    }

    /// Builds the creation action and the pipeline's follow-ups.
    ///
    /// The creation runs at delay zero within this event's fragment;
    /// follow-up uploads land a jittered interval later.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a payload file cannot be written.
    pub fn gen_schedule<R: Rng + ?Sized>(
        &self,
        handle: &EventHandle,
        rng: &mut R,
    ) -> Result<Schedule> {
        let initial_file = self.write_initial_data()?;
        let mut sched = Schedule::new();
        sched.insert(Action::new(
            0.0,
            Op::CreateEvent {
                handle: handle.clone(),
                classification: self.classification,
                initial_file,
            },
        ));

        let dt = jittered(self.followup_delay, self.followup_jitter, rng);
        match self.classification.pipeline {
            Pipeline::Cwb => {
                sched.insert(Action::new(
                    dt,
                    Op::WriteLog {
                        handle: handle.clone(),
                        message: "cWB CED".to_string(),
                        filename: None,
                        tag_names: Vec::new(),
                    },
                ));
            }
            Pipeline::Lib => {}
            _ => {
                let psd = self.out_dir.join(format!("psd_{:.2}.json", self.gps));
                write_file(&psd, &self.psd_stub()?)?;
                sched.insert(Action::new(
                    dt,
                    Op::WriteLog {
                        handle: handle.clone(),
                        message: "amplitude spectral densities".to_string(),
                        filename: Some(psd),
                        tag_names: Vec::new(),
                    },
                ));
            }
        }
        Ok(sched)
    }

    fn write_cwb_trigger(&self) -> Result<PathBuf> {
        let path = self.out_dir.join(format!("trigger_{:.4}.txt", self.gps));
        let content = format!(
            "{CWB_TRIGGER_BODY}time:       {gps:.4} {gps:.4}\nfar:        {far:.9e}\n",
            gps = self.gps,
            far = self.far,
        );
        write_file(&path, &content)?;
        Ok(path)
    }

    fn write_lib_json(&self) -> Result<PathBuf> {
        let path = self.out_dir.join(format!("{:.2}-0.json", self.gps));
        let payload = serde_json::json!({
            "gpstime": format!("{:.2}", self.gps),
            "FAR": self.far,
            "instruments": self.instruments.join(","),
            "nevents": 1,
            "frequency": 32.000_034_917_039_528,
            "quality": 4.173_746_968_972_061,
            "hrss": 3.245_759_049_352_791e-19,
            "Omicron SNR": 91.166_239_947_9,
            "timeslides": self.zero_timeslides(),
        });
        write_file(&path, &serde_json::to_string(&payload)?)?;
        Ok(path)
    }

    fn write_coinc_stub(&self) -> Result<PathBuf> {
        let path = self.out_dir.join(format!("coinc_{:.2}.json", self.gps));
        let payload = serde_json::json!({
            "gpstime": self.gps,
            "far": self.far,
            "instruments": self.instruments.join(","),
            "mchirp": 1.218,
            "mass": 2.8,
            "snr": 12.3,
        });
        write_file(&path, &serde_json::to_string(&payload)?)?;
        Ok(path)
    }

    fn psd_stub(&self) -> Result<String> {
        let payload = serde_json::json!({
            "instruments": self.instruments.join(","),
            "deltaF": 0.25,
        });
        Ok(serde_json::to_string(&payload)?)
    }

    fn zero_timeslides(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .instruments
            .iter()
            .map(|ifo| (ifo.clone(), serde_json::Value::String("0.0".to_string())))
            .collect();
        serde_json::Value::Object(map)
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)
        .map_err(|e| Error::io(format!("writing payload {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gracesim_core::{initial_data, Group, Search};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn instruments() -> Vec<String> {
        vec!["H1".to_string(), "L1".to_string()]
    }

    #[test]
    fn cwb_trigger_round_trips_through_the_parser() {
        let tmp = TempDir::new().unwrap();
        let event = PipelineEvent::new(
            Classification::new(Group::Test, Pipeline::Cwb, Some(Search::AllSky)),
            1_137_250_000.1234,
            1e-8,
            instruments(),
            tmp.path(),
        );
        let path = event.write_initial_data().unwrap();
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("trigger_"));

        let parsed = initial_data::parse(Pipeline::Cwb, &path);
        assert_eq!(parsed.gpstime, Some(1_137_250_000.1234));
        assert_eq!(parsed.far, Some(1e-8));
    }

    #[test]
    fn lib_payload_round_trips_through_the_parser() {
        let tmp = TempDir::new().unwrap();
        let event = PipelineEvent::new(
            Classification::new(Group::Test, Pipeline::Lib, None),
            1_137_250_000.56,
            2.5e-9,
            instruments(),
            tmp.path(),
        );
        let path = event.write_initial_data().unwrap();
        let parsed = initial_data::parse(Pipeline::Lib, &path);
        assert_eq!(parsed.gpstime, Some(1_137_250_000.56));
        assert_eq!(parsed.far, Some(2.5e-9));
        assert_eq!(parsed.extra["instruments"], "H1,L1");
    }

    #[test]
    fn cbc_schedule_has_creation_then_psd_upload() {
        let tmp = TempDir::new().unwrap();
        let event = PipelineEvent::new(
            Classification::new(Group::Test, Pipeline::Gstlal, Some(Search::LowMass)),
            1_137_250_001.0,
            1e-9,
            instruments(),
            tmp.path(),
        );
        let mut rng = StdRng::seed_from_u64(11);
        let handle = EventHandle::new();
        let sched = event.gen_schedule(&handle, &mut rng).unwrap();

        let ops: Vec<_> = sched.iter().map(|a| a.op().kind()).collect();
        assert_eq!(ops, vec!["CreateEvent", "WriteLog"]);

        let Some(Op::WriteLog { message, filename, .. }) = sched.iter().nth(1).map(Action::op)
        else {
            panic!("expected a log upload");
        };
        assert_eq!(message, "amplitude spectral densities");
        assert!(filename.as_ref().unwrap().exists());
    }

    #[test]
    fn cwb_schedule_announces_the_ced() {
        let tmp = TempDir::new().unwrap();
        let event = PipelineEvent::new(
            Classification::new(Group::Burst, Pipeline::Cwb, None),
            1_137_250_002.0,
            1e-9,
            instruments(),
            tmp.path(),
        );
        let mut rng = StdRng::seed_from_u64(11);
        let sched = event.gen_schedule(&EventHandle::new(), &mut rng).unwrap();
        let Some(Op::WriteLog { message, .. }) = sched.iter().nth(1).map(Action::op) else {
            panic!("expected a log upload");
        };
        assert_eq!(message, "cWB CED");
    }
}
