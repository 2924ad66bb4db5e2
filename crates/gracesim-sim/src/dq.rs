//! Data-quality follow-up chains.
//!
//! Two products annotate a candidate: the segment-database query
//! (start, one upload per flag, finish) and iDQ (a long per-instrument,
//! per-classifier chain of glitch statistics). Each step is
//! probability-gated; a failed gate models the real process dying
//! mid-run, so the chain stops there and later steps never appear.

use std::path::PathBuf;

use rand::Rng;
use serde::Deserialize;
use tracing::debug;

use gracesim_core::Result;
use gracesim_sched::{EventHandle, Op, Schedule};

use crate::arrival::log_uniform;
use crate::chain::{log, touch, Stage};

/// The analysis window around the event: `[gps-30, gps+30]`.
const WINDOW_HALF_WIDTH: f64 = 30.0;

/// The segment-database query chain.
#[derive(Debug, Clone)]
pub struct SegDb {
    /// Veto flags reported, in upload order.
    pub flags: Vec<String>,
    /// Gate and delay for the initial "began searching" message.
    pub start: Stage,
    /// Gate and delay applied per flag upload.
    pub per_flag: Stage,
    gps: f64,
    out_dir: PathBuf,
}

impl SegDb {
    /// Creates a segment-database chain for one candidate.
    #[must_use]
    pub fn new(flags: Vec<String>, gps: f64, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            flags,
            start: Stage::certain(10.0, 1.0),
            per_flag: Stage::certain(5.0, 1.0),
            gps,
            out_dir: out_dir.into(),
        }
    }

    /// Builds the segment query log chain.
    ///
    /// The finish message is emitted whenever the chain started, even
    /// if a flag upload failed its gate partway through.
    ///
    /// # Errors
    ///
    /// Returns [`gracesim_core::Error::Io`] if a flag payload cannot be written.
    pub fn gen_schedule<R: Rng + ?Sized>(
        &self,
        handle: &EventHandle,
        rng: &mut R,
    ) -> Result<Schedule> {
        let mut sched = Schedule::new();
        if !self.start.passes(rng) {
            debug!("segment query never started");
            return Ok(sched);
        }

        let mut dt = self.start.draw(rng);
        sched.insert(log(handle, dt, "began searching for segments in : fakeSegDB", None, &[]));

        let window_start = (self.gps - WINDOW_HALF_WIDTH) as i64;
        let dur = (2.0 * WINDOW_HALF_WIDTH) as i64;
        for flag in &self.flags {
            if !self.per_flag.passes(rng) {
                debug!(flag, "segment query died before this flag");
                break;
            }
            dt += self.per_flag.draw(rng);
            let filename = self.out_dir.join(format!(
                "{}-{window_start}-{dur}.xml",
                flag.replace(':', "_")
            ));
            touch(&filename)?;
            sched.insert(log(handle, dt, flag, Some(filename), &[]));
        }

        dt += self.per_flag.draw(rng);
        sched.insert(log(handle, dt, "finished searching for segments in : fakeSegDB", None, &[]));
        Ok(sched)
    }
}

/// Per-stage timing knobs for the iDQ chain.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdqStages {
    /// "Started searching" message.
    pub start: Stage,
    /// Glitch-table upload.
    pub tables: Stage,
    /// Minimum glitch-FAP report.
    pub fap: Stage,
    /// FAP and rank frame uploads.
    pub frames: Stage,
    /// Timeseries plot upload.
    pub timeseries: Stage,
    /// Active-channel list and strip chart (ovl classifiers only).
    pub active_chan: Stage,
    /// Calibration check and figure.
    pub calib: Stage,
    /// Local ROC curves and figure.
    pub roc: Stage,
    /// Calibration and training vital statistics.
    pub stats: Stage,
}

impl Default for IdqStages {
    fn default() -> Self {
        Self {
            start: Stage::certain(1.0, 0.5),
            tables: Stage::certain(10.0, 1.0),
            fap: Stage::certain(5.0, 1.0),
            frames: Stage::certain(5.0, 1.0),
            timeseries: Stage::certain(5.0, 1.0),
            active_chan: Stage::certain(10.0, 1.0),
            calib: Stage::certain(20.0, 5.0),
            roc: Stage::certain(20.0, 5.0),
            stats: Stage::certain(30.0, 5.0),
        }
    }
}

/// The iDQ glitch-identification chain.
#[derive(Debug, Clone)]
pub struct Idq {
    /// Instruments reporting, each with an independent chain.
    pub instruments: Vec<String>,
    /// Classifiers reported per instrument.
    pub classifiers: Vec<String>,
    /// Lower bound of the log-uniform glitch-FAP draw.
    pub min_fap: f64,
    /// Upper bound of the log-uniform glitch-FAP draw.
    pub max_fap: f64,
    /// Timing and gates per stage.
    pub stages: IdqStages,
    gps: f64,
    out_dir: PathBuf,
}

impl Idq {
    /// Creates an iDQ chain for one candidate.
    #[must_use]
    pub fn new(
        instruments: Vec<String>,
        classifiers: Vec<String>,
        gps: f64,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            instruments,
            classifiers,
            min_fap: 1e-5,
            max_fap: 1.0,
            stages: IdqStages::default(),
            gps,
            out_dir: out_dir.into(),
        }
    }

    /// Builds the iDQ upload chain for every instrument.
    ///
    /// Within one instrument, the per-classifier stages share a
    /// cumulative delay, and any failed gate abandons the rest of that
    /// instrument's chain; only an instrument whose every classifier
    /// completed emits the "Finished searching" message.
    ///
    /// # Errors
    ///
    /// Returns [`gracesim_core::Error::Io`] if an upload payload cannot be written.
    #[allow(clippy::too_many_lines)]
    pub fn gen_schedule<R: Rng + ?Sized>(
        &self,
        handle: &EventHandle,
        rng: &mut R,
    ) -> Result<Schedule> {
        let window_start = (self.gps - WINDOW_HALF_WIDTH) as i64;
        let window_end = (self.gps + WINDOW_HALF_WIDTH) as i64;
        let dur = window_end - window_start;
        let window = format!("[{window_start}, {window_end}]");
        let dq = ["data_quality".to_string()];

        let mut sched = Schedule::new();
        for ifo in &self.instruments {
            if !self.stages.start.passes(rng) {
                debug!(instrument = %ifo, "iDQ never started");
                continue;
            }
            let mut dt = self.stages.start.draw(rng);
            sched.insert(log(
                handle,
                dt,
                &format!("Started searching for iDQ information within {window} at {ifo}"),
                None,
                &[],
            ));

            let mut completed = true;
            'classifiers: for classifier in &self.classifiers {
                let file = |name: String| self.out_dir.join(name);

                if !self.stages.tables.passes(rng) {
                    completed = false;
                    break 'classifiers;
                }
                dt += self.stages.tables.draw(rng);
                let tables = file(format!("{ifo}_idq_{classifier}-{window_start}-{dur}.xml.gz"));
                touch(&tables)?;
                sched.insert(log(
                    handle,
                    dt,
                    &format!("iDQ glitch tables {ifo}:"),
                    Some(tables),
                    &dq,
                ));

                if !self.stages.fap.passes(rng) {
                    completed = false;
                    break 'classifiers;
                }
                dt += self.stages.fap.draw(rng);
                let fap = log_uniform(self.min_fap, self.max_fap, rng);
                let fap_file = file(format!("{ifo}_{classifier}-{window_start}-{dur}.json"));
                touch(&fap_file)?;
                sched.insert(log(
                    handle,
                    dt,
                    &format!(
                        "minimum glitch-FAP for {classifier} at {ifo} within {window} is {fap:.6}"
                    ),
                    Some(fap_file),
                    &dq,
                ));

                if !self.stages.frames.passes(rng) {
                    completed = false;
                    break 'classifiers;
                }
                dt += self.stages.frames.draw(rng);
                let fap_gwf = file(format!("{ifo}_idq_{classifier}_fap-{window_start}-{dur}.gwf"));
                let rank_gwf =
                    file(format!("{ifo}_idq_{classifier}_rank-{window_start}-{dur}.gwf"));
                touch(&fap_gwf)?;
                touch(&rank_gwf)?;
                sched.insert(log(
                    handle,
                    dt,
                    &format!("iDQ fap timeseries for {classifier} at {ifo} within {window} :"),
                    Some(fap_gwf),
                    &dq,
                ));
                sched.insert(log(
                    handle,
                    dt,
                    &format!("iDQ glitch-rank frame for {classifier} at {ifo} within {window} :"),
                    Some(rank_gwf),
                    &dq,
                ));

                if !self.stages.timeseries.passes(rng) {
                    completed = false;
                    break 'classifiers;
                }
                dt += self.stages.timeseries.draw(rng);
                let plot = file(format!("{ifo}_{classifier}_timeseries-{window_start}-{dur}.png"));
                touch(&plot)?;
                sched.insert(log(
                    handle,
                    dt,
                    &format!("iDQ fap and glitch-rank timeseries plot for {classifier} at {ifo}:"),
                    Some(plot),
                    &dq,
                ));

                // Only the ovl classifiers report channel attribution.
                if classifier.contains("ovl") {
                    if !self.stages.active_chan.passes(rng) {
                        completed = false;
                        break 'classifiers;
                    }
                    dt += self.stages.active_chan.draw(rng);
                    let chanlist =
                        file(format!("{ifo}_{classifier}_chanlist-{window_start}-{dur}.json"));
                    let chanstrip =
                        file(format!("{ifo}_{classifier}_chanstrip-{window_start}-{dur}.png"));
                    touch(&chanlist)?;
                    touch(&chanstrip)?;
                    sched.insert(log(
                        handle,
                        dt,
                        &format!("iDQ (possible) active channels for {classifier} at {ifo}"),
                        Some(chanlist),
                        &dq,
                    ));
                    sched.insert(log(
                        handle,
                        dt,
                        &format!("iDQ channel strip chart for {classifier} at {ifo}"),
                        Some(chanstrip),
                        &dq,
                    ));
                }

                if !self.stages.calib.passes(rng) {
                    completed = false;
                    break 'classifiers;
                }
                dt += self.stages.calib.draw(rng);
                let calib_json = file(format!("{ifo}_{classifier}_calib-{window_start}-{dur}.json"));
                let calib_png = file(format!("{ifo}_{classifier}_calib-{window_start}-{dur}.png"));
                touch(&calib_json)?;
                touch(&calib_png)?;
                sched.insert(log(
                    handle,
                    dt,
                    &format!("iDQ calibration sanity check for {classifier} at {ifo}"),
                    Some(calib_json),
                    &dq,
                ));
                sched.insert(log(
                    handle,
                    dt,
                    &format!("iDQ calibration sanity check figure for {classifier} at {ifo}"),
                    Some(calib_png),
                    &dq,
                ));

                if !self.stages.roc.passes(rng) {
                    completed = false;
                    break 'classifiers;
                }
                dt += self.stages.roc.draw(rng);
                let roc_json = file(format!("{ifo}_{classifier}_ROC-{window_start}-{dur}.json"));
                let roc_png = file(format!("{ifo}_{classifier}_ROC-{window_start}-{dur}.png"));
                touch(&roc_json)?;
                touch(&roc_png)?;
                sched.insert(log(
                    handle,
                    dt,
                    &format!("iDQ local ROC curves for {classifier} at {ifo}"),
                    Some(roc_json),
                    &dq,
                ));
                sched.insert(log(
                    handle,
                    dt,
                    &format!("iDQ local ROC figure for {classifier} at {ifo}"),
                    Some(roc_png),
                    &dq,
                ));

                if !self.stages.stats.passes(rng) {
                    completed = false;
                    break 'classifiers;
                }
                dt += self.stages.stats.draw(rng);
                let calib_stats =
                    file(format!("{ifo}_{classifier}_calibStats-{window_start}-{dur}.json"));
                let train_stats =
                    file(format!("{ifo}_{classifier}_trainStats-{window_start}-{dur}.json"));
                touch(&calib_stats)?;
                touch(&train_stats)?;
                sched.insert(log(
                    handle,
                    dt,
                    &format!("iDQ local calibration vital statistics for {classifier} at {ifo}"),
                    Some(calib_stats),
                    &dq,
                ));
                sched.insert(log(
                    handle,
                    dt,
                    &format!("iDQ local training vital statistics for {classifier} at {ifo}"),
                    Some(train_stats),
                    &dq,
                ));
            }

            if completed {
                sched.insert(log(
                    handle,
                    dt,
                    &format!("Finished searching for iDQ information within {window} at {ifo}"),
                    None,
                    &[],
                ));
            }
        }
        Ok(sched)
    }
}
