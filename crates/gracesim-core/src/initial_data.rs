//! Best-effort parsing of pipeline initial-data payloads.
//!
//! Each pipeline uploads its own format when creating an event:
//!
//! - **CWB**: a multi-line `key: value` summary text file;
//! - **LIB**: a JSON object with `gpstime` and `FAR` fields;
//! - **CBC pipelines** (gstlal, gstlal-spiir, MBTAOnline, pycbc): a
//!   JSON coincidence stub with `gpstime` and `far` fields.
//!
//! Parsing is deliberately forgiving: the simulated creation must not
//! fail because a stub upload is empty or truncated, so unparseable
//! content yields an empty attribute set rather than an error. The
//! extracted attributes are free-form and land in the record's `extra`
//! map.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::id::Pipeline;

/// Attributes extracted from one initial-data file.
#[derive(Debug, Default)]
pub struct ParsedInitialData {
    /// GPS time of the candidate, when the payload carried one.
    pub gpstime: Option<f64>,
    /// False-alarm rate, when the payload carried one.
    pub far: Option<f64>,
    /// Everything else the payload carried, keyed by field name.
    pub extra: Map<String, Value>,
}

/// Parses `path` according to `pipeline`'s upload format.
#[must_use]
pub fn parse(pipeline: Pipeline, path: &Path) -> ParsedInitialData {
    let Ok(content) = fs::read_to_string(path) else {
        debug!(path = %path.display(), "initial data unreadable, recording no attributes");
        return ParsedInitialData::default();
    };
    match pipeline {
        Pipeline::Cwb => parse_cwb(&content),
        Pipeline::Lib => parse_json(&content, "gpstime", "FAR"),
        _ => parse_json(&content, "gpstime", "far"),
    }
}

/// Parses the CWB `key: value` summary-text format.
fn parse_cwb(content: &str) -> ParsedInitialData {
    let mut parsed = ParsedInitialData::default();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            continue;
        }
        // Repeated keys keep the first occurrence; the trigger file
        // lists per-detector repeats after the network summary.
        if parsed.extra.contains_key(key) {
            continue;
        }
        parsed.extra.insert(key.to_string(), Value::String(value.to_string()));
        if key == "time" {
            parsed.gpstime = value
                .split_whitespace()
                .next()
                .and_then(|v| v.parse().ok());
        }
        if key == "far" {
            parsed.far = value.parse().ok();
        }
    }
    parsed
}

/// Parses a JSON payload, pulling out the given gps/far field names.
fn parse_json(content: &str, gps_key: &str, far_key: &str) -> ParsedInitialData {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(content) else {
        return ParsedInitialData::default();
    };
    let as_f64 = |v: &Value| -> Option<f64> {
        v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    };
    let gpstime = map.get(gps_key).and_then(as_f64);
    let far = map.get(far_key).and_then(as_f64);
    ParsedInitialData {
        gpstime,
        far,
        extra: map,
    }
}
