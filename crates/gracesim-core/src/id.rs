//! Event identifiers and the classification allow-list.
//!
//! A [`GraceId`] is the externally visible handle for one event record:
//! one uppercase prefix letter selected by the event's group, followed
//! by a fixed-width 6-digit zero-padded suffix (`G000014`). Suffixes
//! are allocated monotonically per prefix letter by the store.
//!
//! A [`Classification`] is the (group, pipeline, search) triple that
//! describes which analysis produced a candidate. Only combinations in
//! the static allow-list may create events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Width of the numeric suffix in a serialized identifier.
pub const ID_SUFFIX_WIDTH: usize = 6;

/// The analysis group that produced a candidate event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Group {
    /// Test uploads; the only group allowed in safe mode.
    Test,
    /// Compact binary coalescence searches.
    #[serde(rename = "CBC")]
    Cbc,
    /// Unmodelled burst searches.
    Burst,
}

impl Group {
    /// Returns the identifier prefix letter for this group.
    ///
    /// CBC and Burst share `G`; `M` is reserved for MDC records in the
    /// real service's letter table.
    #[must_use]
    pub const fn prefix(&self) -> char {
        match self {
            Self::Cbc | Self::Burst => 'G',
            Self::Test => 'T',
        }
    }

    /// Returns the canonical string spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "Test",
            Self::Cbc => "CBC",
            Self::Burst => "Burst",
        }
    }

    /// All groups, in allow-list order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Test, Self::Cbc, Self::Burst]
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The search pipeline that submitted a candidate event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pipeline {
    /// gstlal low-latency CBC pipeline.
    #[serde(rename = "gstlal")]
    Gstlal,
    /// gstlal-spiir CBC pipeline.
    #[serde(rename = "gstlal-spiir")]
    GstlalSpiir,
    /// MBTA online CBC pipeline.
    #[serde(rename = "MBTAOnline")]
    MbtaOnline,
    /// PyCBC Live pipeline.
    #[serde(rename = "pycbc")]
    Pycbc,
    /// Coherent WaveBurst pipeline.
    #[serde(rename = "CWB")]
    Cwb,
    /// oLIB burst pipeline.
    #[serde(rename = "LIB")]
    Lib,
}

impl Pipeline {
    /// Returns the canonical string spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gstlal => "gstlal",
            Self::GstlalSpiir => "gstlal-spiir",
            Self::MbtaOnline => "MBTAOnline",
            Self::Pycbc => "pycbc",
            Self::Cwb => "CWB",
            Self::Lib => "LIB",
        }
    }

    /// Returns true for pipelines that upload the shared CBC
    /// coincidence-table initial-data format.
    #[must_use]
    pub const fn is_cbc_format(&self) -> bool {
        matches!(
            self,
            Self::Gstlal | Self::GstlalSpiir | Self::MbtaOnline | Self::Pycbc
        )
    }

    /// All pipelines, in allow-list order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::MbtaOnline,
            Self::Gstlal,
            Self::GstlalSpiir,
            Self::Pycbc,
            Self::Cwb,
            Self::Lib,
        ]
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pipeline {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gstlal" => Ok(Self::Gstlal),
            "gstlal-spiir" => Ok(Self::GstlalSpiir),
            "MBTAOnline" => Ok(Self::MbtaOnline),
            "pycbc" => Ok(Self::Pycbc),
            "CWB" => Ok(Self::Cwb),
            "LIB" => Ok(Self::Lib),
            other => Err(Error::UnsupportedPipeline(other.to_string())),
        }
    }
}

/// The optional search sub-classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Search {
    /// All-sky search.
    AllSky,
    /// Low-mass CBC search.
    LowMass,
    /// High-mass CBC search.
    HighMass,
    /// Mock data challenge.
    #[serde(rename = "MDC")]
    Mdc,
}

impl Search {
    /// Returns the canonical string spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AllSky => "AllSky",
            Self::LowMass => "LowMass",
            Self::HighMass => "HighMass",
            Self::Mdc => "MDC",
        }
    }
}

impl fmt::Display for Search {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The (group, pipeline, search) triple describing one candidate event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    /// Analysis group.
    pub group: Group,
    /// Submitting pipeline.
    pub pipeline: Pipeline,
    /// Optional search sub-classification.
    pub search: Option<Search>,
}

/// Searches allowed for the CBC coincidence pipelines other than pycbc.
const CBC_SEARCHES: &[Option<Search>] = &[
    None,
    Some(Search::LowMass),
    Some(Search::HighMass),
    Some(Search::Mdc),
];

/// Searches allowed for pycbc (additionally AllSky).
const PYCBC_SEARCHES: &[Option<Search>] = &[
    None,
    Some(Search::AllSky),
    Some(Search::LowMass),
    Some(Search::HighMass),
    Some(Search::Mdc),
];

/// Searches allowed for the burst pipelines.
const BURST_SEARCHES: &[Option<Search>] = &[None, Some(Search::AllSky)];

impl Classification {
    /// Creates a classification triple.
    #[must_use]
    pub const fn new(group: Group, pipeline: Pipeline, search: Option<Search>) -> Self {
        Self {
            group,
            pipeline,
            search,
        }
    }

    /// Returns the searches the allow-list admits for a
    /// (group, pipeline) pair, or `None` if the pair itself is not
    /// allowed.
    #[must_use]
    pub fn allowed_searches(group: Group, pipeline: Pipeline) -> Option<&'static [Option<Search>]> {
        match (group, pipeline) {
            // Test admits every pipeline.
            (Group::Test | Group::Cbc, Pipeline::Pycbc) => Some(PYCBC_SEARCHES),
            (Group::Test | Group::Cbc, _) if pipeline.is_cbc_format() => Some(CBC_SEARCHES),
            (Group::Test | Group::Burst, Pipeline::Cwb | Pipeline::Lib) => Some(BURST_SEARCHES),
            _ => None,
        }
    }

    /// Validates this triple against the static allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClassification`] if the combination is
    /// not admitted.
    pub fn validate(&self) -> Result<()> {
        let allowed = Self::allowed_searches(self.group, self.pipeline)
            .is_some_and(|searches| searches.contains(&self.search));
        if allowed {
            Ok(())
        } else {
            Err(Error::InvalidClassification(self.to_string()))
        }
    }

    /// Returns the audit channel name for events with this
    /// classification: `"<group>_<pipeline>[_<search>]"`.
    #[must_use]
    pub fn channel(&self) -> String {
        match self.search {
            Some(search) => format!("{}_{}_{}", self.group, self.pipeline, search),
            None => format!("{}_{}", self.group, self.pipeline),
        }
    }

    /// Enumerates every allowed classification triple.
    #[must_use]
    pub fn all_allowed() -> Vec<Self> {
        let mut combos = Vec::new();
        for &group in Group::all() {
            for &pipeline in Pipeline::all() {
                if let Some(searches) = Self::allowed_searches(group, pipeline) {
                    for &search in searches {
                        combos.push(Self::new(group, pipeline, search));
                    }
                }
            }
        }
        combos
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.pipeline)?;
        if let Some(search) = self.search {
            write!(f, "/{search}")?;
        }
        Ok(())
    }
}

/// A unique identifier for one event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraceId {
    prefix: char,
    suffix: u32,
}

impl GraceId {
    /// Creates an identifier from a prefix letter and numeric suffix.
    #[must_use]
    pub const fn new(prefix: char, suffix: u32) -> Self {
        Self { prefix, suffix }
    }

    /// Creates the identifier for a group's `n`-th event.
    #[must_use]
    pub const fn for_group(group: Group, suffix: u32) -> Self {
        Self::new(group.prefix(), suffix)
    }

    /// Returns the prefix letter.
    #[must_use]
    pub const fn prefix(&self) -> char {
        self.prefix
    }

    /// Returns the numeric suffix.
    #[must_use]
    pub const fn suffix(&self) -> u32 {
        self.suffix
    }
}

impl fmt::Display for GraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:0width$}", self.prefix, self.suffix, width = ID_SUFFIX_WIDTH)
    }
}

impl FromStr for GraceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let prefix = chars
            .next()
            .filter(|c| c.is_ascii_uppercase())
            .ok_or_else(|| Error::InvalidId(format!("missing prefix letter in '{s}'")))?;
        let digits = chars.as_str();
        if digits.len() != ID_SUFFIX_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidId(format!(
                "suffix of '{s}' is not {ID_SUFFIX_WIDTH} digits"
            )));
        }
        let suffix = digits
            .parse::<u32>()
            .map_err(|e| Error::InvalidId(format!("bad suffix in '{s}': {e}")))?;
        Ok(Self { prefix, suffix })
    }
}

impl Serialize for GraceId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GraceId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
