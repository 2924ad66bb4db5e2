//! The fixed label vocabulary.
//!
//! Labels signal workflow state on an event (data-quality vetoes,
//! human sign-off outcomes, EM follow-up selection). The set is
//! closed and case-sensitive; anything else is rejected before any
//! store mutation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Interferometer codes that participate in per-site sign-off labels.
pub const INSTRUMENTS: &[&str] = &["H1", "L1"];

/// Workflow-state suffixes used by per-site sign-off labels.
const SIGNOFF_SUFFIXES: &[&str] = &["OPS", "OK", "NO"];

/// Labels that are not instrument-prefixed.
const BASE_LABELS: &[&str] = &[
    "INJ",
    "DQV",
    "EM_READY",
    "PE_READY",
    "EM_Throttled",
    "EM_Selected",
    "EM_Superseded",
    "ADVREQ",
    "ADVOK",
    "ADVNO",
];

/// A validated label from the fixed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(String);

impl Label {
    /// Parses a label, validating it against the allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLabel`] for names outside the
    /// vocabulary. Matching is case-sensitive.
    pub fn parse(name: &str) -> Result<Self> {
        if Self::is_known(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(Error::InvalidLabel(name.to_string()))
        }
    }

    /// Returns the label name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `name` is in the vocabulary.
    #[must_use]
    pub fn is_known(name: &str) -> bool {
        if BASE_LABELS.contains(&name) {
            return true;
        }
        INSTRUMENTS.iter().any(|ifo| {
            name.strip_prefix(ifo)
                .is_some_and(|rest| SIGNOFF_SUFFIXES.contains(&rest))
        })
    }

    /// Enumerates the full vocabulary.
    #[must_use]
    pub fn all() -> Vec<Self> {
        let mut labels: Vec<Self> = BASE_LABELS.iter().map(|s| Self((*s).to_string())).collect();
        for ifo in INSTRUMENTS {
            for suffix in SIGNOFF_SUFFIXES {
                labels.push(Self(format!("{ifo}{suffix}")));
            }
        }
        labels
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Label {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.0
    }
}
