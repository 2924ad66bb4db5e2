//! Audit messages describing store mutations.
//!
//! Every mutating store call produces exactly one [`AlertMessage`] per
//! logical mutation, broadcast on a channel named after the event's
//! classification (`"<group>_<pipeline>[_<search>]"`). The serialized
//! shape mirrors the real service's alert payloads so listener tooling
//! can be tested against the fake store unchanged:
//!
//! ```json
//! {"uid": "T000014", "alert_type": "update", "description": "...",
//!  "file": "skymap.fits.gz", "object": {...}}
//! ```

use serde::{Deserialize, Serialize};

use crate::id::GraceId;
use crate::store::{EventRecord, LabelEntry, LogEntry};

/// The kind of mutation an audit message describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    /// A record was created.
    New,
    /// A log entry was appended (possibly with a file).
    Update,
    /// A label was applied.
    Label,
}

/// One structured audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMessage {
    /// The event the mutation applied to.
    pub uid: GraceId,
    /// Which kind of mutation happened.
    pub alert_type: AlertType,
    /// Human-readable summary of the mutation.
    pub description: String,
    /// Basename of an attached file, if the mutation carried one.
    pub file: Option<String>,
    /// Mutation-specific payload: the full top-level record for `new`,
    /// the log entry for `update`, the label metadata for `label`.
    pub object: serde_json::Value,
}

impl AlertMessage {
    /// Builds the message for a record creation.
    #[must_use]
    pub fn new_event(record: &EventRecord) -> Self {
        Self {
            uid: record.graceid,
            alert_type: AlertType::New,
            description: String::new(),
            file: None,
            object: serde_json::to_value(record).unwrap_or_default(),
        }
    }

    /// Builds the message for a log append.
    #[must_use]
    pub fn update(graceid: GraceId, entry: &LogEntry) -> Self {
        Self {
            uid: graceid,
            alert_type: AlertType::Update,
            description: entry.comment.clone(),
            file: entry.filename.clone(),
            object: serde_json::to_value(entry).unwrap_or_default(),
        }
    }

    /// Builds the message for a label application.
    #[must_use]
    pub fn label(graceid: GraceId, entry: &LabelEntry) -> Self {
        Self {
            uid: graceid,
            alert_type: AlertType::Label,
            description: entry.name.to_string(),
            file: None,
            object: serde_json::to_value(entry).unwrap_or_default(),
        }
    }
}
