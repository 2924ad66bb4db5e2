//! Error types and result aliases shared across gracesim.
//!
//! Errors fall into three families that callers treat differently:
//!
//! - **Classification errors** reject caller input before any state
//!   mutation; the caller can fix the input and retry.
//! - **State errors** indicate a sequencing bug in how actions were
//!   composed (e.g. annotating an event before its creation ran).
//! - **Capability gaps** mirror features the real service does not
//!   support; they always fail, by design.

/// The result type used throughout gracesim.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gracesim operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The (group, pipeline, search) triple is not in the allow-list.
    #[error("invalid classification: {0}")]
    InvalidClassification(String),

    /// The label name is not in the fixed label vocabulary.
    #[error("invalid label: {0}")]
    InvalidLabel(String),

    /// A query token could not be interpreted.
    #[error("invalid query token: {0}")]
    InvalidQuery(String),

    /// A malformed event identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// An event-type configuration could not be interpreted.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The identifier does not resolve to an existing event record.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// The record's storage location already exists at creation time.
    #[error("event record already exists: {0}")]
    DuplicateIdentifier(String),

    /// The shared event handle was assigned twice without `force`.
    #[error("identifier has already been assigned for this event")]
    AlreadyAssigned,

    /// The shared event handle was read before creation completed.
    #[error("identifier has not been assigned for this event yet")]
    NotYetAssigned,

    /// An action was waited on before its deadline was set.
    #[error("action deadline has not been set")]
    DeadlineUnset,

    /// The real service does not implement this operation, so neither
    /// does the simulation.
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// No initial-data parser exists for this pipeline.
    #[error("unsupported pipeline: {0}")]
    UnsupportedPipeline(String),

    /// A filesystem operation failed.
    #[error("io error: {message}")]
    Io {
        /// Description of the failed operation.
        message: String,
        /// The underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Creates an io error with context about the failed operation.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Returns true if this error rejected caller input before any
    /// state mutation.
    #[must_use]
    pub const fn is_classification_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidClassification(_)
                | Self::InvalidLabel(_)
                | Self::InvalidQuery(_)
                | Self::InvalidId(_)
                | Self::InvalidConfig(_)
        )
    }

    /// Returns true if this error indicates an action-sequencing bug.
    #[must_use]
    pub const fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownEvent(_)
                | Self::DuplicateIdentifier(_)
                | Self::AlreadyAssigned
                | Self::NotYetAssigned
                | Self::DeadlineUnset
        )
    }

    /// Returns true if this error mirrors a real-service capability gap.
    #[must_use]
    pub const fn is_capability_gap(&self) -> bool {
        matches!(self, Self::NotSupported(_) | Self::UnsupportedPipeline(_))
    }
}

/// A short single-word classification of an error, used in run reports.
#[must_use]
pub fn error_family(err: &Error) -> &'static str {
    if err.is_classification_error() {
        "classification"
    } else if err.is_state_error() {
        "state"
    } else if err.is_capability_gap() {
        "capability"
    } else {
        "other"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_is_disjoint() {
        let cases = [
            Error::InvalidLabel("X".into()),
            Error::UnknownEvent("G000001".into()),
            Error::NotSupported("removeLabel"),
        ];
        for err in &cases {
            let flags = [
                err.is_classification_error(),
                err.is_state_error(),
                err.is_capability_gap(),
            ];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1, "{err}");
        }
    }

    #[test]
    fn family_names() {
        assert_eq!(error_family(&Error::InvalidQuery("?".into())), "classification");
        assert_eq!(error_family(&Error::AlreadyAssigned), "state");
        assert_eq!(error_family(&Error::NotSupported("x")), "capability");
    }
}
