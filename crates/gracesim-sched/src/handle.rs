//! The shared event-identifier handle.
//!
//! Actions for one logical event are constructed before the event
//! exists, so none of them can know its identifier up front. They all
//! hold clones of one [`EventHandle`]; the creating action assigns the
//! identifier exactly once when it runs, and every later action reads
//! it through the same handle. The handle is passed explicitly through
//! every constructor that needs it — there is no ambient registry.

use std::sync::{Arc, RwLock};

use gracesim_core::{Error, GraceId, Result};

/// A shared one-shot cell holding an event's identifier.
///
/// Cloning is shallow: all clones observe the same assignment. Reads
/// during the unset→set transition are safe; `set` is serialized.
#[derive(Debug, Clone, Default)]
pub struct EventHandle {
    inner: Arc<RwLock<Option<GraceId>>>,
}

impl EventHandle {
    /// Creates an unassigned handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotYetAssigned`] if creation has not run yet.
    pub fn get(&self) -> Result<GraceId> {
        self.inner
            .read()
            .expect("handle lock poisoned")
            .ok_or(Error::NotYetAssigned)
    }

    /// Returns the identifier if assigned, tolerating the unset state.
    ///
    /// For diagnostic printing before creation completes.
    #[must_use]
    pub fn get_or_none(&self) -> Option<GraceId> {
        *self.inner.read().expect("handle lock poisoned")
    }

    /// Assigns the identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyAssigned`] if an identifier is already
    /// present.
    pub fn set(&self, id: GraceId) -> Result<()> {
        let mut slot = self.inner.write().expect("handle lock poisoned");
        if slot.is_some() {
            return Err(Error::AlreadyAssigned);
        }
        *slot = Some(id);
        Ok(())
    }

    /// Assigns the identifier, overwriting any existing value.
    pub fn set_forced(&self, id: GraceId) {
        *self.inner.write().expect("handle lock poisoned") = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_before_set_fails() {
        let handle = EventHandle::new();
        assert!(matches!(handle.get(), Err(Error::NotYetAssigned)));
        assert!(handle.get_or_none().is_none());
    }

    #[test]
    fn set_is_one_shot() {
        let handle = EventHandle::new();
        let id: GraceId = "T000001".parse().unwrap();
        handle.set(id).unwrap();
        assert_eq!(handle.get().unwrap(), id);

        let other: GraceId = "T000002".parse().unwrap();
        assert!(matches!(handle.set(other), Err(Error::AlreadyAssigned)));
        assert_eq!(handle.get().unwrap(), id);

        handle.set_forced(other);
        assert_eq!(handle.get().unwrap(), other);
    }

    #[test]
    fn clones_share_the_assignment() {
        let handle = EventHandle::new();
        let other = handle.clone();
        handle.set("G000003".parse().unwrap()).unwrap();
        assert_eq!(other.get().unwrap().to_string(), "G000003");
    }
}
