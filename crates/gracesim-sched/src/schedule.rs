//! The time-ordered action plan.
//!
//! A [`Schedule`] keeps its actions sorted non-decreasing by relative
//! delay at all times, with ties preserving insertion order. Every
//! other component relies on that invariant: generators compose
//! fragments with `insert`/`concat`, the composer anchors the merged
//! plan to a wall-clock reference, and the driver replays it front to
//! back.
//!
//! The original engine had a single `bump` whose meaning depended on
//! whether the schedule was anchored yet. That ambiguity is split
//! here: [`Schedule::shift_delay`] moves pre-anchor relative delays,
//! [`Schedule::shift_deadline`] moves post-anchor absolute deadlines,
//! and callers must say which they mean.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use gracesim_core::Result;

use crate::action::Action;

/// An ordered multiset of actions; see the module docs.
#[derive(Debug, Default)]
pub struct Schedule {
    actions: VecDeque<Action>,
}

impl Schedule {
    /// Creates an empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if no actions are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Inserts one action, preserving the ordering invariant.
    pub fn insert(&mut self, action: Action) {
        self.insert_batch(vec![action]);
    }

    /// Merges a batch of actions into the schedule.
    ///
    /// The batch is stably sorted by delay, then merged with the
    /// existing sequence in one O(n+m) pass, like the merge step of a
    /// merge sort. Ties keep prior entries ahead of incoming ones, and
    /// incoming equal-delay actions keep their relative order.
    pub fn insert_batch(&mut self, mut batch: Vec<Action>) {
        batch.sort_by(|a, b| a.delay_secs().total_cmp(&b.delay_secs()));

        let mut merged = VecDeque::with_capacity(self.actions.len() + batch.len());
        let mut incoming = batch.into_iter().peekable();
        for existing in self.actions.drain(..) {
            while incoming
                .peek()
                .is_some_and(|a| a.delay_secs() < existing.delay_secs())
            {
                merged.push_back(incoming.next().expect("peeked"));
            }
            merged.push_back(existing);
        }
        // Whatever remains after the receiver is exhausted is already
        // in order.
        merged.extend(incoming);
        self.actions = merged;
    }

    /// Removes and returns the earliest action, if any.
    pub fn pop_front(&mut self) -> Option<Action> {
        self.actions.pop_front()
    }

    /// Drains both operands into a fresh merged schedule.
    ///
    /// Both inputs are left empty; the result contains every action
    /// from each, in sorted order. Works when either input is empty.
    #[must_use]
    pub fn concat(a: &mut Self, b: &mut Self) -> Self {
        let mut merged = Self::new();
        for schedule in [a, b] {
            merged.insert_batch(schedule.actions.drain(..).collect());
        }
        merged
    }

    /// Moves another schedule's actions into this one, leaving it
    /// empty.
    pub fn append(&mut self, other: &mut Self) {
        self.insert_batch(other.actions.drain(..).collect());
    }

    /// Adds `dt` seconds to every action's relative delay.
    ///
    /// Pre-anchor only: used to place a sub-schedule's relative times
    /// onto a later point of an outer schedule before anchoring.
    pub fn shift_delay(&mut self, dt: f64) {
        for action in &mut self.actions {
            action.shift_delay(dt);
        }
    }

    /// Adds `dt` seconds to every action's assigned deadline.
    ///
    /// # Errors
    ///
    /// Returns [`gracesim_core::Error::DeadlineUnset`] if any action is
    /// not anchored yet; the schedule is left unchanged in that case.
    pub fn shift_deadline(&mut self, dt: f64) -> Result<()> {
        if self.actions.iter().any(|a| a.deadline().is_none()) {
            return Err(gracesim_core::Error::DeadlineUnset);
        }
        for action in &mut self.actions {
            action.shift_deadline(dt)?;
        }
        Ok(())
    }

    /// Assigns every action's absolute deadline from one reference
    /// time: `deadline = reference + delay`.
    pub fn anchor(&mut self, reference: DateTime<Utc>) {
        for action in &mut self.actions {
            action.set_deadline(reference);
        }
    }

    /// Iterates the pending actions in order without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }
}

impl IntoIterator for Schedule {
    type Item = Action;
    type IntoIter = std::collections::vec_deque::IntoIter<Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

impl Extend<Action> for Schedule {
    fn extend<T: IntoIterator<Item = Action>>(&mut self, iter: T) {
        self.insert_batch(iter.into_iter().collect());
    }
}
