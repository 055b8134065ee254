//! Dirty-tracking staging wrapper
//!
//! [`Editable`] holds the last committed value and an independent working
//! copy. Whether the copy diverged is recomputed by structural equality on
//! every call, so there is no flag that can go stale. The wrapper knows
//! nothing about persistence: after a save the caller builds a new
//! `Editable` from the authoritative value instead of re-baselining.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Editable<T> {
    original: T,
    state: T,
}

impl<T: Clone + PartialEq> Editable<T> {
    pub fn new(original: T) -> Self {
        let state = original.clone();
        Self { original, state }
    }

    /// Last committed value
    pub fn original(&self) -> &T {
        &self.original
    }

    /// Current working copy
    pub fn value(&self) -> &T {
        &self.state
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.state
    }

    pub fn is_edited(&self) -> bool {
        self.original != self.state
    }

    /// Discard the working copy and start over from the original
    pub fn reset(&mut self) {
        self.state = self.original.clone();
    }

    /// Apply `edit` to a scratch copy and keep the result only if it
    /// succeeds, so a rejected edit leaves the working copy untouched.
    pub fn try_edit<E, F>(&mut self, edit: F) -> std::result::Result<(), E>
    where
        F: FnOnce(&mut T) -> std::result::Result<(), E>,
    {
        let mut scratch = self.state.clone();
        edit(&mut scratch)?;
        self.state = scratch;
        Ok(())
    }

    pub fn into_value(self) -> T {
        self.state
    }
}
