//! Weak observations of issued resources.
//!
//! The manager never owns the tensors, sequences and algorithms it hands out. It keeps a side table
//! of weak references, keyed by an opaque id, so it can enumerate whatever is still alive at
//! teardown and drop entries whose resource is gone.

use std::rc::{Rc, Weak};

#[derive(Debug)]
pub(crate) struct Observations<T> {
    next_id: u64,
    entries: Vec<(u64, Weak<T>)>,
}

impl<T> Default for Observations<T> {
    fn default() -> Self {
        Self { next_id: 0, entries: Vec::new() }
    }
}

impl<T> Observations<T> {
    /// Observe a freshly issued resource. Returns its id.
    pub fn track(&mut self, resource: &Rc<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, Rc::downgrade(resource)));
        id
    }

    /// Drop entries whose resource has no strong owner left. Returns how many were dropped.
    pub fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(_, resource)| resource.strong_count() > 0);
        before - self.entries.len()
    }

    /// Forget every entry, handing back the resources that are still alive.
    pub fn drain_live(&mut self) -> Vec<Rc<T>> {
        self.entries.drain(..).filter_map(|(_, resource)| resource.upgrade()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }
}
