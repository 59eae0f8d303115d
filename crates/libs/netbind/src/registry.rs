//! Name-keyed table of live interface handles.
//!
//! The registry pins handle lifetimes for callers that cannot hold the handle
//! themselves. It is an explicitly constructed value — build one at process
//! start and pass it where it is needed; tests construct isolated instances.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::NetifError;
use crate::netif::NetifHandle;

#[derive(Default)]
pub struct NetifRegistry {
    // Insertion order is kept so `find_default` scans deterministically.
    entries: Mutex<Vec<(String, Arc<NetifHandle>)>>,
}

impl NetifRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_entries(&self) -> MutexGuard<'_, Vec<(String, Arc<NetifHandle>)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a handle under its name. Fails on a duplicate name, and on a
    /// handle that has already been shut down.
    pub fn plug_in(&self, handle: Arc<NetifHandle>) -> Result<(), NetifError> {
        if handle.is_shutdown() {
            return Err(NetifError::invalid_argument(
                "cannot register an interface that has been shut down",
            ));
        }

        let mut entries = self.lock_entries();
        if entries.iter().any(|(name, _)| name == handle.name()) {
            return Err(NetifError::DuplicateName { name: handle.name().to_string() });
        }

        entries.push((handle.name().to_string(), handle));
        Ok(())
    }

    /// Removes the entry under `name`. Returns whether one existed.
    pub fn remove(&self, name: &str) -> bool {
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|(entry_name, _)| entry_name != name);
        entries.len() != before
    }

    pub fn find(&self, name: &str) -> Option<Arc<NetifHandle>> {
        self.lock_entries()
            .iter()
            .find(|(entry_name, _)| entry_name == name)
            .map(|(_, handle)| Arc::clone(handle))
    }

    /// The first registered handle that is the stack's default interface.
    pub fn find_default(&self) -> Option<Arc<NetifHandle>> {
        self.lock_entries()
            .iter()
            .find(|(_, handle)| handle.is_default())
            .map(|(_, handle)| Arc::clone(handle))
    }

    pub fn names(&self) -> Vec<String> {
        self.lock_entries().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn handles(&self) -> Vec<Arc<NetifHandle>> {
        self.lock_entries().iter().map(|(_, handle)| Arc::clone(handle)).collect()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }
}
