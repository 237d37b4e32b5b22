//! Registry of live connection pairs.
//!
//! The registry exists so the forwarder can find every pair at shutdown.  It
//! holds [`Weak`] references only: a pair is owned by its two relay tasks and
//! decides its own lifetime.  Three parties mutate the map:
//!
//! - the accept loop, when a pair is created ([`PairRegistry::insert`]);
//! - a pair's first stopping relay task ([`PairRegistry::remove`]);
//! - the shutdown path ([`PairRegistry::snapshot`] then [`PairRegistry::clear`]).
//!
//! Every method holds the lock for the map operation only.  Callers never hold
//! it across I/O or an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use adb_forward_core::PairId;

use crate::infrastructure::connection_pair::ConnectionPair;

/// Lock-protected set of live [`ConnectionPair`]s, keyed by [`PairId`].
#[derive(Default)]
pub struct PairRegistry {
    pairs: Mutex<HashMap<PairId, Weak<ConnectionPair>>>,
}

impl PairRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly created pair.
    pub fn insert(&self, pair: &Arc<ConnectionPair>) {
        self.lock().insert(pair.id(), Arc::downgrade(pair));
    }

    /// Removes a pair.  Returns `true` if it was present.
    pub fn remove(&self, id: PairId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Returns the pairs that are still alive.
    ///
    /// Entries whose pair has already been dropped are skipped; they are
    /// removed by the next [`PairRegistry::clear`].
    pub fn snapshot(&self) -> Vec<Arc<ConnectionPair>> {
        self.lock().values().filter_map(Weak::upgrade).collect()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of registered pairs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no pair is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns `true` if `id` is registered.
    #[cfg(test)]
    pub(crate) fn contains(&self, id: PairId) -> bool {
        self.lock().contains_key(&id)
    }

    // Every operation is a single HashMap call, so a poisoned map is still
    // consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<PairId, Weak<ConnectionPair>>> {
        self.pairs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
