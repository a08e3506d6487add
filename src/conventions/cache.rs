//! Memoization of per-type convention decisions.

use std::borrow::Borrow;
use std::hash::Hash;

use dashmap::DashMap;

/// Caches one boolean decision per key for the lifetime of the cache.
///
/// The first successful evaluation for a key wins. Later calls return the
/// stored value without invoking the predicate at all, even if a different
/// predicate is passed. Entries are never evicted.
///
/// Concurrent first calls for the same key may both evaluate the predicate,
/// but only one result is committed and every caller returns the committed
/// value. A predicate error is returned to the caller and nothing is cached.
pub struct ConventionCache<K: Eq + Hash> {
    entries: DashMap<K, bool>,
}

impl<K: Eq + Hash> Default for ConventionCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> ConventionCache<K> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Return the cached decision for `key`, evaluating `predicate` on a miss.
    pub fn apply_convention<Q, E, F>(&self, key: &Q, predicate: F) -> Result<bool, E>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(&Q) -> Result<bool, E>,
    {
        if let Some(hit) = self.entries.get(key) {
            return Ok(*hit);
        }

        // Evaluated outside any shard lock so a slow or re-entrant predicate
        // cannot block other keys.
        let result = predicate(key)?;

        let committed = *self.entries.entry(key.to_owned()).or_insert(result);
        Ok(committed)
    }

    /// Cached decision for `key`, if one has been committed.
    pub fn get<Q>(&self, key: &Q) -> Option<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
