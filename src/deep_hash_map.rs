//! DeepHashMap: public map keyed by structurally compared `Key`s.

use core::fmt;
use core::hash::BuildHasher;

use log::debug;

use crate::bucket_map::{self, BucketMap};
use crate::digest::{ContentHasher, DigestState};
use crate::error::Result;
use crate::key::Key;

/// A hash map whose keys are compared by content.
///
/// Every keyed operation digests the key first, selects the bucket for that
/// digest and confirms the match with structural equality. Keys that cannot
/// be digested (see [`KeyError`](crate::KeyError)) are rejected before the
/// map is touched.
///
/// Iteration yields entries in the order their keys were first inserted.
/// Updating an existing key keeps its place; deleting a key and inserting it
/// again moves it to the end.
///
/// ```
/// use deep_hashmap::{DeepHashMap, Key};
///
/// let mut m = DeepHashMap::new();
/// m.set(Key::object([("a", 1)]), "first")?;
/// assert_eq!(m.get(&Key::object([("a", 1)]))?, Some(&"first"));
/// assert!(!m.has(&Key::object([("a", 2)]))?);
/// # Ok::<(), deep_hashmap::KeyError>(())
/// ```
#[derive(Clone)]
pub struct DeepHashMap<V, S = DigestState> {
    hasher: ContentHasher<S>,
    entries: BucketMap<V>,
}

impl<V> DeepHashMap<V> {
    pub fn new() -> Self {
        Self::with_hasher(DigestState)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DigestState)
    }
}

impl<V> Default for DeepHashMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, S> DeepHashMap<V, S>
where
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher: ContentHasher::with_state(hasher),
            entries: BucketMap::with_capacity(capacity),
        }
    }

    /// Limit how deeply keys may nest. Applies to every later operation.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.hasher.set_max_depth(max_depth);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.hasher.max_depth()
    }

    pub fn hasher(&self) -> &S {
        self.hasher.state()
    }

    /// Number of live entries.
    pub fn size(&self) -> usize {
        self.entries.len()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or update, returning the previous value for an equal key.
    pub fn insert(&mut self, key: Key, value: V) -> Result<Option<V>> {
        let digest = self.hasher.digest(&key)?;
        Ok(self.entries.insert(digest, key, value))
    }

    /// Insert or update, returning the map so calls can be chained.
    pub fn set(&mut self, key: Key, value: V) -> Result<&mut Self> {
        self.insert(key, value)?;
        Ok(self)
    }

    /// `Ok(None)` when no equal key is present.
    pub fn get(&self, key: &Key) -> Result<Option<&V>> {
        let digest = self.hasher.digest(key)?;
        Ok(self.entries.get(digest, key))
    }

    pub fn get_mut(&mut self, key: &Key) -> Result<Option<&mut V>> {
        let digest = self.hasher.digest(key)?;
        Ok(self.entries.get_mut(digest, key))
    }

    pub fn has(&self, key: &Key) -> Result<bool> {
        let digest = self.hasher.digest(key)?;
        Ok(self.entries.contains(digest, key))
    }

    pub fn contains_key(&self, key: &Key) -> Result<bool> {
        self.has(key)
    }

    /// Remove the entry for an equal key, returning the stored key and value.
    pub fn remove_entry(&mut self, key: &Key) -> Result<Option<(Key, V)>> {
        let digest = self.hasher.digest(key)?;
        Ok(self.entries.remove(digest, key))
    }

    pub fn remove(&mut self, key: &Key) -> Result<Option<V>> {
        Ok(self.remove_entry(key)?.map(|(_, v)| v))
    }

    /// Remove the entry for an equal key; `Ok(true)` if one was removed.
    pub fn delete(&mut self, key: &Key) -> Result<bool> {
        Ok(self.remove_entry(key)?.is_some())
    }

    /// Remove everything. The next insertion starts the order afresh.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            debug!(
                "clearing {} entries in {} buckets",
                self.entries.len(),
                self.entries.bucket_count()
            );
        }
        self.entries.clear();
    }

    /// Insert every pair, stopping at the first key that cannot be digested.
    /// Pairs before the failing one stay inserted.
    pub fn try_extend<I>(&mut self, iter: I) -> Result<()>
    where
        I: IntoIterator<Item = (Key, V)>,
    {
        for (k, v) in iter {
            self.insert(k, v)?;
        }
        Ok(())
    }

    pub fn for_each_mut<F>(&mut self, f: F)
    where
        F: FnMut(&Key, &mut V),
    {
        self.entries.for_each_mut(f)
    }
}

impl<V, S> DeepHashMap<V, S> {
    /// Entries in insertion order. Each call starts again from the oldest
    /// live entry.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    pub fn keys(&self) -> impl ExactSizeIterator<Item = &Key> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl ExactSizeIterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }
}

/// Iterator over `(&Key, &V)` in insertion order.
pub struct Iter<'a, V> {
    inner: bucket_map::Iter<'a, V>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a Key, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<V> Clone for Iter<'_, V> {
    fn clone(&self) -> Self {
        Iter {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, V, S> IntoIterator for &'a DeepHashMap<V, S> {
    type Item = (&'a Key, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Iter<'a, V> {
        self.iter()
    }
}

impl<V, S> IntoIterator for DeepHashMap<V, S> {
    type Item = (Key, V);
    type IntoIter = bucket_map::IntoIter<V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V: fmt::Debug, S> fmt::Debug for DeepHashMap<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KeyError;
    use core::hash::Hasher;

    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> Self::Hasher {
            ConstHasher
        }
    }
    impl Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        } // force all keys into the same bucket
    }

    fn point(x: i32, y: i32) -> Key {
        Key::object([("x", x), ("y", y)])
    }

    /// Invariant: lookups stay exact when every key shares one digest.
    #[test]
    fn collision_handling_with_const_hasher() {
        let mut m = DeepHashMap::with_hasher(ConstBuildHasher);
        m.set(point(0, 0), "origin").unwrap();
        m.set(point(1, 0), "east").unwrap();
        m.set(Key::from("origin"), "name").unwrap();

        assert_eq!(m.len(), 3);
        assert_eq!(m.entries.bucket_count(), 1);
        assert_eq!(m.get(&point(0, 0)).unwrap(), Some(&"origin"));
        assert_eq!(m.get(&point(1, 0)).unwrap(), Some(&"east"));
        assert_eq!(m.get(&Key::from("origin")).unwrap(), Some(&"name"));
        assert_eq!(m.get(&point(0, 1)).unwrap(), None);

        assert!(m.delete(&point(0, 0)).unwrap());
        assert_eq!(m.get(&point(1, 0)).unwrap(), Some(&"east"));
        m.entries.assert_consistent();
    }

    /// Invariant: `set` returns the map so calls chain.
    #[test]
    fn set_chains() {
        let mut m = DeepHashMap::new();
        m.set(Key::from(1), 'a')
            .unwrap()
            .set(Key::from(2), 'b')
            .unwrap()
            .set(Key::from(1), 'c')
            .unwrap();
        assert_eq!(m.size(), 2);
        let vals: Vec<char> = m.values().copied().collect();
        assert_eq!(vals, vec!['c', 'b']);
    }

    /// Invariant: a rejected key leaves the map untouched for every operation.
    #[test]
    fn rejected_key_does_not_mutate() {
        let mut m = DeepHashMap::new().with_max_depth(1);
        m.set(Key::array([1]), 1).unwrap();
        let deep = Key::array([Key::array([1])]);

        let err = KeyError::TooDeep { limit: 1 };
        assert_eq!(m.insert(deep.clone(), 2).unwrap_err(), err);
        assert_eq!(m.get(&deep).unwrap_err(), err);
        assert_eq!(m.has(&deep).unwrap_err(), err);
        assert_eq!(m.delete(&deep).unwrap_err(), err);
        assert!(m.set(deep, 3).is_err());

        assert_eq!(m.len(), 1);
        assert_eq!(m.get(&Key::array([1])).unwrap(), Some(&1));
        m.entries.assert_consistent();
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut m = DeepHashMap::new();
        m.set(point(2, 3), 10).unwrap();
        *m.get_mut(&point(2, 3)).unwrap().unwrap() += 5;
        assert_eq!(m.get(&point(2, 3)).unwrap(), Some(&15));
        assert_eq!(m.get_mut(&point(3, 2)).unwrap(), None);
    }

    #[test]
    fn remove_variants() {
        let mut m = DeepHashMap::new();
        m.set(point(1, 1), 1).unwrap();
        m.set(point(2, 2), 2).unwrap();
        m.set(point(3, 3), 3).unwrap();
        assert_eq!(m.remove(&point(1, 1)).unwrap(), Some(1));
        assert_eq!(m.remove(&point(1, 1)).unwrap(), None);
        assert_eq!(m.remove_entry(&point(2, 2)).unwrap(), Some((point(2, 2), 2)));
        assert!(m.delete(&point(3, 3)).unwrap());
        assert!(!m.delete(&point(3, 3)).unwrap());
        assert!(m.is_empty());
    }

    #[test]
    fn try_extend_stops_at_first_bad_key() {
        let mut m = DeepHashMap::new().with_max_depth(1);
        let pairs = vec![
            (Key::from("a"), 1),
            (Key::array([Key::array(Vec::<Key>::new())]), 2),
            (Key::from("c"), 3),
        ];
        assert!(m.try_extend(pairs).is_err());
        assert_eq!(m.len(), 1);
        assert!(m.has(&Key::from("a")).unwrap());
        assert!(!m.has(&Key::from("c")).unwrap());
    }

    #[test]
    fn debug_lists_entries_in_order() {
        let mut m = DeepHashMap::new();
        m.set(Key::from("b"), 2).unwrap();
        m.set(Key::from("a"), 1).unwrap();
        assert_eq!(format!("{m:?}"), r#"{String("b"): 2, String("a"): 1}"#);
    }

    #[test]
    fn configuration_accessors() {
        let m: DeepHashMap<()> = DeepHashMap::with_capacity(16).with_max_depth(7);
        assert_eq!(m.max_depth(), 7);
        assert!(m.is_empty());
        let d: DeepHashMap<()> = DeepHashMap::default();
        assert_eq!(d.max_depth(), crate::DEFAULT_MAX_DEPTH);
    }
}
