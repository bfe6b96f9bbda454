//! BucketMap: digest-indexed storage with insertion-ordered entries.
//!
//! Entries live in a `SlotMap` and are threaded into a doubly linked list in
//! insertion order. The index is a `HashTable` of buckets, one per distinct
//! digest; a bucket lists the slots of every entry sharing that digest, and
//! structural equality picks among them. A bucket is released as soon as it
//! empties.
//!
//! Callers supply the digest. Keeping hashing out of this layer means every
//! method here is infallible and a rejected key never reaches storage.

use core::mem;

use hashbrown::hash_table::Entry as TableEntry;
use hashbrown::HashTable;
use log::trace;
use slotmap::{DefaultKey, SlotMap};

use crate::digest::Digest;
use crate::key::Key;

#[derive(Clone, Debug)]
struct Entry<V> {
    key: Key,
    value: V,
    digest: Digest,
    order: u64,
    prev: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

#[derive(Clone, Debug)]
struct Bucket {
    digest: Digest,
    slots: Vec<DefaultKey>,
}

#[derive(Clone)]
pub struct BucketMap<V> {
    index: HashTable<Bucket>,
    slots: SlotMap<DefaultKey, Entry<V>>,
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
    next_order: u64,
}

impl<V> Default for BucketMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> BucketMap<V> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashTable::with_capacity(capacity),
            slots: SlotMap::with_capacity_and_key(capacity),
            head: None,
            tail: None,
            next_order: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of live buckets, i.e. distinct digests currently stored.
    pub fn bucket_count(&self) -> usize {
        self.index.len()
    }

    fn locate(&self, digest: Digest, key: &Key) -> Option<DefaultKey> {
        let bucket = self.index.find(digest.get(), |b| b.digest == digest)?;
        bucket
            .slots
            .iter()
            .copied()
            .find(|&s| self.slots.get(s).is_some_and(|e| e.key == *key))
    }

    pub fn contains(&self, digest: Digest, key: &Key) -> bool {
        self.locate(digest, key).is_some()
    }

    pub fn get(&self, digest: Digest, key: &Key) -> Option<&V> {
        let s = self.locate(digest, key)?;
        self.slots.get(s).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, digest: Digest, key: &Key) -> Option<&mut V> {
        let s = self.locate(digest, key)?;
        self.slots.get_mut(s).map(|e| &mut e.value)
    }

    /// Insert `key -> value`, or replace the value of the equal key already
    /// present and return the old one. A replaced entry keeps its position.
    pub fn insert(&mut self, digest: Digest, key: Key, value: V) -> Option<V> {
        if let Some(s) = self.locate(digest, &key) {
            return Some(mem::replace(&mut self.slots[s].value, value));
        }

        let order = self.next_order;
        self.next_order += 1;
        let s = self.slots.insert(Entry {
            key,
            value,
            digest,
            order,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(t) => self.slots[t].next = Some(s),
            None => self.head = Some(s),
        }
        self.tail = Some(s);

        match self
            .index
            .entry(digest.get(), |b| b.digest == digest, |b| b.digest.get())
        {
            TableEntry::Occupied(mut o) => o.get_mut().slots.push(s),
            TableEntry::Vacant(v) => {
                trace!("bucket {:016x} created", digest.get());
                v.insert(Bucket {
                    digest,
                    slots: vec![s],
                });
            }
        }
        None
    }

    /// Remove the entry whose key equals `key` and hand back its key and value.
    pub fn remove(&mut self, digest: Digest, key: &Key) -> Option<(Key, V)> {
        let slots = &self.slots;
        let mut bucket = self
            .index
            .find_entry(digest.get(), |b| b.digest == digest)
            .ok()?;
        let pos = bucket
            .get()
            .slots
            .iter()
            .position(|&s| slots.get(s).is_some_and(|e| e.key == *key))?;
        let s = bucket.get_mut().slots.remove(pos);
        if bucket.get().slots.is_empty() {
            bucket.remove();
            trace!("bucket {:016x} released", digest.get());
        }

        let entry = self
            .slots
            .remove(s)
            .expect("bucket slot must refer to a live entry");
        debug_assert_eq!(entry.digest, digest);
        self.unlink(entry.prev, entry.next);
        Some((entry.key, entry.value))
    }

    fn unlink(&mut self, prev: Option<DefaultKey>, next: Option<DefaultKey>) {
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
    }

    /// Drop every entry and bucket and restart the insertion sequence.
    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.head = None;
        self.tail = None;
        self.next_order = 0;
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            slots: &self.slots,
            cursor: self.head,
            remaining: self.slots.len(),
        }
    }

    /// Visit every entry in insertion order with mutable access to its value.
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&Key, &mut V),
    {
        let mut cursor = self.head;
        while let Some(s) = cursor {
            let e = &mut self.slots[s];
            f(&e.key, &mut e.value);
            cursor = e.next;
        }
    }

    /// Check that index, storage and order list agree. Test support.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let mut indexed = 0;
        for b in self.index.iter() {
            assert!(!b.slots.is_empty(), "empty bucket left in the index");
            for &s in &b.slots {
                let e = self.slots.get(s).expect("bucket slot is live");
                assert_eq!(e.digest, b.digest, "entry filed under the wrong digest");
                indexed += 1;
            }
        }
        assert_eq!(indexed, self.slots.len(), "entries reachable via buckets");

        let orders: Vec<u64> = self.iter().map(|(o, _, _)| o).collect();
        assert_eq!(orders.len(), self.slots.len(), "order list covers all entries");
        assert!(orders.windows(2).all(|w| w[0] < w[1]), "ascending order");
        assert!(orders.last().map_or(true, |&o| o < self.next_order));
    }
}

/// Iterator over entries in insertion order, yielding each entry's sequence
/// number alongside its key and value.
pub struct Iter<'a, V> {
    slots: &'a SlotMap<DefaultKey, Entry<V>>,
    cursor: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (u64, &'a Key, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let slots = self.slots;
        let e = &slots[self.cursor?];
        self.cursor = e.next;
        self.remaining -= 1;
        Some((e.order, &e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<'a, V> Clone for Iter<'a, V> {
    fn clone(&self) -> Self {
        Iter {
            slots: self.slots,
            cursor: self.cursor,
            remaining: self.remaining,
        }
    }
}

/// Owning iterator in insertion order.
pub struct IntoIter<V> {
    slots: SlotMap<DefaultKey, Entry<V>>,
    cursor: Option<DefaultKey>,
}

impl<V> Iterator for IntoIter<V> {
    type Item = (Key, V);
    fn next(&mut self) -> Option<Self::Item> {
        let e = self.slots.remove(self.cursor?)?;
        self.cursor = e.next;
        Some((e.key, e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.slots.len(), Some(self.slots.len()))
    }
}

impl<V> ExactSizeIterator for IntoIter<V> {}

impl<V> IntoIterator for BucketMap<V> {
    type Item = (Key, V);
    type IntoIter = IntoIter<V>;

    fn into_iter(self) -> IntoIter<V> {
        IntoIter {
            slots: self.slots,
            cursor: self.head,
        }
    }
}
