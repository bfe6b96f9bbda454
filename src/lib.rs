//! deep-hashmap: a single-threaded hash map whose keys are compared by
//! structural content instead of identity.
//!
//! Two keys built independently, such as `{a: 1}` and another `{a: 1}`,
//! resolve to the same entry.
//!
//! Internal Design:
//!
//! Summary
//! - Layers:
//!   - `Key`: tagged union of supported key shapes (null, bool, number,
//!     string, array, object) with recursive structural equality.
//!   - `ContentHasher`: walks a key and produces a `Digest`; equal keys
//!     always digest alike. Nesting depth is bounded so hostile keys are
//!     rejected instead of exhausting the stack.
//!   - `BucketMap<V>`: digest-indexed storage. A `HashTable` maps each
//!     digest to a bucket of slot keys; entries live in a `SlotMap` and are
//!     linked in insertion order. Methods take a precomputed digest and
//!     cannot fail.
//!   - `DeepHashMap<V, S>`: public API; digests first, then delegates to
//!     `BucketMap`.
//!
//! Equality law
//! - Scalars compare by value; NaN equals NaN and `-0.0 == 0.0`.
//! - Arrays compare element-wise in order.
//! - Objects compare as sets of properties; construction order is ignored.
//! - Different shapes never compare equal (`"1"` is not `1`).
//!
//! Ordering
//! - Iteration yields entries in first-insertion order. An update keeps
//!   the entry's place; delete followed by insert appends. `clear`
//!   restarts the sequence.
//! - Iterators borrow the map, so mutation during iteration cannot
//!   compile.
//!
//! Errors
//! - A key deeper than the configured maximum is reported as
//!   `KeyError::TooDeep` by set/get/has/delete before any state changes.
//!   Cyclic keys cannot be built from owned `Key` values.
//!
//! Notes and non-goals
//! - No internal locking. The map is `Send`/`Sync` when its values and
//!   hasher are, so callers needing shared access wrap it in a `Mutex`.
//! - No persistence, no weak keys, no ordering beyond insertion order.
//! - The core performs no I/O; it only emits `log` records.

pub mod bucket_map;
mod deep_hash_map;
mod deep_hash_map_proptest;
mod digest;
mod error;
mod key;

// Public surface
pub use deep_hash_map::{DeepHashMap, Iter};
pub use digest::{ContentHasher, Digest, DigestState, DEFAULT_MAX_DEPTH};
pub use error::{KeyError, Result};
pub use key::Key;
