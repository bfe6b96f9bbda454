//! Content hasher: deterministic digests over the structure of a `Key`.
//!
//! The walk writes a variant tag before every value and a length before every
//! string and container, so distinct shapes never share an encoding. Object
//! properties are visited in name order (the `BTreeMap` order), which makes
//! the digest independent of how the object was built. Numbers are
//! canonicalised first: all NaNs hash alike and `-0.0` hashes as `0.0`.
//!
//! Digests only pick a bucket. Two different keys may share a digest; the map
//! always confirms with structural equality.

use core::hash::{BuildHasher, Hasher};

use log::debug;
use siphasher::sip::SipHasher13;

use crate::error::{KeyError, Result};
use crate::key::Key;

/// Nesting depth accepted by default. Deeper keys are rejected with
/// `KeyError::TooDeep` instead of risking stack exhaustion.
pub const DEFAULT_MAX_DEPTH: usize = 128;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_NUMBER: u8 = 2;
const TAG_STRING: u8 = 3;
const TAG_ARRAY: u8 = 4;
const TAG_OBJECT: u8 = 5;

/// Fixed-width digest of a key's structural content.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(u64);

impl Digest {
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Wrap a raw value, e.g. to drive `BucketMap` with digests computed
    /// elsewhere.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Digest(raw)
    }
}

/// Default hasher state: SipHash-1-3 under fixed keys, so a key's digest is
/// the same in every process.
#[derive(Copy, Clone, Debug, Default)]
pub struct DigestState;

impl DigestState {
    const K0: u64 = 0x6465_6570_2d6b_6579;
    const K1: u64 = 0x6861_7368_6d61_7021;
}

impl BuildHasher for DigestState {
    type Hasher = SipHasher13;

    fn build_hasher(&self) -> Self::Hasher {
        SipHasher13::new_with_keys(Self::K0, Self::K1)
    }
}

/// Computes digests for keys with a bounded nesting depth.
#[derive(Clone, Debug)]
pub struct ContentHasher<S = DigestState> {
    state: S,
    max_depth: usize,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::with_state(DigestState)
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BuildHasher> ContentHasher<S> {
    pub fn with_state(state: S) -> Self {
        Self {
            state,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub(crate) fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Digest `key`, or report why it cannot be digested.
    pub fn digest(&self, key: &Key) -> Result<Digest> {
        let mut h = self.state.build_hasher();
        match write_key(key, &mut h, Some(self.max_depth)) {
            Ok(()) => Ok(Digest(h.finish())),
            Err(e) => {
                debug!("rejecting key: {e}");
                Err(e)
            }
        }
    }
}

/// Feed the canonical encoding of `key` into `h`. With `limit = None` the
/// walk never fails.
pub(crate) fn write_key<H>(key: &Key, h: &mut H, limit: Option<usize>) -> Result<()>
where
    H: Hasher + ?Sized,
{
    walk(key, h, 0, limit)
}

fn walk<H>(key: &Key, h: &mut H, depth: usize, limit: Option<usize>) -> Result<()>
where
    H: Hasher + ?Sized,
{
    match key {
        Key::Null => h.write_u8(TAG_NULL),
        Key::Bool(b) => {
            h.write_u8(TAG_BOOL);
            h.write_u8(*b as u8);
        }
        Key::Number(n) => {
            h.write_u8(TAG_NUMBER);
            h.write_u64(canonical_bits(*n));
        }
        Key::String(s) => {
            h.write_u8(TAG_STRING);
            write_str(h, s);
        }
        Key::Array(items) => {
            let depth = descend(depth, limit)?;
            h.write_u8(TAG_ARRAY);
            h.write_u64(items.len() as u64);
            for item in items {
                walk(item, h, depth, limit)?;
            }
        }
        Key::Object(props) => {
            let depth = descend(depth, limit)?;
            h.write_u8(TAG_OBJECT);
            h.write_u64(props.len() as u64);
            for (name, value) in props {
                write_str(h, name);
                walk(value, h, depth, limit)?;
            }
        }
    }
    Ok(())
}

#[inline]
fn descend(depth: usize, limit: Option<usize>) -> Result<usize> {
    let depth = depth + 1;
    match limit {
        Some(limit) if depth > limit => Err(KeyError::TooDeep { limit }),
        _ => Ok(depth),
    }
}

#[inline]
fn write_str<H: Hasher + ?Sized>(h: &mut H, s: &str) {
    // Lengths are written as u64 so digests match across pointer widths.
    h.write_u64(s.len() as u64);
    h.write(s.as_bytes());
}

#[inline]
fn canonical_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0
    } else {
        n.to_bits()
    }
}
