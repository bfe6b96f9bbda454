//! Key: tagged union of the values a `DeepHashMap` accepts as keys.
//!
//! Equality is structural. Two keys are equal when they belong to the same
//! category and their contents are recursively equal; object property order
//! plays no part because properties live in a `BTreeMap`. Numbers follow the
//! usual deep-equality convention: every NaN equals every other NaN and
//! `-0.0 == 0.0`.

use core::hash::{Hash, Hasher};
use core::mem;
use std::collections::BTreeMap;

use crate::digest::write_key;
use crate::error::KeyError;

/// Largest integer magnitude an `f64` holds exactly (2^53).
const MAX_EXACT_INTEGER: u128 = 1 << 53;

/// A map key: a scalar, an ordered array of keys, or an object of named
/// keys. Compared and hashed by content.
///
/// Dropping a key is iterative, so even keys too deep to digest can be
/// released safely.
#[derive(Clone, Debug, Default)]
pub enum Key {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Key>),
    Object(BTreeMap<String, Key>),
}

impl Key {
    /// Build an array key from anything convertible into keys.
    pub fn array<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Key>,
    {
        Key::Array(items.into_iter().map(Into::into).collect())
    }

    /// Build an object key from `(name, value)` pairs. A repeated name keeps
    /// the last value, like assigning the same property twice.
    pub fn object<I, N, T>(props: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<Key>,
    {
        Key::Object(
            props
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Key::Array(_) | Key::Object(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Key::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Key::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Key::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Key]> {
        match self {
            Key::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Key>> {
        match self {
            Key::Object(props) => Some(props),
            _ => None,
        }
    }

    /// Nesting depth: scalars are 0, a container is one more than its
    /// deepest child (an empty container is 1).
    ///
    /// Iterative so that it can measure keys too deep to recurse over.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 0usize)];
        while let Some((key, d)) = stack.pop() {
            match key {
                Key::Array(items) => {
                    max = max.max(d + 1);
                    stack.extend(items.iter().map(|k| (k, d + 1)));
                }
                Key::Object(props) => {
                    max = max.max(d + 1);
                    stack.extend(props.values().map(|k| (k, d + 1)));
                }
                _ => max = max.max(d),
            }
        }
        max
    }
}

/// Numeric equality for keys: NaN is reflexive, signed zeros collapse.
#[inline]
fn number_eq(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Null, Key::Null) => true,
            (Key::Bool(a), Key::Bool(b)) => a == b,
            (Key::Number(a), Key::Number(b)) => number_eq(*a, *b),
            (Key::String(a), Key::String(b)) => a == b,
            (Key::Array(a), Key::Array(b)) => a == b,
            // BTreeMap equality compares sorted (name, value) pairs, which
            // makes construction order irrelevant.
            (Key::Object(a), Key::Object(b)) => a == b,
            _ => false,
        }
    }
}

// NaN == NaN above keeps equality reflexive.
impl Eq for Key {}

/// Agrees with the digest encoding, minus the depth check: hashing a key
/// nested deeper than the stack allows overflows, as with any recursive
/// `Hash`. Use `ContentHasher::digest` for untrusted keys.
impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Without a depth limit the walk cannot fail.
        let _ = write_key(self, state, None);
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Key::Bool(b)
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        Key::Number(n)
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Key {
                fn from(n: $t) -> Self {
                    Key::Number(n as f64)
                }
            }
        )*
    };
}

number_from!(f32, i8, i16, i32, u8, u16, u32);

// Wider integers only convert when the f64 stores them exactly; otherwise
// distinct integers would collapse into one key.
macro_rules! number_try_from {
    ($($t:ty),*) => {
        $(
            impl TryFrom<$t> for Key {
                type Error = KeyError;

                fn try_from(n: $t) -> Result<Self, KeyError> {
                    let wide = n as i128;
                    if wide.unsigned_abs() <= MAX_EXACT_INTEGER {
                        Ok(Key::Number(n as f64))
                    } else {
                        Err(KeyError::InexactInteger(wide))
                    }
                }
            }
        )*
    };
}

number_try_from!(i64, isize, u64, usize);

impl Drop for Key {
    fn drop(&mut self) {
        let mut stack = match self {
            Key::Array(items) if items.iter().any(Key::is_container) => mem::take(items),
            Key::Object(props) if props.values().any(Key::is_container) => {
                mem::take(props).into_values().collect()
            }
            _ => return,
        };
        // Detach each node's children before it drops, so no drop recurses.
        while let Some(mut key) = stack.pop() {
            match &mut key {
                Key::Array(items) => stack.append(items),
                Key::Object(props) => stack.extend(mem::take(props).into_values()),
                _ => {}
            }
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::String(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::String(s)
    }
}

impl From<Vec<Key>> for Key {
    fn from(items: Vec<Key>) -> Self {
        Key::Array(items)
    }
}

impl From<BTreeMap<String, Key>> for Key {
    fn from(props: BTreeMap<String, Key>) -> Self {
        Key::Object(props)
    }
}

impl<T: Into<Key>> From<Option<T>> for Key {
    fn from(v: Option<T>) -> Self {
        v.map_or(Key::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn std_hash(k: &Key) -> u64 {
        let mut h = DefaultHasher::new();
        k.hash(&mut h);
        h.finish()
    }

    #[test]
    fn object_property_order_is_irrelevant() {
        let a = Key::object([("a", 1), ("b", 2)]);
        let b = Key::object([("b", 2), ("a", 1)]);
        assert_eq!(a, b);
        assert_eq!(std_hash(&a), std_hash(&b));
    }

    #[test]
    fn array_element_order_matters() {
        assert_ne!(Key::array([1, 2]), Key::array([2, 1]));
    }

    #[test]
    fn categories_never_compare_equal() {
        assert_ne!(Key::from("1"), Key::from(1));
        assert_ne!(Key::from(0), Key::from(false));
        assert_ne!(Key::Null, Key::from(0));
        assert_ne!(Key::array(Vec::<Key>::new()), Key::object(Vec::<(String, Key)>::new()));
        assert_ne!(Key::array(["a"]), Key::object([("0", "a")]));
    }

    #[test]
    fn nan_and_signed_zero() {
        assert_eq!(Key::from(f64::NAN), Key::from(f64::NAN));
        assert_eq!(Key::from(-0.0), Key::from(0.0));
        assert_eq!(std_hash(&Key::from(-0.0)), std_hash(&Key::from(0.0)));
        assert_eq!(
            std_hash(&Key::from(f64::NAN)),
            std_hash(&Key::from(-f64::NAN))
        );
    }

    #[test]
    fn repeated_property_keeps_last_value() {
        let k = Key::object([("a", 1), ("a", 2)]);
        assert_eq!(k, Key::object([("a", 2)]));
    }

    #[test]
    fn depth_counts_container_levels() {
        assert_eq!(Key::from(1).depth(), 0);
        assert_eq!(Key::array(Vec::<Key>::new()).depth(), 1);
        let nested = Key::object([("a", Key::array([Key::object([("b", 1)])]))]);
        assert_eq!(nested.depth(), 3);
    }

    #[test]
    fn wide_integers_convert_only_when_exact() {
        let limit = 1u64 << 53;
        assert_eq!(Key::try_from(limit), Ok(Key::from(9_007_199_254_740_992.0)));
        assert_eq!(Key::try_from(-(1i64 << 53)).map(|k| k.as_f64()), Ok(Some(-(limit as f64))));
        assert_eq!(Key::try_from(7usize), Ok(Key::from(7)));
        assert_eq!(
            Key::try_from(limit + 1),
            Err(KeyError::InexactInteger(9_007_199_254_740_993))
        );
        assert!(Key::try_from(i64::MIN).is_err());
        assert!(Key::try_from(u64::MAX).is_err());
    }

    #[test]
    fn deep_keys_drop_without_recursion() {
        let mut k = Key::from("leaf");
        for i in 0..200_000 {
            k = if i % 2 == 0 {
                Key::array([k])
            } else {
                Key::object([("n", k)])
            };
        }
        assert_eq!(k.depth(), 200_000);
        drop(k);
    }

    #[test]
    fn accessors() {
        assert!(Key::from(None::<i32>).is_null());
        assert_eq!(Key::from(true).as_bool(), Some(true));
        assert_eq!(Key::from(2u8).as_f64(), Some(2.0));
        assert_eq!(Key::from("x").as_str(), Some("x"));
        assert_eq!(Key::array([1]).as_array().map(<[Key]>::len), Some(1));
        assert!(Key::object([("a", 1)]).as_object().unwrap().contains_key("a"));
        assert_eq!(Key::from("x").as_f64(), None);
    }
}
