#![cfg(test)]

// Property tests for the storage layers kept inside the crate so they can
// reach `BucketMap` internals and forge colliding digests.

use crate::bucket_map::BucketMap;
use crate::digest::{ContentHasher, Digest};
use crate::key::Key;
use crate::DeepHashMap;
use proptest::prelude::*;

// Small leaf domains so that pools often contain structurally equal keys
// built independently.
fn arb_key() -> impl Strategy<Value = Key> {
    let leaf = prop_oneof![
        Just(Key::Null),
        any::<bool>().prop_map(Key::Bool),
        (-2i32..3).prop_map(Key::from),
        Just(Key::Number(f64::NAN)),
        Just(Key::Number(-0.0)),
        "[ab]{0,2}".prop_map(Key::String),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..3).prop_map(Key::Array),
            proptest::collection::btree_map("[ab]", inner, 0..3).prop_map(Key::Object),
        ]
    })
}

// Pool-indexed operations: indices shrink toward earlier keys.
#[derive(Clone, Debug)]
enum Op {
    Set(usize, i32),
    Delete(usize),
    Get(usize),
    Has(usize),
    Clear,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<Key>, Vec<Op>)> {
    proptest::collection::vec(arb_key(), 1..=8).prop_flat_map(|pool| {
        let idx = 0..pool.len();
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Set(i, v)),
            2 => idx.clone().prop_map(Op::Delete),
            2 => idx.clone().prop_map(Op::Get),
            2 => idx.prop_map(Op::Has),
            1 => Just(Op::Clear),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

/// Ordered reference model: a Vec of pairs searched linearly with `==`.
#[derive(Default)]
struct Model(Vec<(Key, i32)>);

impl Model {
    fn position(&self, k: &Key) -> Option<usize> {
        self.0.iter().position(|(mk, _)| mk == k)
    }
    fn set(&mut self, k: Key, v: i32) -> Option<i32> {
        match self.position(&k) {
            Some(i) => Some(std::mem::replace(&mut self.0[i].1, v)),
            None => {
                self.0.push((k, v));
                None
            }
        }
    }
    fn get(&self, k: &Key) -> Option<i32> {
        self.position(k).map(|i| self.0[i].1)
    }
    fn delete(&mut self, k: &Key) -> Option<i32> {
        self.position(k).map(|i| self.0.remove(i).1)
    }
}

// Property: BucketMap matches the ordered model even when digests are folded
// down to a single bit, so nearly every lookup goes through a collision.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_bucket_map_under_collisions((pool, ops) in arb_scenario()) {
        let hasher = ContentHasher::new();
        let weak = |k: &Key| Digest::from_raw(hasher.digest(k).unwrap().get() & 1);
        let mut sut: BucketMap<i32> = BucketMap::new();
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Set(i, v) => {
                    let k = pool[i].clone();
                    let expect = model.set(k.clone(), v);
                    prop_assert_eq!(sut.insert(weak(&k), k, v), expect);
                }
                Op::Delete(i) => {
                    let k = &pool[i];
                    let expect = model.delete(k);
                    prop_assert_eq!(sut.remove(weak(k), k).map(|(_, v)| v), expect);
                }
                Op::Get(i) => {
                    let k = &pool[i];
                    prop_assert_eq!(sut.get(weak(k), k).copied(), model.get(k));
                }
                Op::Has(i) => {
                    let k = &pool[i];
                    prop_assert_eq!(sut.contains(weak(k), k), model.position(k).is_some());
                }
                Op::Clear => {
                    sut.clear();
                    model.0.clear();
                }
                Op::Iterate => {
                    let seen: Vec<(Key, i32)> =
                        sut.iter().map(|(_, k, v)| (k.clone(), *v)).collect();
                    prop_assert_eq!(&seen, &model.0);
                }
            }
            prop_assert_eq!(sut.len(), model.0.len());
            prop_assert!(sut.bucket_count() <= 2);
            sut.assert_consistent();
        }
    }
}

// Property: DeepHashMap matches the ordered model; lookups use fresh clones
// of pool keys, never the stored instances.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_deep_hash_map_state_machine((pool, ops) in arb_scenario()) {
        let mut sut: DeepHashMap<i32> = DeepHashMap::new();
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Set(i, v) => {
                    let expect = model.set(pool[i].clone(), v);
                    prop_assert_eq!(sut.insert(pool[i].clone(), v).unwrap(), expect);
                }
                Op::Delete(i) => {
                    let present = model.delete(&pool[i]).is_some();
                    prop_assert_eq!(sut.delete(&pool[i].clone()).unwrap(), present);
                }
                Op::Get(i) => {
                    prop_assert_eq!(sut.get(&pool[i].clone()).unwrap().copied(), model.get(&pool[i]));
                }
                Op::Has(i) => {
                    prop_assert_eq!(sut.has(&pool[i].clone()).unwrap(), model.position(&pool[i]).is_some());
                }
                Op::Clear => {
                    sut.clear();
                    model.0.clear();
                }
                Op::Iterate => {
                    let seen: Vec<(Key, i32)> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                    prop_assert_eq!(&seen, &model.0);
                }
            }
            prop_assert_eq!(sut.size(), model.0.len());
            prop_assert_eq!(sut.is_empty(), model.0.is_empty());
        }
    }
}
