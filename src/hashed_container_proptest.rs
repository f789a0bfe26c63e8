#![cfg(test)]

// Property tests for HashedContainer kept inside the crate so they can
// inspect the hash index directly.

use crate::container::Container;
use crate::error::Error;
use crate::hashed_container::HashedContainer;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    FindOrAdd(u16),
    Add(u16),
    Delete(u16),
    DeleteAt(usize),
    Find(u16),
    Update(u16, bool),
    Rehash,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    // A small key space forces hits, duplicates and deletes of live keys.
    let key = 0u16..40;
    let op = prop_oneof![
        3 => key.clone().prop_map(Op::FindOrAdd),
        2 => key.clone().prop_map(Op::Add),
        2 => key.clone().prop_map(Op::Delete),
        1 => (0usize..50).prop_map(Op::DeleteAt),
        2 => key.clone().prop_map(Op::Find),
        1 => (key, any::<bool>()).prop_map(|(k, a)| Op::Update(k, a)),
        1 => Just(Op::Rehash),
    ];
    proptest::collection::vec(op, 1..120)
}

fn low_bits(v: &u16) -> u32 {
    (*v % 3) as u32
}

fn run(ops: Vec<Op>, trigger: usize, colliding: bool) -> Result<(), TestCaseError> {
    let mut slot = None;
    let mut sut = HashedContainer::new(Container::<u16>::new(&mut slot)).with_count_trigger(trigger);
    if colliding {
        sut = sut.with_hasher(low_bits);
    }
    let mut model: Vec<u16> = Vec::new();

    for op in ops {
        match op {
            Op::FindOrAdd(k) => {
                let (at, added) = sut.find_or_add(k).unwrap();
                match model.iter().position(|&m| m == k) {
                    Some(i) => prop_assert_eq!((at, added), (i, false)),
                    None => {
                        prop_assert_eq!((at, added), (model.len(), true));
                        model.push(k);
                    }
                }
            }
            Op::Add(k) => {
                let res = sut.add(k);
                if model.contains(&k) {
                    prop_assert_eq!(res, Err(Error::DuplicateKey));
                } else {
                    prop_assert_eq!(res, Ok(model.len()));
                    model.push(k);
                }
            }
            Op::Delete(k) => {
                let deleted = sut.delete(&k).unwrap();
                match model.iter().position(|&m| m == k) {
                    Some(i) => {
                        prop_assert!(deleted);
                        model.remove(i);
                    }
                    None => prop_assert!(!deleted),
                }
            }
            Op::DeleteAt(i) => {
                let deleted = sut.delete_at(i).unwrap();
                prop_assert_eq!(deleted, i < model.len());
                if deleted {
                    model.remove(i);
                }
            }
            Op::Find(k) => {
                prop_assert_eq!(sut.find(&k).unwrap(), model.iter().position(|&m| m == k));
            }
            Op::Update(k, add) => {
                let res = sut.update(k, add).unwrap();
                match model.iter().position(|&m| m == k) {
                    Some(i) => prop_assert_eq!(res, Some(i)),
                    None if add => {
                        prop_assert_eq!(res, Some(model.len()));
                        model.push(k);
                    }
                    None => prop_assert_eq!(res, None),
                }
            }
            Op::Rehash => {
                prop_assert_eq!(sut.rehash().unwrap(), 0);
            }
        }

        // Contents mirror the model; while hashing, the table holds every
        // live index exactly once.
        prop_assert_eq!(sut.container().as_slice(), &model[..]);
        if sut.is_hashing() {
            let mut seen: Vec<u32> = sut
                .hash_index()
                .slots()
                .iter()
                .copied()
                .filter(|&v| v != 0)
                .collect();
            seen.sort_unstable();
            let expected: Vec<u32> = (1..=model.len() as u32).collect();
            prop_assert_eq!(seen, expected);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn prop_matches_vec_model(ops in arb_ops(), trigger in 0usize..6) {
        run(ops, trigger, false)?;
    }

    // Three hash values for forty keys: long probe runs, deletes in the
    // middle of them.
    #[test]
    fn prop_matches_vec_model_under_collisions(ops in arb_ops()) {
        run(ops, 0, true)?;
    }

    #[test]
    fn prop_find_or_add_indices_are_stable(keys in proptest::collection::hash_set(any::<u32>(), 0..200)) {
        let mut slot = None;
        let mut sut = HashedContainer::new(Container::<u32>::new(&mut slot));
        let keys: Vec<u32> = keys.into_iter().collect();
        let mut placed = Vec::new();
        for &k in &keys {
            let (at, added) = sut.find_or_add(k).unwrap();
            prop_assert!(added);
            placed.push(at);
        }
        prop_assert_eq!(sut.len(), keys.len());
        for (k, at) in keys.iter().zip(placed) {
            prop_assert_eq!(sut.find(k).unwrap(), Some(at));
        }
    }
}
