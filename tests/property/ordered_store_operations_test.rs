//! Property-based tests for the ordered keyed store.
//!
//! Every operation sequence is replayed against a plain `Vec` model. After each
//! step the store must agree with the model and keep its record/order bijection.

use proptest::prelude::*;
use threadwatch::managers::ordered_store::OrderedKeyedStore;

#[derive(Debug, Clone)]
enum Op {
    InsertAt(usize, u8),
    Remove(u8),
    Move(usize, usize),
    Replace(u8, u32),
    RetainEven,
    Clear,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            4 => (0..12usize, 0..16u8).prop_map(|(i, k)| Op::InsertAt(i, k)),
            2 => (0..16u8).prop_map(Op::Remove),
            3 => (0..12usize, 0..12usize).prop_map(|(f, t)| Op::Move(f, t)),
            2 => (0..16u8, any::<u32>()).prop_map(|(k, v)| Op::Replace(k, v)),
            1 => Just(Op::RetainEven),
            1 => Just(Op::Clear),
        ],
        1..80,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ordered_store_matches_vec_model(ops in arb_ops()) {
        let store = OrderedKeyedStore::<u8, u32>::new(true);
        let mut model: Vec<(u8, u32)> = Vec::new();

        for op in &ops {
            match *op {
                Op::InsertAt(index, key) => {
                    let result = store.write_locked(|e| e.insert_at(index, key, u32::from(key)));
                    let valid = index <= model.len() && !model.iter().any(|(k, _)| *k == key);
                    prop_assert_eq!(result.is_ok(), valid);
                    if valid {
                        model.insert(index, (key, u32::from(key)));
                    }
                }
                Op::Remove(key) => {
                    let removed = store.write_locked(|e| e.remove(&key));
                    let position = model.iter().position(|(k, _)| *k == key);
                    let expected = position.map(|p| model.remove(p).1);
                    prop_assert_eq!(removed, expected);
                }
                Op::Move(from, to) => {
                    let result = store.move_entry(from, to);
                    let valid = from < model.len() && to < model.len();
                    prop_assert_eq!(result.is_ok(), valid);
                    if valid {
                        let entry = model.remove(from);
                        model.insert(to, entry);
                    }
                }
                Op::Replace(key, value) => {
                    let previous = store.write_locked(|e| e.replace(&key, value));
                    let slot = model.iter_mut().find(|(k, _)| *k == key);
                    let expected = slot.map(|(_, v)| std::mem::replace(v, value));
                    prop_assert_eq!(previous, expected);
                }
                Op::RetainEven => {
                    let removed = store.write_locked(|e| e.retain(|k, _| k % 2 == 0));
                    let expected: Vec<u8> =
                        model.iter().filter(|(k, _)| k % 2 != 0).map(|(k, _)| *k).collect();
                    model.retain(|(k, _)| k % 2 == 0);
                    prop_assert_eq!(removed, expected);
                }
                Op::Clear => {
                    let removed = store.write_locked(|e| e.clear());
                    let expected: Vec<u8> = model.drain(..).map(|(k, _)| k).collect();
                    prop_assert_eq!(removed, expected);
                }
            }

            prop_assert!(store.assert_consistent().is_ok());
            let actual: Vec<(u8, u32)> =
                store.read_locked(|e| e.iter().map(|(k, v)| (*k, *v)).collect());
            prop_assert_eq!(&actual, &model);
        }
    }

    #[test]
    fn move_then_inverse_move_restores_order(len in 1..20usize, from in 0..20usize, to in 0..20usize) {
        let from = from % len;
        let to = to % len;
        let store = OrderedKeyedStore::<usize, ()>::new(true);
        store.write_locked(|e| {
            for key in 0..len {
                e.push_back(key, ()).unwrap();
            }
        });
        let before = store.read_locked(|e| e.keys().to_vec());

        store.move_entry(from, to).unwrap();
        store.move_entry(to, from).unwrap();

        prop_assert_eq!(store.read_locked(|e| e.keys().to_vec()), before);
    }
}
