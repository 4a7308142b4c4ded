//! MemoCache against a reference model: a bounded map with recency order.

use std::collections::VecDeque;

use proptest::prelude::*;
use tagstorm::MemoCache;

/// Reference LRU: front is least recently used.
struct Model {
    capacity: usize,
    order: VecDeque<(u8, u32)>,
}

impl Model {
    fn get_or_compute(&mut self, key: u8) -> (u32, bool) {
        if let Some(pos) = self.order.iter().position(|(k, _)| *k == key) {
            let entry = self.order.remove(pos).unwrap();
            self.order.push_back(entry);
            return (entry.1, true);
        }
        let value = u32::from(key) * 7;
        if self.capacity > 0 {
            if self.order.len() == self.capacity {
                self.order.pop_front();
            }
            self.order.push_back((key, value));
        }
        (value, false)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_matches_reference_lru(
        capacity in 0usize..6,
        keys in prop::collection::vec(0u8..10, 0..60),
    ) {
        let mut cache = MemoCache::new(capacity);
        let mut model = Model { capacity, order: VecDeque::new() };
        let mut expected_hits = 0u64;

        for key in keys {
            let mut computed = false;
            let value = cache.get_or_compute(key, |k| {
                computed = true;
                u32::from(*k) * 7
            });
            let (model_value, model_hit) = model.get_or_compute(key);
            prop_assert_eq!(value, model_value);
            prop_assert_eq!(computed, !model_hit);
            expected_hits += u64::from(model_hit);
            prop_assert!(cache.len() <= capacity);
        }

        prop_assert_eq!(cache.len(), model.order.len());
        for (key, value) in &model.order {
            prop_assert_eq!(cache.peek(key), Some(value));
        }
        prop_assert_eq!(cache.stats().hits, expected_hits);
    }
}
