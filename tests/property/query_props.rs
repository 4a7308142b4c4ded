//! Search operator properties.

use proptest::prelude::*;

use crate::operator_strategy;
use tagstorm::client::MAX_QUERY_DEPTH;
use tagstorm::SearchOperator;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The JSON the service receives parses back to the same tree.
    #[test]
    fn prop_operator_json_round_trip(op in operator_strategy()) {
        let json = serde_json::to_value(&op).unwrap();
        let back: SearchOperator = serde_json::from_value(json).unwrap();
        prop_assert_eq!(back, op);
    }

    #[test]
    fn prop_validate_agrees_with_depth(op in operator_strategy()) {
        prop_assert_eq!(op.validate().is_ok(), op.depth() <= MAX_QUERY_DEPTH);
    }

    /// Balanced conjunctions of up to 32 leaves always pass validation.
    #[test]
    fn prop_all_of_stays_shallow(ids in prop::collection::vec(any::<u64>(), 1..=32)) {
        let n = ids.len();
        let op = SearchOperator::all_of(ids.into_iter().map(SearchOperator::tag)).unwrap();
        let bound = usize::BITS - (n - 1).leading_zeros();
        prop_assert_eq!(op.depth(), bound as usize);
        prop_assert!(op.validate().is_ok());
    }
}
