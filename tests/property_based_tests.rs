//! Property-based coverage for the pure pieces: pagination math, filter
//! serialization, and value comparison.

use conductor_data::{CompareOp, EngineConfig, FieldValue, Filter, PageInfo};
use proptest::prelude::*;

fn field_value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        Just(FieldValue::Null),
        any::<bool>().prop_map(FieldValue::Bool),
        any::<i64>().prop_map(FieldValue::Int),
        (-1.0e12..1.0e12f64).prop_map(FieldValue::Float),
        "[a-zA-Z0-9 _-]{0,16}".prop_map(FieldValue::String),
    ]
}

fn compare_op_strategy() -> impl Strategy<Value = CompareOp> {
    prop_oneof![
        Just(CompareOp::Eq),
        Just(CompareOp::Ne),
        Just(CompareOp::Lt),
        Just(CompareOp::Lte),
        Just(CompareOp::Gt),
        Just(CompareOp::Gte),
        Just(CompareOp::Contains),
        Just(CompareOp::StartsWith),
        Just(CompareOp::EndsWith),
    ]
}

fn filter_strategy() -> impl Strategy<Value = Filter> {
    let leaf = ("[a-z_]{1,12}", compare_op_strategy(), field_value_strategy())
        .prop_map(|(field, op, value)| Filter::compare(&field, op, value));
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Filter::and),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Filter::or),
            inner.prop_map(Filter::not),
        ]
    })
}

proptest! {
    #[test]
    fn prop_page_info_invariants(
        page in 0u32..10_000,
        limit in 0u32..10_000,
        total in 0u64..10_000_000,
    ) {
        let info = PageInfo::compute(page, limit, total);
        let limit64 = u64::from(info.limit);

        prop_assert!(info.page >= 1);
        prop_assert!(info.limit >= 1);
        prop_assert_eq!(info.pages, total.div_ceil(limit64));
        prop_assert_eq!(info.has_next, u64::from(info.page) * limit64 < total);
        prop_assert_eq!(info.has_prev, info.page > 1);
        // The pages cover the total with no gap and less than one page over.
        prop_assert!(info.pages * limit64 >= total);
        if info.pages > 0 {
            prop_assert!((info.pages - 1) * limit64 < total);
        }
    }

    #[test]
    fn prop_clamp_limit_stays_in_bounds(requested in proptest::option::of(0u32..1_000_000)) {
        let config = EngineConfig::default();
        let clamped = config.clamp_limit(requested);
        prop_assert!(clamped >= 1);
        prop_assert!(clamped <= config.max_page_limit);
        if requested.is_none() {
            prop_assert_eq!(clamped, config.default_page_limit);
        }
    }

    #[test]
    fn prop_filter_serde_round_trip(filter in filter_strategy()) {
        let json = serde_json::to_string(&filter).unwrap();
        let parsed: Filter = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(parsed, filter);
    }

    #[test]
    fn prop_field_value_compare_is_antisymmetric(
        a in field_value_strategy(),
        b in field_value_strategy(),
    ) {
        match (a.compare(&b), b.compare(&a)) {
            (Some(x), Some(y)) => prop_assert_eq!(x, y.reverse()),
            (None, None) => {}
            (x, y) => prop_assert!(false, "one-sided ordering: {:?} vs {:?}", x, y),
        }
    }

    #[test]
    fn prop_loose_eq_consistent_with_compare(
        a in field_value_strategy(),
        b in field_value_strategy(),
    ) {
        if a.loose_eq(&b) && !a.is_null() {
            prop_assert_eq!(a.compare(&b), Some(std::cmp::Ordering::Equal));
        }
    }
}
