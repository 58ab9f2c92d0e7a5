//! Property tests for state encoding and the prediction table.

use approx::assert_relative_eq;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashSet;
use strategies::{create_all_states, BinaryState, Direction, PredictionTable, StateEncoder};

#[test]
fn create_all_states_enumerates_every_value_once() {
    for depth in 2..=16 {
        let states: Vec<BinaryState> = create_all_states(depth).unwrap().collect();
        assert_eq!(states.len() as u128, 1u128 << depth);
        let distinct: HashSet<u64> = states.iter().map(BinaryState::to_decimal).collect();
        assert_eq!(distinct.len(), states.len());
        for (i, state) in states.iter().enumerate() {
            assert_eq!(state.to_decimal(), i as u64);
            assert_eq!(state.depth(), depth);
            assert_eq!(state.sequence().len(), depth);
        }
    }
}

#[test]
fn create_all_states_is_lazy_for_large_depths() {
    for depth in [17, 32, 63, 64] {
        let mut states = create_all_states(depth).unwrap();
        assert_eq!(states.total(), 1u128 << depth);
        assert_eq!(states.next().unwrap().to_decimal(), 0);
        assert_eq!(states.next().unwrap().to_decimal(), 1);
        assert_eq!(states.remaining(), (1u128 << depth) - 2);
    }
}

#[test]
fn alternating_ticks_converge_to_high_confidence() {
    let mut encoder = StateEncoder::new(4).unwrap();
    let mut table = PredictionTable::new(4).unwrap();
    let mut price = Decimal::from(1000);

    for i in 0..600 {
        price += if i % 2 == 0 { Decimal::ONE } else { Decimal::NEGATIVE_ONE };
        let before = encoder.get_state();
        if let Some(is_up) = encoder.process_price(price) {
            if let Some(state) = before {
                table.observe(&state, is_up);
            }
        }
        if i % 100 == 99 {
            table.apply_decay(0.999).unwrap();
        }
    }

    let current = encoder.get_state().unwrap();
    let prediction = table.predict(&current, 10).unwrap();
    assert!(prediction.confidence > 0.9, "confidence {}", prediction.confidence);
    // the alternation continues in the opposite direction of the latest move
    let expected = if current.latest() { Direction::Down } else { Direction::Up };
    assert_eq!(prediction.direction, expected);
}

#[test]
fn table_survives_a_json_file_round_trip() {
    let mut table = PredictionTable::new(20).unwrap();
    let s = BinaryState::from_decimal(123_456, 20).unwrap();
    table.observe(&s, true);
    table.observe(&s, false);
    table.observe(&s, true);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.json");
    table.save_json(&path).unwrap();
    let restored = PredictionTable::load_json(&path).unwrap();
    assert_eq!(restored.depth(), 20);
    assert_relative_eq!(restored.predict(&s, 3).unwrap().up_probability, 2.0 / 3.0);
}

proptest! {
    #[test]
    fn decimal_round_trip(depth in 2usize..=64, raw in any::<u64>()) {
        let value = if depth == 64 { raw } else { raw % (1u64 << depth) };
        let state = BinaryState::from_decimal(value, depth).unwrap();
        prop_assert_eq!(state.to_decimal(), value);
        let reparsed = BinaryState::from_binary_str(&state.to_string()).unwrap();
        prop_assert_eq!(reparsed, state);
        prop_assert_eq!(BinaryState::from_sequence(&state.sequence()).unwrap(), state);
    }

    #[test]
    fn predict_respects_min_observations(
        outcomes in proptest::collection::vec(any::<bool>(), 0..40),
        k in 1u32..30,
    ) {
        let mut table = PredictionTable::new(6).unwrap();
        let state = BinaryState::from_decimal(42, 6).unwrap();
        for up in &outcomes {
            table.observe(&state, *up);
        }
        match table.predict(&state, k) {
            None => prop_assert!((outcomes.len() as u32) < k),
            Some(p) => {
                prop_assert!(p.observations >= f64::from(k));
                prop_assert!((p.up_probability + p.down_probability - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn decay_multiplies_every_entry(rate in 0.01f64..1.0, ups in 1u32..20, downs in 0u32..20) {
        let mut table = PredictionTable::new(3).unwrap();
        let state = BinaryState::from_decimal(5, 3).unwrap();
        for _ in 0..ups { table.observe(&state, true); }
        for _ in 0..downs { table.observe(&state, false); }
        let before = table.counts(&state).unwrap();
        table.apply_decay(rate).unwrap();
        let after = table.counts(&state).unwrap();
        prop_assert!((after.up_count - before.up_count * rate).abs() < 1e-9);
        prop_assert!((after.down_count - before.down_count * rate).abs() < 1e-9);
        prop_assert!((after.up_probability() - before.up_probability()).abs() < 1e-9);
    }
}
