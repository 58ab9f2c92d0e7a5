use crate::btr::{check_depth, mask, BinaryState};
use crate::error::StrategyError;
use core_types::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Depths up to this value use a preallocated dense table.
pub const DENSE_MAX_DEPTH: usize = 16;

/// Decay-weighted outcome counts for one state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StateCounts {
    pub up_count: f64,
    pub down_count: f64,
}

impl StateCounts {
    pub fn observations(&self) -> f64 {
        self.up_count + self.down_count
    }

    pub fn up_probability(&self) -> f64 {
        let total = self.observations();
        if total > 0.0 { self.up_count / total } else { 0.0 }
    }

    pub fn down_probability(&self) -> f64 {
        let total = self.observations();
        if total > 0.0 { self.down_count / total } else { 0.0 }
    }

    fn scale(&mut self, rate: f64) {
        self.up_count *= rate;
        self.down_count *= rate;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

/// A read view of one table entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePrediction {
    pub state: u64,
    pub depth: usize,
    pub up_count: f64,
    pub down_count: f64,
    pub observations: f64,
    pub up_probability: f64,
    pub down_probability: f64,
    pub direction: Direction,
    /// `|up_probability - down_probability|`
    pub confidence: f64,
}

impl StatePrediction {
    fn from_counts(state: u64, depth: usize, counts: StateCounts) -> Self {
        let up_probability = counts.up_probability();
        let down_probability = counts.down_probability();
        let direction = if up_probability > down_probability {
            Direction::Up
        } else if down_probability > up_probability {
            Direction::Down
        } else {
            Direction::Neutral
        };
        Self {
            state,
            depth,
            up_count: counts.up_count,
            down_count: counts.down_count,
            observations: counts.observations(),
            up_probability,
            down_probability,
            direction,
            confidence: (up_probability - down_probability).abs(),
        }
    }

    pub fn binary_state(&self) -> Option<BinaryState> {
        BinaryState::from_decimal(self.state, self.depth).ok()
    }
}

/// Ordering key for `PredictionTable::top_states`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBy {
    Observations,
    Confidence,
    UpProbability,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableStatistics {
    pub depth: usize,
    pub unique_states: usize,
    pub total_possible_states: u128,
    /// `unique_states / total_possible_states`
    pub coverage: f64,
    pub total_observations: f64,
    pub avg_observations_per_state: f64,
    pub decay_cycles: u64,
}

/// Plain serializable form of a table, keyed by state decimal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub depth: usize,
    pub entries: BTreeMap<u64, StateCounts>,
}

#[derive(Debug, Clone)]
enum Store {
    Dense(Vec<StateCounts>),
    Sparse(HashMap<u64, StateCounts>),
}

impl Store {
    fn with_depth(depth: usize) -> Self {
        if depth <= DENSE_MAX_DEPTH {
            Store::Dense(vec![StateCounts::default(); 1usize << depth])
        } else {
            Store::Sparse(HashMap::new())
        }
    }

    fn get(&self, key: u64) -> Option<&StateCounts> {
        match self {
            Store::Dense(v) => v.get(key as usize).filter(|c| c.observations() > 0.0),
            Store::Sparse(m) => m.get(&key),
        }
    }

    fn entry(&mut self, key: u64) -> &mut StateCounts {
        match self {
            Store::Dense(v) => &mut v[key as usize],
            Store::Sparse(m) => m.entry(key).or_default(),
        }
    }

    /// Only states that have been observed at least once.
    fn iter(&self) -> Box<dyn Iterator<Item = (u64, StateCounts)> + '_> {
        match self {
            Store::Dense(v) => Box::new(
                v.iter()
                    .enumerate()
                    .filter(|(_, c)| c.observations() > 0.0)
                    .map(|(k, c)| (k as u64, *c)),
            ),
            Store::Sparse(m) => Box::new(m.iter().map(|(k, c)| (*k, *c))),
        }
    }

    fn for_each_mut(&mut self, mut f: impl FnMut(&mut StateCounts)) {
        match self {
            Store::Dense(v) => v.iter_mut().for_each(&mut f),
            Store::Sparse(m) => m.values_mut().for_each(&mut f),
        }
    }
}

/// Learned `P(next move is up | state)` for every state of a fixed depth.
#[derive(Debug, Clone)]
pub struct PredictionTable {
    depth: usize,
    store: Store,
    decay_cycles: u64,
}

impl PredictionTable {
    pub fn new(depth: usize) -> Result<Self, CoreError> {
        check_depth(depth)?;
        Ok(Self {
            depth,
            store: Store::with_depth(depth),
            decay_cycles: 0,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    fn accepts(&self, state: &BinaryState, op: &str) -> bool {
        if state.depth() == self.depth {
            return true;
        }
        tracing::warn!(
            table_depth = self.depth,
            state_depth = state.depth(),
            "Ignoring {op} for state {state} with mismatched depth"
        );
        false
    }

    /// Records that `next_move_up` followed `state`. Returns `false` when the state
    /// was rejected for having the wrong depth.
    pub fn observe(&mut self, state: &BinaryState, next_move_up: bool) -> bool {
        if !self.accepts(state, "observe") {
            return false;
        }
        let counts = self.store.entry(state.to_decimal());
        if next_move_up {
            counts.up_count += 1.0;
        } else {
            counts.down_count += 1.0;
        }
        true
    }

    /// `None` when the state is unseen, has the wrong depth, or has fewer than
    /// `min_observations` (decay-weighted) observations.
    pub fn predict(&self, state: &BinaryState, min_observations: u32) -> Option<StatePrediction> {
        if !self.accepts(state, "predict") {
            return None;
        }
        let counts = *self.store.get(state.to_decimal())?;
        if counts.observations() <= 0.0 || counts.observations() < f64::from(min_observations) {
            return None;
        }
        Some(StatePrediction::from_counts(state.to_decimal(), self.depth, counts))
    }

    pub fn counts(&self, state: &BinaryState) -> Option<StateCounts> {
        if state.depth() != self.depth {
            return None;
        }
        self.store.get(state.to_decimal()).copied()
    }

    /// Scales every entry by `rate`. `rate` must lie in `(0, 1]`; 1 is a no-op.
    pub fn apply_decay(&mut self, rate: f64) -> Result<(), CoreError> {
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(CoreError::configuration(
                "decay_rate",
                format!("must be within (0, 1], got {rate}"),
            ));
        }
        if rate < 1.0 {
            self.store.for_each_mut(|c| c.scale(rate));
            self.decay_cycles += 1;
            tracing::debug!(rate, states = self.len(), "Applied decay to prediction table");
        }
        Ok(())
    }

    /// Number of states observed at least once.
    pub fn len(&self) -> usize {
        self.store.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.store = Store::with_depth(self.depth);
        self.decay_cycles = 0;
    }

    pub fn all_predictions(&self, min_observations: u32) -> Vec<StatePrediction> {
        let mut out: Vec<_> = self
            .store
            .iter()
            .filter(|(_, c)| c.observations() >= f64::from(min_observations))
            .map(|(k, c)| StatePrediction::from_counts(k, self.depth, c))
            .collect();
        out.sort_by_key(|p| p.state);
        out
    }

    /// The `n` best states by `by`, descending; ties keep increasing state order.
    pub fn top_states(&self, n: usize, by: RankBy, min_observations: u32) -> Vec<StatePrediction> {
        let mut preds = self.all_predictions(min_observations);
        let key = |p: &StatePrediction| match by {
            RankBy::Observations => p.observations,
            RankBy::Confidence => p.confidence,
            RankBy::UpProbability => p.up_probability,
        };
        preds.sort_by(|a, b| key(b).total_cmp(&key(a)));
        preds.truncate(n);
        preds
    }

    pub fn statistics(&self) -> TableStatistics {
        let unique_states = self.len();
        let total_observations: f64 = self.store.iter().map(|(_, c)| c.observations()).sum();
        let total_possible_states = BinaryState::total_states(self.depth);
        TableStatistics {
            depth: self.depth,
            unique_states,
            total_possible_states,
            coverage: unique_states as f64 / total_possible_states as f64,
            total_observations,
            avg_observations_per_state: if unique_states > 0 {
                total_observations / unique_states as f64
            } else {
                0.0
            },
            decay_cycles: self.decay_cycles,
        }
    }

    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            depth: self.depth,
            entries: self.store.iter().collect(),
        }
    }

    pub fn from_snapshot(snapshot: TableSnapshot) -> Result<Self, CoreError> {
        let mut table = Self::new(snapshot.depth)?;
        for (key, counts) in snapshot.entries {
            if key & !mask(table.depth) != 0 {
                return Err(CoreError::input(
                    "snapshot.entries",
                    format!("state {key} does not fit depth {}", table.depth),
                ));
            }
            let valid = |x: f64| x.is_finite() && x >= 0.0;
            if !valid(counts.up_count) || !valid(counts.down_count) {
                return Err(CoreError::input(
                    "snapshot.entries",
                    format!("state {key} has invalid counts {counts:?}"),
                ));
            }
            *table.store.entry(key) = counts;
        }
        Ok(table)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), StrategyError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &self.snapshot())?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<Self, StrategyError> {
        let file = std::fs::File::open(path)?;
        let snapshot: TableSnapshot = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(Self::from_snapshot(snapshot)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn state(s: &str) -> BinaryState {
        BinaryState::from_binary_str(s).unwrap()
    }

    #[test]
    fn unseen_state_has_no_prediction() {
        let table = PredictionTable::new(4).unwrap();
        assert!(table.predict(&state("0101"), 1).is_none());
    }

    #[test]
    fn min_observations_gates_predictions() {
        let mut table = PredictionTable::new(4).unwrap();
        let s = state("0101");
        table.observe(&s, true);
        table.observe(&s, true);
        assert!(table.predict(&s, 3).is_none());
        table.observe(&s, false);
        let p = table.predict(&s, 3).unwrap();
        assert_eq!(p.observations, 3.0);
        assert_eq!(p.direction, Direction::Up);
        assert_relative_eq!(p.confidence, 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn balanced_counts_are_neutral() {
        let mut table = PredictionTable::new(2).unwrap();
        let s = state("10");
        table.observe(&s, true);
        table.observe(&s, false);
        let p = table.predict(&s, 1).unwrap();
        assert_eq!(p.direction, Direction::Neutral);
        assert_eq!(p.confidence, 0.0);
    }

    #[test]
    fn mismatched_depth_is_ignored() {
        let mut table = PredictionTable::new(4).unwrap();
        assert!(!table.observe(&state("010"), true));
        assert!(table.is_empty());
        assert!(table.predict(&state("010"), 0).is_none());
    }

    #[test]
    fn decay_scales_counts_but_not_ratios() {
        for depth_state in ["0110", "01101100101011001"] {
            let mut table = PredictionTable::new(depth_state.len()).unwrap();
            let s = state(depth_state);
            for up in [true, true, true, false] {
                table.observe(&s, up);
            }
            let before = table.predict(&s, 1).unwrap();
            table.apply_decay(0.95).unwrap();
            let after = table.predict(&s, 1).unwrap();
            assert_relative_eq!(after.up_count, before.up_count * 0.95, epsilon = 1e-12);
            assert_relative_eq!(after.down_count, before.down_count * 0.95, epsilon = 1e-12);
            assert_relative_eq!(after.up_probability, before.up_probability, epsilon = 1e-12);
            assert_eq!(table.statistics().decay_cycles, 1);
        }
    }

    #[test]
    fn decay_rate_outside_unit_interval_is_rejected() {
        let mut table = PredictionTable::new(3).unwrap();
        assert!(table.apply_decay(0.0).is_err());
        assert!(table.apply_decay(1.2).is_err());
        table.apply_decay(1.0).unwrap();
        assert_eq!(table.statistics().decay_cycles, 0);
    }

    #[test]
    fn dense_and_sparse_stores_agree() {
        let mut dense = PredictionTable::new(DENSE_MAX_DEPTH).unwrap();
        let mut sparse = PredictionTable::new(DENSE_MAX_DEPTH + 1).unwrap();
        let d = BinaryState::from_decimal(77, DENSE_MAX_DEPTH).unwrap();
        let s = BinaryState::from_decimal(77, DENSE_MAX_DEPTH + 1).unwrap();
        for up in [true, false, false] {
            dense.observe(&d, up);
            sparse.observe(&s, up);
        }
        let pd = dense.predict(&d, 1).unwrap();
        let ps = sparse.predict(&s, 1).unwrap();
        assert_eq!(pd.up_count, ps.up_count);
        assert_eq!(pd.direction, ps.direction);
        assert_eq!(dense.len(), 1);
        assert_eq!(sparse.len(), 1);
    }

    #[test]
    fn top_states_rank_descending() {
        let mut table = PredictionTable::new(3).unwrap();
        for _ in 0..5 {
            table.observe(&state("000"), true);
        }
        for _ in 0..3 {
            table.observe(&state("111"), false);
        }
        table.observe(&state("010"), true);
        table.observe(&state("010"), false);

        let top = table.top_states(2, RankBy::Observations, 1);
        assert_eq!(top.iter().map(|p| p.state).collect::<Vec<_>>(), vec![0, 7]);

        let stats = table.statistics();
        assert_eq!(stats.unique_states, 3);
        assert_eq!(stats.total_possible_states, 8);
        assert_relative_eq!(stats.coverage, 3.0 / 8.0);
        assert_relative_eq!(stats.avg_observations_per_state, 10.0 / 3.0);
    }

    #[test]
    fn snapshot_restores_counts() {
        let mut table = PredictionTable::new(5).unwrap();
        table.observe(&state("10101"), true);
        table.observe(&state("10101"), true);
        table.observe(&state("00001"), false);
        table.apply_decay(0.99).unwrap();

        let json = serde_json::to_string(&table.snapshot()).unwrap();
        let restored = PredictionTable::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored.snapshot(), table.snapshot());
    }

    #[test]
    fn snapshot_with_foreign_state_is_rejected() {
        let mut entries = BTreeMap::new();
        entries.insert(8, StateCounts { up_count: 1.0, down_count: 0.0 });
        let err = PredictionTable::from_snapshot(TableSnapshot { depth: 3, entries }).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(..)));
    }
}
