//! Canopy clustering over the record store's working pool.
//!
//! Each transition draws a pivot uniformly from the pool, measures every
//! other pool record against it in parallel, and then, as a single writer,
//! freezes the new canopy and removes the whole loose set from the pool.
//!
//! # Thresholds
//!
//! - `d < t1` (tight): the record becomes a member of the canopy.
//! - `d < t2` (loose): the record leaves the pool. Since `t1 < t2`, every
//!   tight member also leaves.
//!
//! Records with `t1 <= d < t2` leave the pool without joining the tight set;
//! they are kept on the canopy as its `fringe`.
//!
//! # Determinism
//!
//! The sweep buffers results per worker and merges them by set union into
//! ordered sets, and the removal batch is applied in id order. The outcome of
//! a transition therefore depends only on the pool state and the RNG, never on
//! the number of worker threads or their scheduling.

use rand::Rng;
use rayon::prelude::*;
use std::collections::BTreeSet;

use crate::constants::{DEFAULT_LOOSE_THRESHOLD, DEFAULT_TIGHT_THRESHOLD};
use crate::error::{CanopyError, Result};
use crate::oracle::NcdOracle;
use crate::store::RecordStore;
use crate::types::{Canopy, RecordId};

/// Tight (`t1`) and loose (`t2`) distance thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanopyParams {
    tight: f64,
    loose: f64,
}

impl Default for CanopyParams {
    fn default() -> Self {
        Self {
            tight: DEFAULT_TIGHT_THRESHOLD,
            loose: DEFAULT_LOOSE_THRESHOLD,
        }
    }
}

impl CanopyParams {
    /// Validate and build thresholds. Both must be finite and non-negative,
    /// and `tight < loose`.
    pub fn new(tight: f64, loose: f64) -> Result<Self> {
        for (name, value) in [("t1", tight), ("t2", loose)] {
            if !value.is_finite() || value < 0.0 {
                return Err(CanopyError::config(format!(
                    "{} must be a finite, non-negative number (got {})",
                    name, value
                )));
            }
        }
        if tight >= loose {
            return Err(CanopyError::config(format!(
                "tight threshold t1 ({}) must be smaller than loose threshold t2 ({})",
                tight, loose
            )));
        }
        Ok(Self { tight, loose })
    }

    pub fn tight(&self) -> f64 {
        self.tight
    }

    pub fn loose(&self) -> f64 {
        self.loose
    }
}

/// Per-worker sweep buffers, merged after the parallel region.
#[derive(Default)]
struct SweepPartial {
    tight: Vec<RecordId>,
    loose: Vec<RecordId>,
}

impl SweepPartial {
    fn merge(mut self, mut other: SweepPartial) -> SweepPartial {
        self.tight.append(&mut other.tight);
        self.loose.append(&mut other.loose);
        self
    }
}

/// Canopy clustering state machine.
#[derive(Debug)]
pub struct CanopyEngine {
    params: CanopyParams,
    next_canopy_id: u32,
    canopies: Vec<Canopy>,
}

impl CanopyEngine {
    pub fn new(params: CanopyParams) -> Self {
        Self {
            params,
            next_canopy_id: 0,
            canopies: Vec::new(),
        }
    }

    /// Canopies frozen so far, in creation order.
    pub fn canopies(&self) -> &[Canopy] {
        &self.canopies
    }

    /// Run one transition. Returns the frozen canopy, or `None` when the pool
    /// is already empty.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        store: &mut RecordStore,
        oracle: &NcdOracle,
        rng: &mut R,
    ) -> Result<Option<&Canopy>> {
        let Some(pivot) = store.pick_random(rng) else {
            return Ok(None);
        };

        let partial = self.sweep(store, oracle, pivot)?;

        let mut members: BTreeSet<RecordId> = partial.tight.into_iter().collect();
        members.insert(pivot);
        let loose: BTreeSet<RecordId> = partial.loose.into_iter().collect();
        let fringe: BTreeSet<RecordId> = loose.difference(&members).copied().collect();

        // Single writer: the sweep is over, drain the batch in id order.
        store.remove(pivot);
        for &id in &loose {
            store.remove(id);
        }

        let canopy = Canopy {
            id: self.next_canopy_id,
            pivot,
            members,
            fringe,
        };
        log::debug!(
            "Canopy {} (pivot {}): removed {} ({} members, {} fringe), {} left in pool",
            canopy.id,
            pivot,
            canopy.removed_count(),
            canopy.members.len(),
            canopy.fringe.len(),
            store.len()
        );
        self.next_canopy_id += 1;
        self.canopies.push(canopy);
        Ok(self.canopies.last())
    }

    /// Run transitions until the pool is empty and return the canopies.
    pub fn run<R: Rng + ?Sized>(
        mut self,
        store: &mut RecordStore,
        oracle: &NcdOracle,
        rng: &mut R,
    ) -> Result<Vec<Canopy>> {
        let initial = store.len();
        log::info!(
            "Canopy clustering {} records (t1={}, t2={})",
            initial,
            self.params.tight,
            self.params.loose
        );

        while self.step(store, oracle, rng)?.is_some() {
            let done = self.canopies.len();
            if done % 1000 == 0 {
                log::info!(
                    "{} canopies built, {}/{} records left in pool",
                    done,
                    store.len(),
                    initial
                );
            }
        }

        let fringe: usize = self.canopies.iter().map(|c| c.fringe.len()).sum();
        log::info!(
            "Built {} canopies ({} records in loose band only)",
            self.canopies.len(),
            fringe
        );
        Ok(self.canopies)
    }

    /// Measure every pool record except the pivot against the pivot.
    /// Read-only over the current pool snapshot.
    fn sweep(&self, store: &RecordStore, oracle: &NcdOracle, pivot: RecordId) -> Result<SweepPartial> {
        let pivot_record = store.require(pivot, "canopy pivot")?;
        let tight = self.params.tight;
        let loose = self.params.loose;

        store
            .live_slots()
            .par_iter()
            .map(|&slot| store.record_at(slot))
            .filter(|record| record.id() != pivot)
            .try_fold(SweepPartial::default, |mut acc, record| {
                let d = oracle.distance(record, pivot_record)?;
                if d < tight {
                    acc.tight.push(record.id());
                }
                if d < loose {
                    acc.loose.push(record.id());
                }
                Ok::<_, CanopyError>(acc)
            })
            .try_reduce(SweepPartial::default, |a, b| Ok(a.merge(b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn scenario_store() -> RecordStore {
        RecordStore::from_records(vec![
            (RecordId::new(1), "aaaa"),
            (RecordId::new(2), "aaaa"),
            (RecordId::new(3), "zzzzzzzzzz"),
        ])
        .unwrap()
    }

    /// Three well separated families of five near-identical sequences.
    fn family_store() -> RecordStore {
        let bases = [
            "ACGTTGCAAGCTTGCAGGCATGCAAGCTTGGCACTGGCCGTCGTTTTACAACGTCGTGACTGGG",
            "The quick brown fox jumps over the lazy dog while singing a tune.",
            "0192837465 5647382910 1029384756 6574839201 1357924680 24681357",
        ];
        let mut records = Vec::new();
        for (f, base) in bases.iter().enumerate() {
            for i in 0..5u32 {
                let id = RecordId::new(f as u32 * 100 + i);
                records.push((id, base.repeat(3)));
            }
        }
        RecordStore::from_records(records).unwrap()
    }

    fn run(store: &mut RecordStore, seed: u64) -> Vec<Canopy> {
        let mut rng = StdRng::seed_from_u64(seed);
        CanopyEngine::new(CanopyParams::default())
            .run(store, &NcdOracle::default(), &mut rng)
            .unwrap()
    }

    #[test]
    fn test_params_validation() {
        assert!(CanopyParams::new(0.25, 0.5).is_ok());
        assert!(CanopyParams::new(0.5, 0.25).is_err());
        assert!(CanopyParams::new(0.5, 0.5).is_err());
        assert!(CanopyParams::new(-0.1, 0.5).is_err());
        assert!(CanopyParams::new(0.1, f64::NAN).is_err());
        assert!(CanopyParams::new(0.1, f64::INFINITY).is_err());

        let err = CanopyParams::new(0.6, 0.3).unwrap_err();
        assert!(matches!(err, CanopyError::Config(_)));
    }

    #[test]
    fn test_default_params() {
        let params = CanopyParams::default();
        assert_eq!(params.tight(), 0.25);
        assert_eq!(params.loose(), 0.5);
    }

    #[test]
    fn test_identical_records_share_canopy() {
        for seed in 0..10 {
            let mut store = scenario_store();
            let canopies = run(&mut store, seed);
            assert!(store.is_empty());

            let with_one: Vec<_> = canopies
                .iter()
                .filter(|c| c.members.contains(&RecordId::new(1)))
                .collect();
            assert_eq!(with_one.len(), 1, "seed {}", seed);
            assert!(with_one[0].members.contains(&RecordId::new(2)), "seed {}", seed);
            assert!(!with_one[0].members.contains(&RecordId::new(3)), "seed {}", seed);
        }
    }

    #[test]
    fn test_canopy_ids_sequential_from_zero() {
        let mut store = family_store();
        let canopies = run(&mut store, 3);
        for (i, canopy) in canopies.iter().enumerate() {
            assert_eq!(canopy.id, i as u32);
            assert!(canopy.members.contains(&canopy.pivot));
        }
    }

    #[test]
    fn test_every_record_covered_exactly_once() {
        let mut store = family_store();
        let all: Vec<RecordId> = store.pool_ids();
        let canopies = run(&mut store, 11);

        let mut seen: HashMap<RecordId, usize> = HashMap::new();
        for canopy in &canopies {
            for id in canopy.members.iter().chain(canopy.fringe.iter()) {
                *seen.entry(*id).or_default() += 1;
            }
            assert!(canopy.members.is_disjoint(&canopy.fringe));
        }
        for id in all {
            assert_eq!(seen.get(&id), Some(&1), "record {} coverage", id);
        }
    }

    #[test]
    fn test_families_form_three_tight_canopies() {
        let mut store = family_store();
        let canopies = run(&mut store, 5);
        assert_eq!(canopies.len(), 3);
        for canopy in &canopies {
            assert_eq!(canopy.members.len(), 5);
            assert!(canopy.fringe.is_empty());
            let family = canopy.pivot.value() / 100;
            assert!(canopy.members.iter().all(|id| id.value() / 100 == family));
        }
    }

    #[test]
    fn test_threshold_consistency_at_freeze() {
        let oracle = NcdOracle::default();
        let params = CanopyParams::new(0.2, 0.6).unwrap();
        let mut store = family_store();
        let mut engine = CanopyEngine::new(params);
        let mut rng = StdRng::seed_from_u64(99);

        loop {
            let Some(canopy) = engine.step(&mut store, &oracle, &mut rng).unwrap() else {
                break;
            };
            let canopy = canopy.clone();
            let pivot = store.get(canopy.pivot).unwrap();
            for id in &canopy.members {
                if *id == canopy.pivot {
                    continue;
                }
                let d = oracle.distance(store.get(*id).unwrap(), pivot).unwrap();
                assert!(d < params.tight(), "member {} at {}", id, d);
            }
            for id in &canopy.fringe {
                let d = oracle.distance(store.get(*id).unwrap(), pivot).unwrap();
                assert!(d >= params.tight() && d < params.loose());
            }
            for remaining in store.iter() {
                let d = oracle.distance(remaining, pivot).unwrap();
                assert!(d >= params.loose(), "record {} left at {}", remaining.id(), d);
            }
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_same_seed_same_partition() {
        let mut first = family_store();
        let mut second = family_store();
        assert_eq!(run(&mut first, 1234), run(&mut second, 1234));
    }

    #[test]
    fn test_partition_independent_of_thread_count() {
        let single = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let many = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        let a = single.install(|| run(&mut family_store(), 77));
        let b = many.install(|| run(&mut family_store(), 77));
        assert_eq!(a, b);
    }

    #[test]
    fn test_step_on_empty_pool() {
        let mut store = RecordStore::new();
        let mut engine = CanopyEngine::new(CanopyParams::default());
        let mut rng = StdRng::seed_from_u64(0);
        assert!(engine
            .step(&mut store, &NcdOracle::default(), &mut rng)
            .unwrap()
            .is_none());
        assert!(engine.canopies().is_empty());
    }

    #[test]
    fn test_single_record_forms_singleton() {
        let mut store =
            RecordStore::from_records(vec![(RecordId::new(9), "GATTACA")]).unwrap();
        let canopies = run(&mut store, 0);
        assert_eq!(canopies.len(), 1);
        assert_eq!(canopies[0].pivot, RecordId::new(9));
        assert_eq!(canopies[0].members.len(), 1);
    }
}
