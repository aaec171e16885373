//! Parallel distance runner.
//!
//! Three mutually exclusive modes:
//! - **Pairs**: distances for an explicit list of id pairs.
//! - **Sample**: all pairwise distances within a uniform random sample.
//! - **Canopy**: canopy clustering of the whole store (default).
//!
//! Pair work is cut into fixed-size batches. Each batch is computed by one
//! worker into its own buffer and the buffers are handed on in batch order,
//! so output order is reproducible regardless of scheduling. The `*_with`
//! forms stream batches to a sink as they complete.

use rand::seq::index;
use rand::Rng;
use rayon::prelude::*;

use crate::canopy::{CanopyEngine, CanopyParams};
use crate::constants::PAIR_BATCH_SIZE;
use crate::error::{CanopyError, Result};
use crate::input::IdPair;
use crate::oracle::NcdOracle;
use crate::store::RecordStore;
use crate::types::{Canopy, DistanceObservation, RecordId};

/// Which computation to run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunMode {
    /// Distances for each listed pair.
    Pairs(Vec<IdPair>),
    /// All pairwise distances within a sample of this many records.
    Sample(usize),
    /// Canopy clustering with the given thresholds.
    Canopy(CanopyParams),
}

impl RunMode {
    pub fn name(&self) -> &'static str {
        match self {
            RunMode::Pairs(_) => "pairs",
            RunMode::Sample(_) => "sample",
            RunMode::Canopy(_) => "canopy",
        }
    }
}

/// Result of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutput {
    Distances(Vec<DistanceObservation>),
    Canopies(Vec<Canopy>),
}

/// Dispatch one mode against a loaded store.
pub fn run<R: Rng + ?Sized>(
    mode: RunMode,
    store: &mut RecordStore,
    oracle: &NcdOracle,
    rng: &mut R,
) -> Result<RunOutput> {
    log::info!(
        "Running {} mode over {} records (compression level {})",
        mode.name(),
        store.total_len(),
        oracle.level()
    );
    match mode {
        RunMode::Pairs(pairs) => pair_distances(store, oracle, &pairs).map(RunOutput::Distances),
        RunMode::Sample(k) => sample_distances(store, oracle, k, rng).map(RunOutput::Distances),
        RunMode::Canopy(params) => {
            precompute_lengths(store, oracle)?;
            CanopyEngine::new(params)
                .run(store, oracle, rng)
                .map(RunOutput::Canopies)
        }
    }
}

/// Memoize compressed lengths for every record, in parallel.
pub fn precompute_lengths(store: &RecordStore, oracle: &NcdOracle) -> Result<()> {
    log::info!(
        "Computing compressed lengths for {} records",
        store.total_len()
    );
    store.precompute(oracle)
}

/// Check that every id referenced by `pairs` is loaded.
///
/// Fails on the first missing id, naming its 1-based pair index.
pub fn validate_pairs(store: &RecordStore, pairs: &[IdPair]) -> Result<()> {
    for (i, &(a, b)) in pairs.iter().enumerate() {
        for id in [a, b] {
            if store.get(id).is_none() {
                return Err(CanopyError::unknown_record(
                    id,
                    format!("referenced by pair {} ({},{})", i + 1, a, b),
                ));
            }
        }
    }
    Ok(())
}

/// Distances for an explicit list of pairs, in input order.
///
/// Every id is checked against the store before any work starts; a missing id
/// aborts the run.
pub fn pair_distances(
    store: &RecordStore,
    oracle: &NcdOracle,
    pairs: &[IdPair],
) -> Result<Vec<DistanceObservation>> {
    let mut observations = Vec::with_capacity(pairs.len());
    pair_distances_with(store, oracle, pairs, |batch| {
        observations.extend_from_slice(batch);
        Ok(())
    })?;
    Ok(observations)
}

/// Streaming form of [`pair_distances`]: each finished batch is handed to
/// `sink` in input order. Returns the number of observations emitted.
pub fn pair_distances_with<F>(
    store: &RecordStore,
    oracle: &NcdOracle,
    pairs: &[IdPair],
    sink: F,
) -> Result<usize>
where
    F: FnMut(&[DistanceObservation]) -> Result<()>,
{
    validate_pairs(store, pairs)?;

    for &(a, b) in pairs {
        store.ensure_compressed(a, oracle)?;
        store.ensure_compressed(b, oracle)?;
    }

    stream_batches(store, oracle, pairs.iter().copied(), sink)
}

/// Draw `k` distinct ids uniformly without replacement, in draw order.
///
/// `k` larger than the store is clamped to the store size.
pub fn draw_sample<R: Rng + ?Sized>(store: &RecordStore, k: usize, rng: &mut R) -> Vec<RecordId> {
    let ids = store.pool_ids();
    let k = if k > ids.len() {
        log::warn!(
            "Sample size {} exceeds record count {}, using all records",
            k,
            ids.len()
        );
        ids.len()
    } else {
        k
    };
    index::sample(rng, ids.len(), k)
        .into_iter()
        .map(|i| ids[i])
        .collect()
}

/// All `k*(k-1)/2` distances within a random sample of `k` records.
pub fn sample_distances<R: Rng + ?Sized>(
    store: &RecordStore,
    oracle: &NcdOracle,
    k: usize,
    rng: &mut R,
) -> Result<Vec<DistanceObservation>> {
    let mut observations = Vec::new();
    sample_distances_with(store, oracle, k, rng, |batch| {
        observations.extend_from_slice(batch);
        Ok(())
    })?;
    Ok(observations)
}

/// Streaming form of [`sample_distances`]. Pairs are generated row by row as
/// batches are consumed, never materialised as a whole.
pub fn sample_distances_with<R, F>(
    store: &RecordStore,
    oracle: &NcdOracle,
    k: usize,
    rng: &mut R,
    sink: F,
) -> Result<usize>
where
    R: Rng + ?Sized,
    F: FnMut(&[DistanceObservation]) -> Result<()>,
{
    let sample = draw_sample(store, k, rng);
    log::info!(
        "Drew sample of {} records ({} pairs)",
        sample.len(),
        sample.len() * sample.len().saturating_sub(1) / 2
    );

    sample
        .par_iter()
        .try_for_each(|&id| store.ensure_compressed(id, oracle).map(|_| ()))?;

    stream_batches(store, oracle, sample_pairs(&sample), sink)
}

/// Every `(sample[i], sample[j])` with `i < j`, row by row.
fn sample_pairs(sample: &[RecordId]) -> impl Iterator<Item = IdPair> + '_ {
    sample
        .iter()
        .enumerate()
        .flat_map(move |(i, &a)| sample[i + 1..].iter().map(move |&b| (a, b)))
}

/// Compute pairs in parallel batches of `PAIR_BATCH_SIZE`.
///
/// Pairs are pulled one group (a batch per worker) at a time. Each batch is
/// computed by one worker into its own buffer; once the group is done the
/// buffers go to `sink` in batch order and are dropped.
fn stream_batches<I, F>(
    store: &RecordStore,
    oracle: &NcdOracle,
    mut pairs: I,
    mut sink: F,
) -> Result<usize>
where
    I: Iterator<Item = IdPair>,
    F: FnMut(&[DistanceObservation]) -> Result<()>,
{
    let group_len = PAIR_BATCH_SIZE * rayon::current_num_threads().max(1);
    let mut group: Vec<IdPair> = Vec::with_capacity(group_len);
    let mut emitted = 0;
    let mut batches = 0;

    loop {
        group.clear();
        group.extend(pairs.by_ref().take(group_len));
        if group.is_empty() {
            break;
        }

        let computed: Vec<Vec<DistanceObservation>> = group
            .par_chunks(PAIR_BATCH_SIZE)
            .map(|batch| compute_batch(store, oracle, batch))
            .collect::<Result<Vec<_>>>()?;

        for batch in &computed {
            sink(batch)?;
            emitted += batch.len();
            batches += 1;
        }
    }

    log::debug!("Computed {} distances in {} batches", emitted, batches);
    Ok(emitted)
}

fn compute_batch(
    store: &RecordStore,
    oracle: &NcdOracle,
    batch: &[IdPair],
) -> Result<Vec<DistanceObservation>> {
    batch
        .iter()
        .map(|&(a, b)| -> Result<DistanceObservation> {
            let ra = store.require(a, "distance pair")?;
            let rb = store.require(b, "distance pair")?;
            Ok(DistanceObservation {
                a,
                b,
                distance: oracle.distance(ra, rb)?,
            })
        })
        .collect()
}
