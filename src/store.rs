//! In-memory record store.
//!
//! Records live in an index-addressable `Vec`; an id→slot map gives keyed
//! access. Each record carries its own once-settable compressed length, so the
//! parallel pre-pass writes only to the slot it owns and needs no shared lock.
//!
//! The store also acts as the working pool of canopy clustering: a separate
//! list of live slots shrinks as records are consumed into canopies. Removed
//! records stay in place (lookups and memoized lengths remain valid), they are
//! just no longer part of the pool.

use rand::Rng;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{CanopyError, Result};
use crate::oracle::NcdOracle;
use crate::types::RecordId;

/// A single sequence and its memoized compressed length.
#[derive(Debug)]
pub struct SequenceRecord {
    id: RecordId,
    raw: Vec<u8>,
    compressed_len: OnceLock<u64>,
}

impl SequenceRecord {
    pub fn new(id: RecordId, raw: Vec<u8>) -> Self {
        Self {
            id,
            raw,
            compressed_len: OnceLock::new(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Memoized compressed length, if it has been computed.
    pub fn compressed_len(&self) -> Option<u64> {
        self.compressed_len.get().copied()
    }

    /// Compute and memoize the compressed length if unset.
    ///
    /// Safe to call concurrently: if two threads race, both compute the same
    /// deterministic value and the first write wins.
    pub fn ensure_compressed(&self, oracle: &NcdOracle) -> Result<u64> {
        if let Some(&len) = self.compressed_len.get() {
            return Ok(len);
        }
        let len = oracle.compressed_length(&self.raw)?;
        Ok(*self.compressed_len.get_or_init(|| len))
    }
}

/// Mapping from `RecordId` to `SequenceRecord`, with a drainable pool view.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<SequenceRecord>,
    slots: HashMap<RecordId, usize>,
    /// Slots still in the working pool.
    live: Vec<usize>,
    /// For each slot, its position in `live` (None once removed).
    live_pos: Vec<Option<usize>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a record file (`id,sequence` per line, optionally gzipped).
    pub fn load(path: &Path) -> Result<Self> {
        crate::input::read_records(path)
    }

    /// Build a store from `(id, sequence)` pairs. Duplicate ids are rejected.
    pub fn from_records<I, S>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (RecordId, S)>,
        S: Into<Vec<u8>>,
    {
        let mut store = Self::new();
        for (id, seq) in records {
            store.insert(id, seq.into())?;
        }
        Ok(store)
    }

    /// Add a record. The new record joins the working pool.
    pub fn insert(&mut self, id: RecordId, raw: Vec<u8>) -> Result<()> {
        if self.slots.contains_key(&id) {
            return Err(CanopyError::duplicate_record(id));
        }
        let slot = self.records.len();
        self.records.push(SequenceRecord::new(id, raw));
        self.slots.insert(id, slot);
        self.live_pos.push(Some(self.live.len()));
        self.live.push(slot);
        Ok(())
    }

    /// Look up any loaded record, whether or not it is still in the pool.
    pub fn get(&self, id: RecordId) -> Option<&SequenceRecord> {
        self.slots.get(&id).map(|&slot| &self.records[slot])
    }

    /// Look up a record or fail with a reference error.
    pub fn require(&self, id: RecordId, context: &str) -> Result<&SequenceRecord> {
        self.get(id)
            .ok_or_else(|| CanopyError::unknown_record(id, context))
    }

    /// Whether the record is loaded and still in the working pool.
    pub fn contains(&self, id: RecordId) -> bool {
        self.slots
            .get(&id)
            .is_some_and(|&slot| self.live_pos[slot].is_some())
    }

    /// Number of records in the working pool.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of records loaded, including those drained from the pool.
    pub fn total_len(&self) -> usize {
        self.records.len()
    }

    /// Remove a record from the working pool. Returns false if it was not in
    /// the pool (unknown id or already removed).
    pub fn remove(&mut self, id: RecordId) -> bool {
        let Some(&slot) = self.slots.get(&id) else {
            return false;
        };
        let Some(pos) = self.live_pos[slot].take() else {
            return false;
        };
        self.live.swap_remove(pos);
        if let Some(&moved) = self.live.get(pos) {
            self.live_pos[moved] = Some(pos);
        }
        true
    }

    /// Draw a record uniformly from the working pool.
    pub fn pick_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<RecordId> {
        if self.live.is_empty() {
            return None;
        }
        let pos = rng.gen_range(0..self.live.len());
        Some(self.records[self.live[pos]].id)
    }

    /// Ids in the working pool, in pool order.
    pub fn pool_ids(&self) -> Vec<RecordId> {
        self.live.iter().map(|&slot| self.records[slot].id).collect()
    }

    /// Records in the working pool, in pool order.
    pub fn iter(&self) -> impl Iterator<Item = &SequenceRecord> + '_ {
        self.live.iter().map(move |&slot| &self.records[slot])
    }

    /// Slots in the working pool. Used for the parallel sweep.
    pub(crate) fn live_slots(&self) -> &[usize] {
        &self.live
    }

    pub(crate) fn record_at(&self, slot: usize) -> &SequenceRecord {
        &self.records[slot]
    }

    /// Every loaded record, in load order.
    pub fn records(&self) -> &[SequenceRecord] {
        &self.records
    }

    /// Compute and memoize the compressed length of one record.
    pub fn ensure_compressed(&self, id: RecordId, oracle: &NcdOracle) -> Result<u64> {
        self.require(id, "compressed length lookup")?
            .ensure_compressed(oracle)
    }

    /// Memoize compressed lengths of every loaded record in parallel.
    ///
    /// Each worker touches only the memo cells of the records it was handed.
    pub fn precompute(&self, oracle: &NcdOracle) -> Result<()> {
        self.records
            .par_iter()
            .try_for_each(|record| record.ensure_compressed(oracle).map(|_| ()))
    }
}
