//! Core types used throughout the ncd-canopy library.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Unique record identifier.
///
/// A plain value type: equality, ordering and hashing come from the wrapped
/// integer. Identical ids are the same id, no interning table is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(u32);

impl RecordId {
    pub const fn new(value: u32) -> Self {
        RecordId(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for RecordId {
    fn from(value: u32) -> Self {
        RecordId(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>().map(RecordId)
    }
}

/// One NCD measurement between two records.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceObservation {
    pub a: RecordId,
    pub b: RecordId,
    /// Nominally in [0, 1]; small or dissimilar inputs may exceed 1 slightly.
    pub distance: f64,
}

/// A frozen canopy.
#[derive(Debug, Clone, PartialEq)]
pub struct Canopy {
    /// 0-based, assigned in creation order.
    pub id: u32,
    /// The record this canopy was built around.
    pub pivot: RecordId,
    /// Tight members (distance to pivot < t1), pivot included.
    pub members: BTreeSet<RecordId>,
    /// Records removed from the pool by this canopy (distance < t2) that did
    /// not make the tight set.
    pub fringe: BTreeSet<RecordId>,
}

impl Canopy {
    /// Number of records this canopy took out of the working pool.
    pub fn removed_count(&self) -> usize {
        self.members.len() + self.fringe.len()
    }
}
