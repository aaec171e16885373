//! Canopy clustering of byte sequences with Normalized Compression Distance.
//!
//! The library is organised leaves first:
//!
//! - [`oracle`]: compressed lengths (raw DEFLATE) and NCD.
//! - [`store`]: index-addressable record store with memoized compressed
//!   lengths; doubles as the working pool during clustering.
//! - [`canopy`]: the canopy clustering engine.
//! - [`runner`]: parallel pre-pass and the pairs / sample / canopy modes.
//! - [`input`], [`output`], [`config`]: file loading, result emission and run
//!   configuration.
//!
//! ```
//! use ncd_canopy::{run, CanopyParams, NcdOracle, RecordId, RecordStore, RunMode, RunOutput};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut store = RecordStore::from_records(vec![
//!     (RecordId::new(1), "aaaa"),
//!     (RecordId::new(2), "aaaa"),
//!     (RecordId::new(3), "zzzzzzzzzz"),
//! ])
//! .unwrap();
//! let mut rng = StdRng::seed_from_u64(42);
//! let output = run(
//!     RunMode::Canopy(CanopyParams::default()),
//!     &mut store,
//!     &NcdOracle::default(),
//!     &mut rng,
//! )
//! .unwrap();
//! assert!(matches!(output, RunOutput::Canopies(_)));
//! ```

pub mod canopy;
pub mod config;
pub mod constants;
pub mod error;
pub mod input;
pub mod logging;
pub mod oracle;
pub mod output;
pub mod runner;
pub mod store;
pub mod types;

pub use canopy::{CanopyEngine, CanopyParams};
pub use error::{CanopyError, Result};
pub use input::{read_pairs, read_records, IdPair};
pub use oracle::NcdOracle;
pub use output::{write_output, DistanceStream, OutputFormat, OutputWriter};
pub use runner::{
    draw_sample, pair_distances, pair_distances_with, precompute_lengths, run, sample_distances,
    sample_distances_with, RunMode, RunOutput,
};
pub use store::{RecordStore, SequenceRecord};
pub use types::{Canopy, DistanceObservation, RecordId};
