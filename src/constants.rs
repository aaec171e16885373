//! Constants used throughout the ncd-canopy library: run defaults, batching,
//! and I/O tuning.

// ============================================================================
// Canopy Defaults
// ============================================================================

/// Default tight threshold (t1). Records closer than this join the canopy.
pub const DEFAULT_TIGHT_THRESHOLD: f64 = 0.25;

/// Default loose threshold (t2). Records closer than this leave the pool.
pub const DEFAULT_LOOSE_THRESHOLD: f64 = 0.5;

// ============================================================================
// Compression
// ============================================================================

/// Default DEFLATE compression level (best compression).
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 9;

/// Highest DEFLATE level accepted by `flate2`.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

// ============================================================================
// Batch Processing
// ============================================================================

/// Pairs per batch in explicit-pairs and sample modes. Each batch buffers its
/// observations and is flushed as a unit, in batch order.
pub(crate) const PAIR_BATCH_SIZE: usize = 4096;

// ============================================================================
// I/O Buffer Sizes
// ============================================================================

/// Buffer size for reading record and pairs files (1MB).
pub(crate) const READ_BUF_SIZE: usize = 1024 * 1024;

/// Buffer size for writing result files (1MB).
pub(crate) const WRITE_BUF_SIZE: usize = 1024 * 1024;

// ============================================================================
// Delimiters
// ============================================================================

/// Field separator for input and output lines.
pub const FIELD_DELIM: char = ',';
