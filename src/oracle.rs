//! Compression oracle: compressed lengths and Normalized Compression Distance.
//!
//! All lengths are sizes of a raw DEFLATE stream (via `flate2`, no zlib or
//! gzip framing) at a single level fixed for the lifetime of the oracle.
//! Framing bytes are constant per stream and would pull short-sequence
//! distances towards zero, so they are left out.
//!
//! Mixing levels or codecs within one run makes distances incomparable; the
//! level is part of the oracle value and the runner uses one oracle per run.

use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{self, Write};

use crate::constants::{DEFAULT_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL};
use crate::error::{CanopyError, Result};
use crate::store::SequenceRecord;

/// Write sink that only counts bytes. The compressed stream is never stored.
#[derive(Default)]
struct ByteCounter {
    count: u64,
}

impl Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.count += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Deterministic compressed-length measurement and NCD.
#[derive(Debug, Clone, Copy)]
pub struct NcdOracle {
    level: Compression,
}

impl Default for NcdOracle {
    fn default() -> Self {
        Self {
            level: Compression::new(DEFAULT_COMPRESSION_LEVEL),
        }
    }
}

impl NcdOracle {
    /// Create an oracle compressing at `level` (0-9).
    pub fn new(level: u32) -> Result<Self> {
        if level > MAX_COMPRESSION_LEVEL {
            return Err(CanopyError::config(format!(
                "compression level must be between 0 and {} (got {})",
                MAX_COMPRESSION_LEVEL, level
            )));
        }
        Ok(Self {
            level: Compression::new(level),
        })
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }

    /// Compressed length of `buffer` in bytes.
    ///
    /// An empty buffer has compressed length 0 by definition; the encoder is
    /// not consulted, so the framing overhead never leaks into distances.
    pub fn compressed_length(&self, buffer: &[u8]) -> Result<u64> {
        self.compress_parts(&[buffer])
    }

    /// NCD between two records:
    /// `(C(a‖b) - min(C(a), C(b))) / max(C(a), C(b))`.
    ///
    /// Individual lengths are taken from the records' memo (computed on first
    /// use). The concatenation is always compressed with the lower id first so
    /// that `distance(a, b) == distance(b, a)` exactly.
    pub fn distance(&self, a: &SequenceRecord, b: &SequenceRecord) -> Result<f64> {
        let ca = a.ensure_compressed(self)?;
        let cb = b.ensure_compressed(self)?;

        let (lo, hi) = (ca.min(cb), ca.max(cb));
        if hi == 0 {
            return Ok(0.0);
        }

        let (first, second) = if a.id() <= b.id() { (a, b) } else { (b, a) };
        let cab = self.compress_parts(&[first.raw(), second.raw()])?;

        Ok((cab as f64 - lo as f64) / hi as f64)
    }

    /// Compressed length of the concatenation of `parts`, streamed through a
    /// single encoder.
    fn compress_parts(&self, parts: &[&[u8]]) -> Result<u64> {
        if parts.iter().all(|p| p.is_empty()) {
            return Ok(0);
        }

        let mut encoder = DeflateEncoder::new(ByteCounter::default(), self.level);
        for part in parts {
            encoder
                .write_all(part)
                .map_err(|e| CanopyError::compression(format!("deflate write failed: {}", e)))?;
        }
        let counter = encoder
            .finish()
            .map_err(|e| CanopyError::compression(format!("deflate finish failed: {}", e)))?;
        Ok(counter.count)
    }
}
