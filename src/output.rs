//! Result sink: line-oriented CSV emission of distances and canopies.
//!
//! - distances: `idA,idB,distance`
//! - canopies: `canopyId,memberId`
//!
//! Distances are streamed: each computed batch is formatted and written as
//! soon as it is handed over, so only one group of batches is ever buffered.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::constants::{FIELD_DELIM, WRITE_BUF_SIZE};
use crate::error::{CanopyError, Result};
use crate::runner::{RunMode, RunOutput};
use crate::types::{Canopy, DistanceObservation};

/// File name used inside a results directory for distance output.
pub const DISTANCES_FILE_NAME: &str = "distances.csv";

/// File name used inside a results directory for canopy output.
pub const CANOPIES_FILE_NAME: &str = "canopies.csv";

/// Output format auto-detected from the output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain CSV (stdout, or any non-.gz path)
    Csv,
    /// Gzip-compressed CSV (.gz)
    CsvGz,
}

impl OutputFormat {
    /// Detect output format from file path.
    ///
    /// - `None` or `"-"` → CSV to stdout
    /// - `.gz` extension → gzip-compressed CSV
    /// - everything else → plain CSV
    pub fn detect(path: Option<&Path>) -> Self {
        let Some(p) = path else {
            return OutputFormat::Csv;
        };
        match p.extension().and_then(|e| e.to_str()) {
            Some("gz") => OutputFormat::CsvGz,
            _ => OutputFormat::Csv,
        }
    }

    /// Returns true if output goes to stdout (path is None or "-").
    pub fn is_stdout(path: Option<&Path>) -> bool {
        match path {
            None => true,
            Some(p) => p.as_os_str() == "-",
        }
    }
}

/// Where results go, resolved from the output path and results directory.
///
/// An explicit output path wins. Without one, a results directory receives a
/// mode-specific file. Without either, results go to stdout.
pub fn resolve_destination(
    output: Option<&Path>,
    results_dir: Option<&Path>,
    mode: &RunMode,
) -> Option<PathBuf> {
    if let Some(path) = output {
        return Some(path.to_path_buf());
    }
    let dir = results_dir?;
    let name = match mode {
        RunMode::Pairs(_) | RunMode::Sample(_) => DISTANCES_FILE_NAME,
        RunMode::Canopy(_) => CANOPIES_FILE_NAME,
    };
    Some(dir.join(name))
}

/// Writer supporting stdout, plain files and gzip files.
pub enum OutputWriter {
    Csv(BufWriter<Box<dyn Write + Send>>),
    /// Option so the encoder can be taken and finished explicitly.
    CsvGz(Option<BufWriter<GzEncoder<File>>>),
}

impl OutputWriter {
    /// Create a writer for `path` (None or "-" for stdout). Parent directories
    /// of a file path are created as needed.
    pub fn new(path: Option<&Path>) -> Result<Self> {
        if OutputFormat::is_stdout(path) {
            let out: Box<dyn Write + Send> = Box::new(io::stdout());
            return Ok(OutputWriter::Csv(BufWriter::with_capacity(WRITE_BUF_SIZE, out)));
        }
        let Some(path) = path else {
            return Err(CanopyError::config("missing output path"));
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CanopyError::io(parent, "create directory", e))?;
        }
        let file = File::create(path).map_err(|e| CanopyError::io(path, "create", e))?;

        match OutputFormat::detect(Some(path)) {
            OutputFormat::Csv => {
                let out: Box<dyn Write + Send> = Box::new(file);
                Ok(OutputWriter::Csv(BufWriter::with_capacity(WRITE_BUF_SIZE, out)))
            }
            OutputFormat::CsvGz => {
                let encoder = GzEncoder::new(file, Compression::default());
                Ok(OutputWriter::CsvGz(Some(BufWriter::with_capacity(
                    WRITE_BUF_SIZE,
                    encoder,
                ))))
            }
        }
    }

    /// Write a chunk of pre-formatted bytes.
    pub fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            OutputWriter::Csv(w) => w.write_all(data),
            OutputWriter::CsvGz(Some(w)) => w.write_all(data),
            OutputWriter::CsvGz(None) => Err(io::Error::new(
                io::ErrorKind::Other,
                "gzip writer already finished",
            )),
        }
    }

    /// Flush and finalize. Required for gzip output to be readable.
    pub fn finish(&mut self) -> io::Result<()> {
        match self {
            OutputWriter::Csv(w) => w.flush(),
            OutputWriter::CsvGz(slot) => {
                if let Some(w) = slot.take() {
                    let encoder = w.into_inner().map_err(|e| e.into_error())?;
                    encoder.finish()?;
                }
                Ok(())
            }
        }
    }
}

/// Format distance observations as `a,b,distance` lines.
pub fn format_distances(observations: &[DistanceObservation]) -> Vec<u8> {
    let mut out = Vec::with_capacity(observations.len() * 24);
    for o in observations {
        // Writing to a Vec cannot fail.
        let _ = writeln!(
            out,
            "{}{}{}{}{:.6}",
            o.a, FIELD_DELIM, o.b, FIELD_DELIM, o.distance
        );
    }
    out
}

/// Format canopies as `canopyId,memberId` lines, canopies in id order and
/// members ascending. Fringe records follow the members when requested.
pub fn format_canopies(canopies: &[Canopy], include_fringe: bool) -> Vec<u8> {
    let mut sorted: Vec<&Canopy> = canopies.iter().collect();
    sorted.sort_by_key(|c| c.id);

    let mut out = Vec::new();
    for canopy in sorted {
        for member in &canopy.members {
            let _ = writeln!(out, "{}{}{}", canopy.id, FIELD_DELIM, member);
        }
        if include_fringe {
            for member in &canopy.fringe {
                let _ = writeln!(out, "{}{}{}", canopy.id, FIELD_DELIM, member);
            }
        }
    }
    out
}

/// Incremental writer for distance observations.
///
/// Batches are written in the order they are handed over. `finish` must be
/// called to flush (and, for gzip, finalize) the output.
pub struct DistanceStream {
    writer: OutputWriter,
    label: PathBuf,
    written: usize,
}

impl DistanceStream {
    /// Open `path` (None or "-" for stdout) for distance output.
    pub fn create(path: Option<&Path>) -> Result<Self> {
        Ok(Self {
            writer: OutputWriter::new(path)?,
            label: path.map_or_else(|| PathBuf::from("-"), Path::to_path_buf),
            written: 0,
        })
    }

    /// Format and write one batch.
    pub fn write_batch(&mut self, batch: &[DistanceObservation]) -> Result<()> {
        self.writer
            .write_chunk(&format_distances(batch))
            .map_err(|e| CanopyError::io(&self.label, "write", e))?;
        self.written += batch.len();
        Ok(())
    }

    /// Flush and finalize. Returns the number of observations written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer
            .finish()
            .map_err(|e| CanopyError::io(&self.label, "finish", e))?;
        if self.label.as_os_str() != "-" {
            log::info!(
                "Wrote {} distances to {}",
                self.written,
                self.label.display()
            );
        }
        Ok(self.written)
    }
}

/// Write a run's output to `path` (None or "-" for stdout).
pub fn write_output(run_output: &RunOutput, path: Option<&Path>, include_fringe: bool) -> Result<()> {
    let label = path.map_or_else(|| PathBuf::from("-"), Path::to_path_buf);
    let mut writer = OutputWriter::new(path)?;
    let data = match run_output {
        RunOutput::Distances(obs) => format_distances(obs),
        RunOutput::Canopies(canopies) => format_canopies(canopies, include_fringe),
    };
    writer
        .write_chunk(&data)
        .map_err(|e| CanopyError::io(&label, "write", e))?;
    writer
        .finish()
        .map_err(|e| CanopyError::io(&label, "finish", e))?;
    if !OutputFormat::is_stdout(path) {
        log::info!("Wrote results to {}", label.display());
    }
    Ok(())
}
