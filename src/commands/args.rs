//! Command-line argument definitions for the ncd-canopy CLI.

use clap::Parser;
use std::path::PathBuf;

use ncd_canopy::config::RunOverrides;

use super::helpers::{parse_sample_size, parse_threshold};

#[derive(Parser, Debug)]
#[command(name = "ncd-canopy", version)]
#[command(about = "Canopy clustering of sequences using Normalized Compression Distance")]
#[command(
    long_about = "ncd-canopy: cluster byte sequences by Normalized Compression Distance (NCD).

NCD(a, b) = (C(ab) - min(C(a), C(b))) / max(C(a), C(b)), where C is the length
of the raw DEFLATE stream. Values near 0 mean near-identical content; values
near or slightly above 1 mean unrelated content.

MODES (mutually exclusive):
  canopy (default)   Repeatedly pick a random pivot; records closer than t1 join
                     its canopy, records closer than t2 leave the pool.
  --pairs FILE       Distances for each 'idA,idB' line in FILE.
  --sample N         All pairwise distances within N randomly drawn records.

INPUT FORMAT:
  One record per line: id,sequence (id is a non-negative integer, unique).
  Blank lines are ignored. Files ending in .gz are decompressed.

OUTPUT FORMAT:
  canopy mode:       canopyId,memberId
  pairs/sample:      idA,idB,distance
  Written to --output, else <results-dir>/canopies.csv or distances.csv,
  else stdout. Output paths ending in .gz are gzip-compressed."
)]
#[command(after_help = "EXAMPLES:
  # Canopy clustering with default thresholds
  ncd-canopy -s records.csv

  # Tighter canopies, reproducible run, results in a directory
  ncd-canopy -s records.csv --t1 0.15 --t2 0.4 --seed 42 -r results

  # Distances for explicit pairs
  ncd-canopy -s records.csv -p pairs.csv -o distances.csv

  # Distance distribution over a random sample of 500 records
  ncd-canopy -s records.csv --sample 500 --seed 7

  # Run from a TOML configuration file, overriding one value
  ncd-canopy -c run.toml --t2 0.6")]
pub struct Cli {
    /// Enable verbose progress output with timestamps
    #[arg(short, long)]
    pub verbose: bool,

    /// TOML run configuration. Command-line flags override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Record file: one 'id,sequence' per line
    #[arg(short, long)]
    pub sequence: Option<PathBuf>,

    /// Pairs file: one 'idA,idB' per line. Selects explicit-pairs mode.
    #[arg(short, long)]
    pub pairs: Option<PathBuf>,

    /// Number of records to sample for all-pairs distances. 0 disables.
    #[arg(long, value_parser = parse_sample_size)]
    pub sample: Option<usize>,

    /// Tight threshold: records closer than this to the pivot join its canopy
    /// (default 0.25). Must be smaller than t2.
    #[arg(long, value_parser = parse_threshold)]
    pub t1: Option<f64>,

    /// Loose threshold: records closer than this to the pivot leave the pool
    /// (default 0.5).
    #[arg(long, value_parser = parse_threshold)]
    pub t2: Option<f64>,

    /// Random seed for pivot and sample draws. Random (and logged) if omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads (0 = one per CPU)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// DEFLATE compression level (0-9, default 9)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=9))]
    pub level: Option<u32>,

    /// Directory for result files when --output is not given
    #[arg(short, long)]
    pub results_dir: Option<PathBuf>,

    /// Output file ('-' for stdout, .gz for gzip)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also list loose-band records (t1 <= d < t2) under the canopy that
    /// removed them
    #[arg(long)]
    pub include_fringe: bool,
}

impl Cli {
    /// Values given on the command line, for merging with a config file.
    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            sequence: self.sequence.clone(),
            pairs: self.pairs.clone(),
            sample: self.sample,
            t1: self.t1,
            t2: self.t2,
            seed: self.seed,
            threads: self.threads,
            level: self.level,
            results_dir: self.results_dir.clone(),
            output: self.output.clone(),
            include_fringe: self.include_fringe,
        }
    }
}
