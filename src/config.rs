//! Run configuration: optional TOML file merged with command-line overrides.
//!
//! Precedence is CLI flag > config file > built-in default. Relative paths in
//! the file resolve against the file's own directory.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::canopy::CanopyParams;
use crate::constants::{
    DEFAULT_COMPRESSION_LEVEL, DEFAULT_LOOSE_THRESHOLD, DEFAULT_TIGHT_THRESHOLD,
    MAX_COMPRESSION_LEVEL,
};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub canopy: CanopySettings,
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSettings {
    pub sequence: Option<PathBuf>,
    pub pairs: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanopySettings {
    pub t1: Option<f64>,
    pub t2: Option<f64>,
    pub sample: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSettings {
    pub threads: Option<usize>,
    pub level: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSettings {
    pub results_dir: Option<PathBuf>,
    pub path: Option<PathBuf>,
    pub include_fringe: Option<bool>,
}

/// Values supplied on the command line. `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct RunOverrides {
    pub sequence: Option<PathBuf>,
    pub pairs: Option<PathBuf>,
    pub sample: Option<usize>,
    pub t1: Option<f64>,
    pub t2: Option<f64>,
    pub seed: Option<u64>,
    pub threads: Option<usize>,
    pub level: Option<u32>,
    pub results_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub include_fringe: bool,
}

/// Fully resolved and validated run configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub sequence: PathBuf,
    pub pairs: Option<PathBuf>,
    /// 0 = sample mode disabled.
    pub sample: usize,
    pub params: CanopyParams,
    pub seed: Option<u64>,
    /// 0 = rayon default.
    pub threads: usize,
    pub level: u32,
    pub results_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub include_fringe: bool,
}

pub fn parse_config(path: &Path) -> Result<ConfigFile> {
    let contents = fs::read_to_string(path)
        .context(format!("Failed to read config file: {}", path.display()))?;

    let config: ConfigFile = toml::from_str(&contents).context("Failed to parse TOML config")?;

    Ok(config)
}

pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

impl RunConfig {
    /// Merge an optional config file (with the directory its relative paths
    /// resolve against) and CLI overrides, then validate.
    pub fn resolve(file: Option<(ConfigFile, &Path)>, cli: RunOverrides) -> Result<Self> {
        let (file, base) = match file {
            Some((cfg, base)) => (cfg, Some(base)),
            None => (ConfigFile::default(), None),
        };
        let rebase = |p: PathBuf| match base {
            Some(b) => resolve_path(b, &p),
            None => p,
        };

        let sequence = cli
            .sequence
            .or_else(|| file.input.sequence.map(rebase))
            .ok_or_else(|| anyhow!("A sequence file is required (--sequence or [input].sequence)"))?;

        // Mode keys come from one source as a unit: `--pairs` or `--sample`
        // on the command line replace both file settings.
        let (pairs, sample, source) = if cli.pairs.is_some() || cli.sample.is_some() {
            (cli.pairs, cli.sample.unwrap_or(0), "command line")
        } else {
            (
                file.input.pairs.map(rebase),
                file.canopy.sample.unwrap_or(0),
                "config file",
            )
        };

        if pairs.is_some() && sample > 0 {
            return Err(anyhow!(
                "Pairs file and sample size are mutually exclusive; choose one mode ({})",
                source
            ));
        }

        let t1 = cli.t1.or(file.canopy.t1).unwrap_or(DEFAULT_TIGHT_THRESHOLD);
        let t2 = cli.t2.or(file.canopy.t2).unwrap_or(DEFAULT_LOOSE_THRESHOLD);
        let params = CanopyParams::new(t1, t2)?;

        let level = cli
            .level
            .or(file.runtime.level)
            .unwrap_or(DEFAULT_COMPRESSION_LEVEL);
        if level > MAX_COMPRESSION_LEVEL {
            return Err(anyhow!(
                "Compression level must be between 0 and {} (got {})",
                MAX_COMPRESSION_LEVEL,
                level
            ));
        }

        Ok(RunConfig {
            sequence,
            pairs,
            sample,
            params,
            seed: cli.seed.or(file.canopy.seed),
            threads: cli.threads.or(file.runtime.threads).unwrap_or(0),
            level,
            results_dir: cli.results_dir.or_else(|| file.output.results_dir.map(rebase)),
            output: cli.output.or_else(|| file.output.path.map(rebase)),
            include_fringe: cli.include_fringe || file.output.include_fringe.unwrap_or(false),
        })
    }
}

fn show(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map_or_else(String::new, |p| p.display().to_string())
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Parameters")?;
        writeln!(f, "  Sequence file:     {}", self.sequence.display())?;
        writeln!(f, "  Results directory: {}", show(&self.results_dir))?;
        writeln!(f, "  Output:            {}", show(&self.output))?;
        writeln!(f, "  Pairs:             {}", show(&self.pairs))?;
        writeln!(f, "  T1 (tight):        {}", self.params.tight())?;
        writeln!(f, "  T2 (loose):        {}", self.params.loose())?;
        writeln!(f, "  Sample:            {}", self.sample)?;
        writeln!(f, "  Threads:           {}", self.threads)?;
        writeln!(f, "  Level:             {}", self.level)?;
        write!(f, "  Include fringe:    {}", self.include_fringe)
    }
}
