//! Run command handler: configuration, loading, dispatch and output.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Instant;

use ncd_canopy::config::{parse_config, RunConfig};
use ncd_canopy::output::{resolve_destination, DistanceStream};
use ncd_canopy::runner::validate_pairs;
use ncd_canopy::{
    pair_distances_with, precompute_lengths, read_pairs, sample_distances_with, write_output,
    CanopyEngine, NcdOracle, RecordStore, RunMode, RunOutput,
};

use super::args::Cli;

/// Resolve the run configuration from the config file (if any) and CLI flags.
pub fn resolve_config(cli: &Cli) -> Result<RunConfig> {
    let overrides = cli.overrides();
    match &cli.config {
        Some(path) => {
            let file = parse_config(path)?;
            let base = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            RunConfig::resolve(Some((file, base.as_path())), overrides)
        }
        None => RunConfig::resolve(None, overrides),
    }
}

/// Size the global rayon pool. 0 keeps rayon's default (one thread per CPU).
fn configure_threads(threads: usize) -> Result<()> {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure worker thread pool")?;
    }
    log::info!("Using {} worker threads", rayon::current_num_threads());
    Ok(())
}

/// Run one invocation end to end.
pub fn run_command(cli: &Cli) -> Result<()> {
    let t_start = Instant::now();
    let config = resolve_config(cli)?;
    log::info!("{}", config);

    configure_threads(config.threads)?;
    let oracle = NcdOracle::new(config.level)?;

    let seed = config.seed.unwrap_or_else(rand::random);
    log::info!("Random seed: {}", seed);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut store = RecordStore::load(&config.sequence).with_context(|| {
        format!(
            "Failed to load records from {}",
            config.sequence.display()
        )
    })?;

    let mode = match &config.pairs {
        Some(path) => RunMode::Pairs(
            read_pairs(path)
                .with_context(|| format!("Failed to load pairs from {}", path.display()))?,
        ),
        None if config.sample > 0 => RunMode::Sample(config.sample),
        None => RunMode::Canopy(config.params),
    };
    log::info!(
        "Running {} mode over {} records (compression level {})",
        mode.name(),
        store.total_len(),
        oracle.level()
    );

    let destination = resolve_destination(
        config.output.as_deref(),
        config.results_dir.as_deref(),
        &mode,
    );

    match mode {
        RunMode::Pairs(pairs) => {
            // Reject unknown ids before the output file is created.
            validate_pairs(&store, &pairs)?;
            let mut stream = DistanceStream::create(destination.as_deref())?;
            pair_distances_with(&store, &oracle, &pairs, |batch| stream.write_batch(batch))?;
            let written = stream.finish()?;
            log::info!("Computed {} distances", written);
        }
        RunMode::Sample(k) => {
            let mut stream = DistanceStream::create(destination.as_deref())?;
            sample_distances_with(&store, &oracle, k, &mut rng, |batch| {
                stream.write_batch(batch)
            })?;
            let written = stream.finish()?;
            log::info!("Computed {} distances", written);
        }
        RunMode::Canopy(params) => {
            precompute_lengths(&store, &oracle)?;
            let canopies = CanopyEngine::new(params).run(&mut store, &oracle, &mut rng)?;
            log::info!("Produced {} canopies", canopies.len());
            write_output(
                &RunOutput::Canopies(canopies),
                destination.as_deref(),
                config.include_fringe,
            )?;
        }
    }

    log::info!("Done in {:.2?}", t_start.elapsed());
    Ok(())
}
