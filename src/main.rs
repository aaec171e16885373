use anyhow::Result;
use clap::Parser;

use ncd_canopy::logging::init_logger;

mod commands;

use commands::{run_command, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    run_command(&cli)
}
