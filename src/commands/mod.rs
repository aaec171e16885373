//! Command-line interface definitions and handlers for the ncd-canopy CLI.

pub mod args;
pub mod helpers;
pub mod run;

pub use args::Cli;
pub use run::run_command;
