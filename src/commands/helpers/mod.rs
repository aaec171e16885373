//! Helper functions and utilities for the ncd-canopy CLI.
//!
//! - `arg_parsing` - CLI argument parsing utilities

mod arg_parsing;

pub use arg_parsing::{parse_sample_size, parse_threshold};
