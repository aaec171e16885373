//! Argument parsing utilities for CLI flags.

/// Parse a distance threshold (`--t1`, `--t2`): a finite, non-negative number.
///
/// The ordering `t1 < t2` is checked later, once both values (and any config
/// file values) are known.
pub fn parse_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!(
            "threshold must be a finite, non-negative number, got {}",
            value
        ));
    }
    Ok(value)
}

/// Parse a sample size. 0 disables sample mode.
pub fn parse_sample_size(s: &str) -> Result<usize, String> {
    s.parse()
        .map_err(|_| format!("'{}' is not a valid non-negative integer", s))
}
