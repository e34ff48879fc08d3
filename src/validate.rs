/// Parameter validation helpers
/// Every engine re-checks its inputs here before the first random draw

use crate::error::{SimError, SimResult};

pub fn positive(field: &'static str, value: f64) -> SimResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid(field, "must be a number > 0"))
    }
}

pub fn non_negative(field: &'static str, value: f64) -> SimResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid(field, "must be a number >= 0"))
    }
}

pub fn probability(field: &'static str, value: f64) -> SimResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::invalid(field, "must be a probability in [0, 1]"))
    }
}

pub fn count(field: &'static str, value: usize) -> SimResult<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(SimError::invalid(field, "must be an integer > 0"))
    }
}

pub fn at_most(field: &'static str, value: usize, limit: usize) -> SimResult<()> {
    if value <= limit {
        Ok(())
    } else {
        Err(SimError::invalid(field, format!("must be <= {limit}")))
    }
}

/// Strictly increasing break points, e.g. `a < b < c`
pub fn increasing(field: &'static str, points: &[f64]) -> SimResult<()> {
    if points.iter().any(|p| !p.is_finite()) {
        return Err(SimError::invalid(field, "must be finite numbers"));
    }
    if points.windows(2).all(|w| w[0] < w[1]) {
        Ok(())
    } else {
        Err(SimError::invalid(field, "must be strictly increasing"))
    }
}

pub fn range_u32(field: &'static str, min: u32, max: u32) -> SimResult<()> {
    if min <= max {
        Ok(())
    } else {
        Err(SimError::invalid(field, format!("minimum {min} exceeds maximum {max}")))
    }
}
