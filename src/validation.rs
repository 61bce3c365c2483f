// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Input validation for reconstruction requests and estimator parameters.

use crate::error::{ConfigurationError, Error, Result};

/// Validate an observed probability or count vector.
///
/// The vector must have `expected_len` entries, all finite.
pub fn validate_observed(observed: &[f64], expected_len: usize) -> Result<()> {
    if observed.len() != expected_len {
        return Err(Error::length_mismatch(expected_len, observed.len()));
    }

    for (i, val) in observed.iter().enumerate() {
        if val.is_nan() {
            return Err(
                ConfigurationError::invalid("observed", format!("contains NaN at index {}", i))
                    .into(),
            );
        }
        if val.is_infinite() {
            return Err(
                ConfigurationError::invalid("observed", format!("contains Inf at index {}", i))
                    .into(),
            );
        }
    }

    Ok(())
}

/// Validate observed counts: finite and non-negative.
pub fn validate_counts(observed: &[f64], expected_len: usize) -> Result<()> {
    validate_observed(observed, expected_len)?;
    if let Some((i, val)) = observed.iter().enumerate().find(|(_, v)| **v < 0.0) {
        return Err(ConfigurationError::invalid(
            "observed",
            format!("negative entry {} at index {}", val, i),
        )
        .into());
    }
    Ok(())
}

/// Require a finite, strictly positive parameter.
pub fn require_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        let message = format!("must be finite and > 0, got {}", value);
        return Err(ConfigurationError::invalid(name, message).into());
    }
    Ok(())
}

/// Require a finite, non-negative parameter.
pub fn require_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        let message = format!("must be finite and >= 0, got {}", value);
        return Err(ConfigurationError::invalid(name, message).into());
    }
    Ok(())
}

/// Require a value in (0, 1].
pub fn require_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value <= 1.0) {
        let message = format!("must lie in (0, 1], got {}", value);
        return Err(ConfigurationError::invalid(name, message).into());
    }
    Ok(())
}

/// Require a non-zero iteration budget.
pub fn require_iterations(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(ConfigurationError::invalid(name, "must be greater than 0").into());
    }
    Ok(())
}
