// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cholesky parametrization of density matrices.
//!
//! A lower-triangular L with positive real diagonal maps to ρ = L·L†/Tr(L·L†),
//! which is a valid density matrix for every parameter vector. Parameters are
//! laid out row by row: log L_ii, then (Re, Im) of L_ij for j < i, giving
//! d² reals in total.

use ndarray::Array2;
use num_complex::Complex64;
use tracing::debug;

use crate::error::{ConfigurationError, Result};
use crate::linalg;

/// First diagonal load tried when the factorization fails.
pub const LOADING_START: f64 = 1e-12;

/// Growth of the diagonal load between attempts.
pub const LOADING_GROWTH: f64 = 10.0;

/// Loaded attempts before giving up.
pub const LOADING_ATTEMPTS: usize = 5;

/// Floor applied to the diagonal before taking the logarithm.
pub const DIAGONAL_FLOOR: f64 = 1e-18;

/// Number of real parameters for dimension d.
pub fn parameter_count(dimension: usize) -> usize {
    dimension * dimension
}

/// Lower Cholesky factor of the Hermitian part of `rho`, retrying with a
/// growing diagonal load when `rho` is only semidefinite.
pub fn factor(rho: &Array2<Complex64>) -> Result<Array2<Complex64>> {
    let h = linalg::hermitian_part(rho);
    if let Some(l) = linalg::cholesky_lower(&h) {
        return Ok(l);
    }

    let mut load = LOADING_START;
    for attempt in 1..=LOADING_ATTEMPTS {
        let mut loaded = h.clone();
        for i in 0..loaded.nrows() {
            loaded[[i, i]] += Complex64::new(load, 0.0);
        }
        if let Some(l) = linalg::cholesky_lower(&loaded) {
            debug!(attempt, load, "Cholesky succeeded with diagonal loading");
            return Ok(l);
        }
        load *= LOADING_GROWTH;
    }

    Err(ConfigurationError::CholeskyFailed {
        attempts: LOADING_ATTEMPTS,
    }
    .into())
}

/// Parameters of `rho`.
pub fn encode(rho: &Array2<Complex64>) -> Result<Vec<f64>> {
    let l = factor(rho)?;
    let d = l.nrows();
    let mut params = Vec::with_capacity(parameter_count(d));
    for i in 0..d {
        params.push(l[[i, i]].re.max(DIAGONAL_FLOOR).ln());
        for j in 0..i {
            params.push(l[[i, j]].re);
            params.push(l[[i, j]].im);
        }
    }
    Ok(params)
}

/// Lower-triangular factor described by `params`.
pub fn lower_factor(params: &[f64], dimension: usize) -> Array2<Complex64> {
    let mut l = Array2::zeros((dimension, dimension));
    let mut k = 0;
    for i in 0..dimension {
        l[[i, i]] = Complex64::new(params[k].exp(), 0.0);
        k += 1;
        for j in 0..i {
            l[[i, j]] = Complex64::new(params[k], params[k + 1]);
            k += 2;
        }
    }
    l
}

/// ρ = L·L†/Tr(L·L†).
///
/// `params` must hold [`parameter_count`] entries.
pub fn decode(params: &[f64], dimension: usize) -> Array2<Complex64> {
    let l = lower_factor(params, dimension);
    let rho = l.dot(&linalg::dagger(&l));
    let tr = linalg::trace(&rho).re;
    rho.mapv(|z| z / tr)
}
