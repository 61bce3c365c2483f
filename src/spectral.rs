// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dominant pure-state extraction.

use ndarray::Array1;
use num_complex::Complex64;
use serde::Serialize;

use crate::density::PhysicalDensityMatrix;
use crate::error::{Error, Result};
use crate::linalg;

/// Amplitudes at or below this have their phase reported as zero.
pub const DEFAULT_AMPLITUDE_THRESHOLD: f64 = 1e-9;

/// Dominant eigenpair of a density matrix in the computational basis.
#[derive(Debug, Clone, Serialize)]
pub struct SpectralDecomposition {
    /// Hilbert-space dimension.
    pub dimension: usize,
    /// Largest eigenvalue.
    pub dominant_eigenvalue: f64,
    /// Normalized eigenvector of the largest eigenvalue, with the global
    /// phase chosen so the largest component is real and positive.
    #[serde(skip)]
    pub state: Array1<Complex64>,
    /// |c_k|.
    pub amplitudes: Vec<f64>,
    /// arg(c_k) relative to the largest component.
    pub phases: Vec<f64>,
    /// All eigenvalues, descending.
    pub eigenvalues: Vec<f64>,
}

/// Decompose `rho` with the default amplitude threshold.
pub fn decompose(rho: &PhysicalDensityMatrix) -> Result<SpectralDecomposition> {
    decompose_with_threshold(rho, DEFAULT_AMPLITUDE_THRESHOLD)
}

/// Decompose `rho`, zeroing phases of components with |c_k| ≤ `threshold`.
pub fn decompose_with_threshold(
    rho: &PhysicalDensityMatrix,
    threshold: f64,
) -> Result<SpectralDecomposition> {
    let eig = linalg::eigh(rho.matrix())?;
    let n = eig.values.len();
    let top = n
        .checked_sub(1)
        .ok_or_else(|| Error::Numerical("empty density matrix".into()))?;

    let column = eig.vectors.column(top).to_owned();
    let norm = column.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt();
    if !norm.is_finite() || norm <= 0.0 {
        return Err(Error::Numerical(
            "dominant eigenvector could not be normalized".into(),
        ));
    }

    let amplitudes: Vec<f64> = column.iter().map(|z| z.norm() / norm).collect();
    let reference = amplitudes
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let rotation = Complex64::from_polar(1.0, -column[reference].arg());
    let state = column.mapv(|z| z * rotation / norm);

    let phases: Vec<f64> = state
        .iter()
        .zip(&amplitudes)
        .map(|(z, &a)| if a > threshold { z.arg() } else { 0.0 })
        .collect();

    let mut eigenvalues = eig.values.clone();
    eigenvalues.reverse();

    Ok(SpectralDecomposition {
        dimension: n,
        dominant_eigenvalue: eig.values[top],
        state,
        amplitudes,
        phases,
        eigenvalues,
    })
}
