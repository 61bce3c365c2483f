// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Linear inversion.
//!
//! Solves M·x = p in the least-squares sense, where row j of M is the
//! row-major flattening of operator M_j and p holds the observed
//! probabilities normalized per measurement group. The raw matrix is
//! conj(reshape(x)); physicality is then enforced according to the
//! configured [`DensityOptions`].
//!
//! With a Tikhonov parameter λ the normal equations
//! (M†M + λI)·x = M†p are solved instead.

use std::sync::Arc;

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::density::{self, DensityOptions, PhysicalDensityMatrix};
use crate::design::MeasurementDesign;
use crate::error::Result;
use crate::linalg;
use crate::validation;

/// Linear inversion configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinearConfig {
    /// Tikhonov parameter λ ≥ 0; `None` solves the plain least-squares
    /// problem.
    #[serde(default)]
    pub regularization: Option<f64>,

    /// Physicality options for the returned density matrix.
    #[serde(skip)]
    pub density: DensityOptions,
}

impl LinearConfig {
    /// Builder: set λ.
    pub fn with_regularization(mut self, lambda: f64) -> Self {
        self.regularization = Some(lambda);
        self
    }

    /// Builder: set density options.
    pub fn with_density(mut self, density: DensityOptions) -> Self {
        self.density = density;
        self
    }

    /// Validate parameter values.
    pub fn validate(&self) -> Result<()> {
        if let Some(lambda) = self.regularization {
            validation::require_non_negative("linear.regularization", lambda)?;
        }
        self.density.validate()
    }
}

/// Output of a linear reconstruction.
#[derive(Debug, Clone)]
pub struct LinearResult {
    /// Physically constrained estimate.
    pub density: PhysicalDensityMatrix,
    /// conj(reshape(x)) before any enforcement.
    pub raw_matrix: Array2<Complex64>,
    /// Probabilities after per-group normalization.
    pub normalized_probabilities: Vec<f64>,
    /// p − M·x.
    pub residuals: Array1<Complex64>,
    /// ‖p − M·x‖₂.
    pub residual_norm: f64,
    /// Numerical rank of the measurement matrix.
    pub rank: usize,
    /// Singular values of the measurement matrix, descending.
    pub singular_values: Vec<f64>,
}

/// Linear-inversion estimator bound to one measurement design.
#[derive(Debug, Clone)]
pub struct LinearEstimator {
    design: Arc<MeasurementDesign>,
    config: LinearConfig,
}

impl LinearEstimator {
    /// Create an estimator.
    pub fn new(design: Arc<MeasurementDesign>, config: LinearConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { design, config })
    }

    /// The bound design.
    pub fn design(&self) -> &MeasurementDesign {
        &self.design
    }

    /// Shared handle to the bound design.
    pub fn design_handle(&self) -> Arc<MeasurementDesign> {
        Arc::clone(&self.design)
    }

    /// Active configuration.
    pub fn config(&self) -> &LinearConfig {
        &self.config
    }

    /// Reconstruct ρ from observed counts or probabilities.
    pub fn reconstruct(&self, observed: &[f64]) -> Result<LinearResult> {
        let design = self.design.as_ref();
        let d = design.dimension();
        validation::validate_observed(observed, design.operator_count())?;
        debug!(
            dimension = d,
            design = %design.spec().name(),
            regularized = self.config.regularization.is_some(),
            "Starting linear reconstruction"
        );

        let probabilities = design.normalize_per_group(observed, self.config.density.tolerance)?;
        let m = design.measurement_matrix();
        let p = Array1::from_iter(probabilities.iter().map(|&v| Complex64::new(v, 0.0)));

        let (x, rank, singular_values) = match self.config.regularization {
            None => {
                let ls = linalg::lstsq(m, &p)?;
                (ls.solution, ls.rank, ls.singular_values)
            }
            Some(lambda) => {
                let x = solve_regularized(m, &p, lambda)?;
                let singular_values = linalg::singular_values(m)?;
                let rank = linalg::numerical_rank(&singular_values, m.nrows(), m.ncols());
                (x, rank, singular_values)
            }
        };

        let residuals = &p - &m.dot(&x);
        let residual_norm = residuals.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt();
        let raw_matrix = density::reshape_conjugate(&x, d)?;
        let density = PhysicalDensityMatrix::new(raw_matrix.clone(), self.config.density)?;

        info!(
            dimension = d,
            rank,
            residual_norm,
            "Linear reconstruction complete"
        );

        Ok(LinearResult {
            density,
            raw_matrix,
            normalized_probabilities: probabilities,
            residuals,
            residual_norm,
            rank,
            singular_values,
        })
    }
}

/// Solve (M†M + λI)·x = M†p.
fn solve_regularized(
    m: &Array2<Complex64>,
    p: &Array1<Complex64>,
    lambda: f64,
) -> Result<Array1<Complex64>> {
    let m_dag = linalg::dagger(m);
    let mut gram = m_dag.dot(m);
    for i in 0..gram.nrows() {
        gram[[i, i]] += Complex64::new(lambda, 0.0);
    }
    linalg::solve(&gram, &m_dag.dot(p))
}
