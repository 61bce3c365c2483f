// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! WLS configuration and result types.

use std::fmt;

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::optimize::ConvergenceStatus;
use crate::density::{DensityOptions, PhysicalDensityMatrix};
use crate::error::Result;
use crate::validation;

/// How observed values are turned into target probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityNormalization {
    /// `LeadingBasis` for NoPOVM designs, `PerGroup` otherwise.
    #[default]
    Auto,
    /// Divide each measurement group by its own sum.
    PerGroup,
    /// Divide everything by the sum of the first d entries.
    LeadingBasis,
}

impl fmt::Display for ProbabilityNormalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbabilityNormalization::Auto => write!(f, "auto"),
            ProbabilityNormalization::PerGroup => write!(f, "per_group"),
            ProbabilityNormalization::LeadingBasis => write!(f, "leading_basis"),
        }
    }
}

/// Configuration for the weighted least-squares estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WlsConfig {
    /// L2 penalty λ on the Cholesky parameters.
    #[serde(default)]
    pub regularization: Option<f64>,

    /// Iteration limit of the optimizer.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Objective change treated as converged.
    #[serde(default = "default_ftol")]
    pub ftol: f64,

    /// Gradient infinity norm treated as converged.
    #[serde(default = "default_gtol")]
    pub gtol: f64,

    /// Probability normalization rule.
    #[serde(default)]
    pub normalization: ProbabilityNormalization,

    /// Physicality options for the returned density matrix.
    #[serde(skip)]
    pub density: DensityOptions,
}

impl Default for WlsConfig {
    fn default() -> Self {
        Self {
            regularization: None,
            max_iterations: default_max_iterations(),
            ftol: default_ftol(),
            gtol: default_gtol(),
            normalization: ProbabilityNormalization::Auto,
            density: DensityOptions::default(),
        }
    }
}

impl WlsConfig {
    /// Builder: set λ.
    pub fn with_regularization(mut self, lambda: f64) -> Self {
        self.regularization = Some(lambda);
        self
    }

    /// Builder: set the normalization rule.
    pub fn with_normalization(mut self, normalization: ProbabilityNormalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// Builder: set the iteration limit.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if let Some(lambda) = self.regularization {
            validation::require_non_negative("wls.regularization", lambda)?;
        }
        validation::require_iterations("wls.max_iterations", self.max_iterations)?;
        validation::require_positive("wls.ftol", self.ftol)?;
        validation::require_positive("wls.gtol", self.gtol)?;
        self.density.validate()
    }
}

fn default_max_iterations() -> usize {
    2000
}

fn default_ftol() -> f64 {
    1e-12
}

fn default_gtol() -> f64 {
    1e-10
}

/// Result of a WLS reconstruction.
#[derive(Debug, Clone)]
pub struct WlsResult {
    /// Physically constrained estimate.
    pub density: PhysicalDensityMatrix,
    /// L·L†/Tr at the optimum, before enforcement.
    pub raw_matrix: Array2<Complex64>,
    /// Target probabilities after normalization.
    pub normalized_probabilities: Vec<f64>,
    /// Model probabilities Tr(M_j ρ) at the optimum.
    pub expected_probabilities: Vec<f64>,
    /// Objective at the optimum.
    pub objective_value: f64,
    /// Objective at the warm start.
    pub initial_objective: f64,
    /// Cholesky parameters at the optimum.
    pub parameters: Vec<f64>,
    /// Optimizer status.
    pub status: ConvergenceStatus,
    /// Optimizer iterations.
    pub iterations: usize,
    /// Objective evaluations, including finite-difference evaluations.
    pub function_evaluations: usize,
}

impl WlsResult {
    /// Whether the optimizer reported convergence.
    pub fn success(&self) -> bool {
        self.status.is_success()
    }

    /// Numeric status code.
    pub fn status_code(&self) -> i32 {
        self.status.code()
    }

    /// Human-readable status.
    pub fn message(&self) -> &'static str {
        self.status.message()
    }
}
