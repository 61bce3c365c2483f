// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Weighted least-squares reconstruction.
//!
//! Minimizes
//!
//!   Σ_j (p_j − q_j(θ))² / √(max(p_j, 0) + 1) + λ‖θ‖²
//!
//! over the Cholesky parameters θ, where q_j(θ) = Tr(M_j ρ(θ)) and
//! ρ(θ) = L·L†/Tr(L·L†). Every iterate is a valid density matrix, so no
//! projection is needed after the optimizer stops.
//!
//! The optimizer is warm-started from the linear-inversion estimate on the
//! same design, projected onto the density matrices so it has a Cholesky
//! factor, falling back to I/d when that estimate cannot be formed.

pub mod cholesky;
pub mod optimize;
pub mod types;

use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex64;
use tracing::{debug, info, warn};

pub use optimize::{Bfgs, BfgsOptions, ConvergenceStatus, OptimizationReport};
pub use types::{ProbabilityNormalization, WlsConfig, WlsResult};

use crate::density::{DensityOptions, EnforceMode, PhysicalDensityMatrix};
use crate::design::{DesignKind, MeasurementDesign};
use crate::error::{Error, Result};
use crate::linalg;
use crate::linear::{LinearConfig, LinearEstimator};
use crate::validation;

/// WLS estimator bound to one measurement design.
#[derive(Debug, Clone)]
pub struct WlsEstimator {
    design: Arc<MeasurementDesign>,
    config: WlsConfig,
}

impl WlsEstimator {
    /// Create an estimator.
    pub fn new(design: Arc<MeasurementDesign>, config: WlsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { design, config })
    }

    /// The bound design.
    pub fn design(&self) -> &MeasurementDesign {
        &self.design
    }

    /// Active configuration.
    pub fn config(&self) -> &WlsConfig {
        &self.config
    }

    /// Normalization rule after resolving `Auto` against the design.
    pub fn normalization(&self) -> ProbabilityNormalization {
        match self.config.normalization {
            ProbabilityNormalization::Auto => match self.design.kind() {
                DesignKind::NoPovm => ProbabilityNormalization::LeadingBasis,
                _ => ProbabilityNormalization::PerGroup,
            },
            other => other,
        }
    }

    /// Target probabilities for `observed`.
    pub fn normalize(&self, observed: &[f64]) -> Result<Vec<f64>> {
        let tol = self.config.density.tolerance;
        match self.normalization() {
            ProbabilityNormalization::LeadingBasis => {
                self.design.normalize_leading_basis(observed, tol)
            }
            _ => self.design.normalize_per_group(observed, tol),
        }
    }

    /// Objective value of `rho` against target probabilities.
    pub fn objective_at(&self, rho: &Array2<Complex64>, probabilities: &[f64]) -> Result<f64> {
        let params = cholesky::encode(rho)?;
        Ok(self.objective(&params, probabilities))
    }

    /// Reconstruct ρ, warm-starting from linear inversion.
    pub fn reconstruct(&self, observed: &[f64]) -> Result<WlsResult> {
        self.reconstruct_from(observed, None)
    }

    /// Reconstruct ρ from an explicit starting state, or from linear
    /// inversion when `initial` is `None`.
    pub fn reconstruct_from(
        &self,
        observed: &[f64],
        initial: Option<&PhysicalDensityMatrix>,
    ) -> Result<WlsResult> {
        let d = self.design.dimension();
        validation::validate_observed(observed, self.design.operator_count())?;
        debug!(
            dimension = d,
            design = %self.design.spec().name(),
            normalization = %self.normalization(),
            "Starting WLS reconstruction"
        );

        let probabilities = self.normalize(observed)?;

        let start = match initial {
            Some(dm) if dm.dimension() != d => {
                return Err(Error::InputShape {
                    expected: format!("{}x{} initial state", d, d),
                    actual: format!("{}x{}", dm.dimension(), dm.dimension()),
                });
            }
            Some(dm) => dm.matrix().clone(),
            None => self.warm_start(observed),
        };
        let x0 = cholesky::encode(&start)?;

        let bfgs = Bfgs::new(BfgsOptions {
            max_iterations: self.config.max_iterations,
            ftol: self.config.ftol,
            gtol: self.config.gtol,
        });
        let report = bfgs.minimize(|theta| self.objective(theta, &probabilities), x0);

        if !report.status.is_success() {
            warn!(
                status = report.status.code(),
                message = report.status.message(),
                iterations = report.iterations,
                "WLS optimizer did not converge"
            );
        }

        let raw_matrix = cholesky::decode(&report.solution, d);
        let expected_probabilities = self.design.expected_probabilities(&raw_matrix);
        let density = PhysicalDensityMatrix::new(raw_matrix.clone(), self.config.density)?;

        info!(
            dimension = d,
            iterations = report.iterations,
            objective = report.objective,
            status = report.status.code(),
            "WLS reconstruction complete"
        );

        Ok(WlsResult {
            density,
            raw_matrix,
            normalized_probabilities: probabilities,
            expected_probabilities,
            objective_value: report.objective,
            initial_objective: report.initial_objective,
            parameters: report.solution,
            status: report.status,
            iterations: report.iterations,
            function_evaluations: report.function_evaluations,
        })
    }

    fn warm_start(&self, observed: &[f64]) -> Array2<Complex64> {
        let d = self.design.dimension();
        let config = LinearConfig {
            regularization: None,
            density: DensityOptions {
                tolerance: self.config.density.tolerance,
                ..DensityOptions::with_enforce(EnforceMode::Project).quiet()
            },
        };
        let linear = LinearEstimator::new(Arc::clone(&self.design), config)
            .and_then(|est| est.reconstruct(observed));
        match linear {
            Ok(result) => result.density.into_matrix(),
            Err(e) => {
                debug!(error = %e, "Linear warm start failed; starting from I/d");
                linalg::identity(d).mapv(|z| z / d as f64)
            }
        }
    }

    fn objective(&self, theta: &[f64], probabilities: &[f64]) -> f64 {
        let rho = cholesky::decode(theta, self.design.dimension());
        let model = self.design.expected_probabilities(&rho);
        let misfit: f64 = probabilities
            .iter()
            .zip(&model)
            .map(|(&p, &q)| (p - q).powi(2) / (p.max(0.0) + 1.0).sqrt())
            .sum();
        let penalty = match self.config.regularization {
            Some(lambda) => lambda * theta.iter().map(|t| t * t).sum::<f64>(),
            None => 0.0,
        };
        misfit + penalty
    }
}
