// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! RρR configuration, result and diagnostics types.

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::density::{DensityOptions, PhysicalDensityMatrix};
use crate::error::Result;
use crate::validation;

/// Configuration for the RρR estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RhoRConfig {
    /// Iteration limit.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Frobenius norm of the state update treated as converged.
    #[serde(default = "default_tol_state")]
    pub tol_state: f64,

    /// Log-likelihood change treated as converged.
    #[serde(default = "default_tol_ll")]
    pub tol_ll: f64,

    /// Floor for probabilities, traces and inverse eigenvalues.
    #[serde(default = "default_eps_prob")]
    pub eps_prob: f64,

    /// Dilution μ in (0, 1]: R ← μR + (1 − μ)I. `None` disables it.
    #[serde(default)]
    pub dilution: Option<f64>,

    /// Relative eigenvalue threshold defining the support of H.
    #[serde(default = "default_eig_rel_thresh")]
    pub eig_rel_thresh: f64,

    /// Absolute eigenvalue threshold defining the support of H.
    #[serde(default)]
    pub eig_abs_thresh: Option<f64>,

    /// Fail when the normalized operators do not resolve the identity.
    #[serde(default)]
    pub validate_strict: bool,

    /// Physicality options for the returned density matrix.
    #[serde(skip)]
    pub density: DensityOptions,
}

impl Default for RhoRConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tol_state: default_tol_state(),
            tol_ll: default_tol_ll(),
            eps_prob: default_eps_prob(),
            dilution: None,
            eig_rel_thresh: default_eig_rel_thresh(),
            eig_abs_thresh: None,
            validate_strict: false,
            density: DensityOptions::default(),
        }
    }
}

impl RhoRConfig {
    /// Builder: set the iteration limit.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Builder: set both convergence tolerances.
    pub fn with_tolerances(mut self, tol_state: f64, tol_ll: f64) -> Self {
        self.tol_state = tol_state;
        self.tol_ll = tol_ll;
        self
    }

    /// Builder: enable dilution with factor μ.
    pub fn with_dilution(mut self, mu: f64) -> Self {
        self.dilution = Some(mu);
        self
    }

    /// Builder: fail on an invalid normalized operator set.
    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.validate_strict = strict;
        self
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<()> {
        validation::require_iterations("rhor.max_iterations", self.max_iterations)?;
        validation::require_positive("rhor.tol_state", self.tol_state)?;
        validation::require_positive("rhor.tol_ll", self.tol_ll)?;
        validation::require_positive("rhor.eps_prob", self.eps_prob)?;
        validation::require_positive("rhor.eig_rel_thresh", self.eig_rel_thresh)?;
        if let Some(abs) = self.eig_abs_thresh {
            validation::require_non_negative("rhor.eig_abs_thresh", abs)?;
        }
        if let Some(mu) = self.dilution {
            validation::require_unit_interval("rhor.dilution", mu)?;
        }
        self.density.validate()
    }
}

fn default_max_iterations() -> usize {
    5000
}

fn default_tol_state() -> f64 {
    1e-8
}

fn default_tol_ll() -> f64 {
    1e-9
}

fn default_eps_prob() -> f64 {
    1e-12
}

fn default_eig_rel_thresh() -> f64 {
    1e-10
}

/// Support and normalization diagnostics plus iteration counters.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RhoRDiagnostics {
    /// Dimension of the support subspace of H.
    pub support_dimension: usize,
    /// Smallest eigenvalue of H kept in the support.
    pub eig_min_h: f64,
    /// Largest eigenvalue of H.
    pub eig_max_h: f64,
    /// H was the identity and no transform was applied.
    pub identity_shortcut: bool,
    /// max |Σ Ē_j − I|.
    pub etilde_sum_max_dev_abs: f64,
    /// ‖Σ Ē_j − I‖_F.
    pub etilde_sum_max_dev_fro: f64,
    /// Whether Σ Ē_j matched the identity within tolerance.
    pub etilde_sum_valid: bool,
    /// Smallest eigenvalue among the first normalized operators, sampled
    /// only for small supports.
    pub etilde_min_eig_sample: Option<f64>,
    /// Iterations whose log-likelihood dropped by more than the threshold.
    pub decrease_ll_count: usize,
    /// Iterations where the trace collapsed and σ was reset.
    pub reset_count: usize,
    /// First iteration with a reset.
    pub reset_first_iteration: Option<usize>,
    /// Smallest q_j seen, after the `eps_prob` floor.
    pub min_q: f64,
    /// Smallest un-normalized trace of R·σ·R seen.
    pub min_trace: f64,
    /// Last state update norm.
    pub final_state_delta: Option<f64>,
    /// Last log-likelihood change.
    pub final_ll_delta: Option<f64>,
}

/// Result of an RρR reconstruction.
#[derive(Debug, Clone)]
pub struct RhoRResult {
    /// Physically constrained estimate.
    pub density: PhysicalDensityMatrix,
    /// Mapped-back matrix before enforcement.
    pub raw_matrix: Array2<Complex64>,
    /// Final state on the support subspace.
    pub sigma: Array2<Complex64>,
    /// Grouped-normalized observed frequencies.
    pub normalized_probabilities: Vec<f64>,
    /// Conditional model probabilities Tr(Ē_j σ) at the final state.
    pub expected_probabilities: Vec<f64>,
    /// Log-likelihood at the final state.
    pub log_likelihood: f64,
    /// Log-likelihood at the start of each iteration.
    pub log_likelihood_history: Vec<f64>,
    /// Iterations executed.
    pub iterations: usize,
    /// Whether both tolerances were met.
    pub converged: bool,
    /// Diagnostics.
    pub diagnostics: RhoRDiagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RhoRConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_iterations, 5000);
        assert_eq!(config.dilution, None);
        assert!(!config.validate_strict);
    }

    #[test]
    fn test_invalid_dilution() {
        assert!(RhoRConfig::default().with_dilution(0.0).validate().is_err());
        assert!(RhoRConfig::default().with_dilution(1.2).validate().is_err());
        assert!(RhoRConfig::default().with_dilution(0.5).validate().is_ok());
    }

    #[test]
    fn test_invalid_tolerances() {
        assert!(RhoRConfig::default().with_tolerances(0.0, 1e-9).validate().is_err());
        assert!(RhoRConfig::default().with_max_iterations(0).validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: RhoRConfig = serde_yaml::from_str("max_iterations: 100\ndilution: 0.5\n").unwrap();
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.dilution, Some(0.5));
        assert_eq!(config.tol_ll, 1e-9);
    }
}
