// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Iterative maximum-likelihood reconstruction (strict RρR).
//!
//! The operator set is first reduced to the support of H = Σ M_j and
//! whitened so that the reduced operators Ē_j resolve the identity there
//! (see [`support`]). Starting from the maximally mixed state σ₀ = I/s the
//! estimator iterates
//!
//!   q_j = Tr(Ē_j σ),  R = Σ_j (f_j / q_j)·Ē_j,  σ ← R·σ·R / Tr(R·σ·R)
//!
//! until both the state update and the log-likelihood change fall below
//! their tolerances, then maps σ back to the full space. Because the model
//! probabilities are conditional on H, operator sets that are not POVMs are
//! handled without bias.

pub mod support;
pub mod types;

use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex64;
use tracing::{debug, info, warn};

pub use support::{NormalizedOperators, Support};
pub use types::{RhoRConfig, RhoRDiagnostics, RhoRResult};

use crate::density::PhysicalDensityMatrix;
use crate::design::MeasurementDesign;
use crate::error::Result;
use crate::linalg;
use crate::validation;

/// Log-likelihood drops larger than this are counted as decreases.
pub const LL_DECREASE_THRESHOLD: f64 = 1e-10;

/// RρR estimator bound to one measurement design.
///
/// The support and the normalized operators depend only on the design, so
/// they are computed once in [`RhoREstimator::new`] and reused by every
/// reconstruction.
#[derive(Debug, Clone)]
pub struct RhoREstimator {
    design: Arc<MeasurementDesign>,
    config: RhoRConfig,
    support: Support,
    normalized: NormalizedOperators,
}

impl RhoREstimator {
    /// Create an estimator, preparing the support and normalized operators.
    pub fn new(design: Arc<MeasurementDesign>, config: RhoRConfig) -> Result<Self> {
        config.validate()?;
        let h = design.operator_sum();
        let support = support::prepare_support(
            &h,
            config.eig_rel_thresh,
            config.eig_abs_thresh,
            config.eps_prob,
        )?;
        let normalized = support::normalize_operators(
            design.operators().iter().map(|op| &op.matrix),
            &support,
            config.validate_strict,
        )?;
        if !normalized.valid {
            warn!(
                max_dev_abs = normalized.max_dev_abs,
                max_dev_fro = normalized.max_dev_fro,
                "Normalized operators do not resolve the identity on the support"
            );
        }
        debug!(
            dimension = design.dimension(),
            support = support.dimension(),
            identity = support.identity,
            "Prepared RhoR estimator"
        );
        Ok(Self {
            design,
            config,
            support,
            normalized,
        })
    }

    /// The bound design.
    pub fn design(&self) -> &MeasurementDesign {
        &self.design
    }

    /// Active configuration.
    pub fn config(&self) -> &RhoRConfig {
        &self.config
    }

    /// Support of H.
    pub fn support(&self) -> &Support {
        &self.support
    }

    /// Reduced operators Ē_j.
    pub fn normalized_operators(&self) -> &[Array2<Complex64>] {
        &self.normalized.operators
    }

    /// Reconstruct ρ from observed counts or frequencies.
    pub fn reconstruct(&self, observed: &[f64]) -> Result<RhoRResult> {
        let cfg = &self.config;
        let d = self.design.dimension();
        validation::validate_counts(observed, self.design.operator_count())?;
        debug!(
            dimension = d,
            design = %self.design.spec().name(),
            max_iterations = cfg.max_iterations,
            "Starting RhoR reconstruction"
        );

        let f = self
            .design
            .normalize_per_group(observed, cfg.density.tolerance)?;
        let ops = &self.normalized.operators;
        let s = self.support.dimension();
        let eye = linalg::identity(s);
        let mixed = eye.mapv(|z| z / s as f64);

        let mut diagnostics = self.base_diagnostics();
        let mut sigma = mixed.clone();
        let mut ll_prev: Option<f64> = None;
        let mut history = Vec::new();
        let mut converged = false;
        let mut iterations = 0;

        for it in 1..=cfg.max_iterations {
            sigma = linalg::hermitian_part(&sigma);

            let q: Vec<f64> = conditional_probabilities(ops, &sigma)
                .into_iter()
                .map(|v| v.max(cfg.eps_prob))
                .collect();
            let q_min = q.iter().copied().fold(f64::INFINITY, f64::min);
            diagnostics.min_q = diagnostics.min_q.min(q_min);

            let ll = log_likelihood(&f, &q);
            history.push(ll);
            let dll = match ll_prev {
                Some(prev) => {
                    if ll - prev < -LL_DECREASE_THRESHOLD {
                        diagnostics.decrease_ll_count += 1;
                    }
                    (ll - prev).abs()
                }
                None => f64::INFINITY,
            };

            let mut r = ops
                .iter()
                .zip(f.iter().zip(&q))
                .fold(Array2::<Complex64>::zeros((s, s)), |acc, (e, (&fj, &qj))| {
                    acc + &e.mapv(|z| z * (fj / qj))
                });
            r = linalg::hermitian_part(&r);
            if let Some(mu) = cfg.dilution {
                r = r.mapv(|z| z * mu) + &eye.mapv(|z| z * (1.0 - mu));
            }

            let next = linalg::hermitian_part(&r.dot(&sigma).dot(&r));
            let tr = linalg::trace(&next).re;
            diagnostics.min_trace = diagnostics.min_trace.min(tr);
            let next = if tr <= cfg.eps_prob {
                diagnostics.reset_count += 1;
                diagnostics.reset_first_iteration.get_or_insert(it);
                mixed.clone()
            } else {
                next.mapv(|z| z / tr)
            };

            let dn = linalg::frobenius_norm(&(&next - &sigma));
            sigma = next;
            ll_prev = Some(ll);
            iterations = it;
            diagnostics.final_state_delta = Some(dn);
            diagnostics.final_ll_delta = dll.is_finite().then_some(dll);

            if dn < cfg.tol_state && dll < cfg.tol_ll {
                converged = true;
                break;
            }
        }

        let sigma = linalg::hermitian_part(&sigma);
        let expected: Vec<f64> = conditional_probabilities(ops, &sigma);
        let clipped: Vec<f64> = expected.iter().map(|v| v.max(cfg.eps_prob)).collect();
        let log_likelihood = log_likelihood(&f, &clipped);

        let raw_matrix = support::map_back(&sigma, &self.support, cfg.eps_prob);
        let density = PhysicalDensityMatrix::new(raw_matrix.clone(), cfg.density)?;

        if diagnostics.decrease_ll_count > 0 {
            warn!(
                decreases = diagnostics.decrease_ll_count,
                "Log-likelihood decreased during RhoR iteration"
            );
        }
        info!(
            dimension = d,
            iterations,
            converged,
            log_likelihood,
            resets = diagnostics.reset_count,
            "RhoR reconstruction complete"
        );

        Ok(RhoRResult {
            density,
            raw_matrix,
            sigma,
            normalized_probabilities: f,
            expected_probabilities: expected,
            log_likelihood,
            log_likelihood_history: history,
            iterations,
            converged,
            diagnostics,
        })
    }

    fn base_diagnostics(&self) -> RhoRDiagnostics {
        RhoRDiagnostics {
            support_dimension: self.support.dimension(),
            eig_min_h: self.support.min_eigenvalue(),
            eig_max_h: self.support.max_eigenvalue,
            identity_shortcut: self.support.identity,
            etilde_sum_max_dev_abs: self.normalized.max_dev_abs,
            etilde_sum_max_dev_fro: self.normalized.max_dev_fro,
            etilde_sum_valid: self.normalized.valid,
            etilde_min_eig_sample: self.normalized.min_eig_sample,
            min_q: f64::INFINITY,
            min_trace: f64::INFINITY,
            ..RhoRDiagnostics::default()
        }
    }
}

fn conditional_probabilities(ops: &[Array2<Complex64>], sigma: &Array2<Complex64>) -> Vec<f64> {
    ops.iter()
        .map(|e| linalg::trace_product(e, sigma).re)
        .collect()
}

fn log_likelihood(f: &[f64], q: &[f64]) -> f64 {
    f.iter().zip(q).map(|(&fj, &qj)| fj * qj.ln()).sum()
}
