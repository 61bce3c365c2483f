// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Synthetic measurement data.
//!
//! Exact outcome probabilities for a state and design, multinomial count
//! sampling, and random states. The caller owns the RNG so results are
//! reproducible with a seeded generator.

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rand::Rng;
use rand_distr::{Binomial, Distribution, StandardNormal};
use tracing::debug;

use crate::design::MeasurementDesign;
use crate::error::{ConfigurationError, Error, Result};
use crate::linalg;

/// Exact probabilities Tr(M_j ρ), negative round-off clipped to zero.
pub fn exact_probabilities(design: &MeasurementDesign, rho: &Array2<Complex64>) -> Result<Vec<f64>> {
    let d = design.dimension();
    if rho.dim() != (d, d) {
        return Err(Error::InputShape {
            expected: format!("{}x{} density matrix", d, d),
            actual: format!("{}x{}", rho.nrows(), rho.ncols()),
        });
    }
    Ok(design
        .expected_probabilities(rho)
        .into_iter()
        .map(|p| p.max(0.0))
        .collect())
}

/// Draw `shots` outcomes per measurement group.
///
/// Within each group the outcome distribution is Tr(M_j ρ) renormalized over
/// the group, so single-group designs whose operators do not sum to the
/// identity are sampled conditionally.
pub fn sample_counts<R: Rng + ?Sized>(
    design: &MeasurementDesign,
    rho: &Array2<Complex64>,
    shots: u64,
    rng: &mut R,
) -> Result<Vec<f64>> {
    if shots == 0 {
        return Err(ConfigurationError::invalid("shots", "must be > 0").into());
    }
    let probs = exact_probabilities(design, rho)?;
    let mut counts = vec![0.0; probs.len()];

    for indices in design.group_indices() {
        let group: Vec<f64> = indices.iter().map(|&j| probs[j]).collect();
        let drawn = multinomial(&group, shots, rng)?;
        for (&j, k) in indices.iter().zip(drawn) {
            counts[j] = k as f64;
        }
    }
    debug!(shots, outcomes = counts.len(), "Sampled measurement counts");
    Ok(counts)
}

/// Multinomial draw by sequential conditional binomials.
fn multinomial<R: Rng + ?Sized>(weights: &[f64], trials: u64, rng: &mut R) -> Result<Vec<u64>> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(Error::Normalization("outcome probabilities sum to zero".into()));
    }
    let mut remaining = trials;
    let mut mass = 1.0;
    let mut out = Vec::with_capacity(weights.len());
    for (i, &w) in weights.iter().enumerate() {
        let p = w / total;
        let k = if i + 1 == weights.len() {
            remaining
        } else if remaining == 0 || p <= 0.0 {
            0
        } else {
            let conditional = (p / mass).clamp(0.0, 1.0);
            Binomial::new(remaining, conditional)
                .map_err(|e| Error::Numerical(format!("binomial sampling failed: {}", e)))?
                .sample(rng)
        };
        remaining -= k;
        mass = (mass - p).max(0.0);
        out.push(k);
    }
    Ok(out)
}

/// Haar-random pure state vector.
pub fn random_pure_state<R: Rng + ?Sized>(dimension: usize, rng: &mut R) -> Array1<Complex64> {
    let v = Array1::from_shape_fn(dimension, |_| {
        Complex64::new(rng.sample(StandardNormal), rng.sample(StandardNormal))
    });
    let norm = v.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt();
    v.mapv(|z| z / norm)
}

/// |ψ⟩⟨ψ| for a normalized ψ.
pub fn pure_density(state: &Array1<Complex64>) -> Array2<Complex64> {
    linalg::outer(state, state)
}

/// Random density matrix G·G†/Tr with G a d × rank complex Ginibre matrix.
pub fn random_density_matrix<R: Rng + ?Sized>(
    dimension: usize,
    rank: usize,
    rng: &mut R,
) -> Array2<Complex64> {
    let rank = rank.clamp(1, dimension.max(1));
    let g = Array2::from_shape_fn((dimension, rank), |_| {
        Complex64::new(rng.sample(StandardNormal), rng.sample(StandardNormal))
    });
    let rho = g.dot(&linalg::dagger(&g));
    let tr = linalg::trace(&rho).re;
    rho.mapv(|z| z / tr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::DesignSpec;
    use crate::test_utils::seeded_rng;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_probabilities_sum_per_group() {
        let design = MeasurementDesign::build(3, DesignSpec::mub()).unwrap();
        let mut rng = seeded_rng(1);
        let rho = random_density_matrix(3, 2, &mut rng);
        let p = exact_probabilities(&design, &rho).unwrap();
        for indices in design.group_indices() {
            let s: f64 = indices.iter().map(|&j| p[j]).sum();
            assert_relative_eq!(s, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_exact_probabilities_shape_check() {
        let design = MeasurementDesign::build(2, DesignSpec::nopovm()).unwrap();
        let rho = Array2::<Complex64>::zeros((3, 3));
        assert!(exact_probabilities(&design, &rho).is_err());
    }

    #[test]
    fn test_sample_counts_totals() {
        let design = MeasurementDesign::build(2, DesignSpec::mub()).unwrap();
        let mut rng = seeded_rng(2);
        let rho = pure_density(&random_pure_state(2, &mut rng));
        let counts = sample_counts(&design, &rho, 1000, &mut rng).unwrap();
        for indices in design.group_indices() {
            let s: f64 = indices.iter().map(|&j| counts[j]).sum();
            assert_eq!(s, 1000.0);
        }
    }

    #[test]
    fn test_sample_counts_deterministic_outcome() {
        let design = MeasurementDesign::build(2, DesignSpec::nopovm()).unwrap();
        let mut rho = Array2::<Complex64>::zeros((2, 2));
        rho[[0, 0]] = Complex64::new(1.0, 0.0);
        let mut rng = seeded_rng(3);
        let counts = sample_counts(&design, &rho, 500, &mut rng).unwrap();
        assert_eq!(counts[1], 0.0);
        assert_eq!(counts.iter().sum::<f64>(), 500.0);
    }

    #[test]
    fn test_sample_counts_frequencies_converge() {
        let design = MeasurementDesign::build(2, DesignSpec::sic()).unwrap();
        let mut rng = seeded_rng(4);
        let rho = random_density_matrix(2, 2, &mut rng);
        let p = exact_probabilities(&design, &rho).unwrap();
        let counts = sample_counts(&design, &rho, 200_000, &mut rng).unwrap();
        for (k, q) in counts.iter().zip(&p) {
            assert!((k / 200_000.0 - q).abs() < 0.01);
        }
    }

    #[test]
    fn test_random_states_are_normalized() {
        let mut rng = seeded_rng(5);
        let psi = random_pure_state(4, &mut rng);
        let n: f64 = psi.iter().map(|z| z.norm_sqr()).sum();
        assert_relative_eq!(n, 1.0, epsilon = 1e-12);
        let rho = random_density_matrix(4, 2, &mut rng);
        assert_relative_eq!(linalg::trace(&rho).re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_shots_rejected() {
        let design = MeasurementDesign::build(2, DesignSpec::mub()).unwrap();
        let rho = linalg::identity(2).mapv(|z| z * 0.5);
        let mut rng = seeded_rng(6);
        assert!(sample_counts(&design, &rho, 0, &mut rng).is_err());
    }
}
