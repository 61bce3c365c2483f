// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Support subspace of H = Σ M_j and the normalized operator set.
//!
//! With U_S the eigenvectors of H whose eigenvalues exceed the threshold and
//! B = H^{-1/2}·U_S, the reduced operators Ē_j = B†·M_j·B sum to the identity
//! on the support, which turns an arbitrary operator set into a POVM the
//! fixed-point iteration can work with.

use ndarray::Array2;
use num_complex::Complex64;
use tracing::debug;

use crate::error::{Error, Result};
use crate::linalg;

/// Max entry deviation of H from I that skips the transform.
pub const IDENTITY_TOLERANCE: f64 = 1e-12;

/// Absolute tolerance per support dimension for Σ Ē_j = I.
pub const ETILDE_ATOL_PER_DIM: f64 = 1e-8;

/// Relative part of the Σ Ē_j = I check.
pub const ETILDE_RTOL: f64 = 1e-5;

/// Supports at most this large get a sampled Ē eigenvalue check.
pub const SAMPLE_SUPPORT_LIMIT: usize = 10;

/// Eigen-structure of H restricted to its support.
#[derive(Debug, Clone)]
pub struct Support {
    /// d × s orthonormal support basis U_S.
    pub basis: Array2<Complex64>,
    /// Eigenvalues of H on the support, ascending.
    pub eigenvalues: Vec<f64>,
    /// H^{1/2} restricted to the support.
    pub h_sqrt: Array2<Complex64>,
    /// H^{-1/2} restricted to the support.
    pub h_inv_sqrt: Array2<Complex64>,
    /// H^{-1} restricted to the support.
    pub h_inv: Array2<Complex64>,
    /// Largest eigenvalue of H.
    pub max_eigenvalue: f64,
    /// H was the identity.
    pub identity: bool,
}

impl Support {
    /// Support dimension s.
    pub fn dimension(&self) -> usize {
        self.basis.ncols()
    }

    /// Smallest eigenvalue of H kept in the support.
    pub fn min_eigenvalue(&self) -> f64 {
        self.eigenvalues.first().copied().unwrap_or(0.0)
    }

    /// B = H^{-1/2}·U_S.
    pub fn whitening(&self) -> Array2<Complex64> {
        self.h_inv_sqrt.dot(&self.basis)
    }
}

/// Eigendecompose `h` and keep eigenvalues above
/// max(abs_thresh, rel_thresh · max(λ_max, 1)), or the largest one alone
/// when none qualify.
pub fn prepare_support(
    h: &Array2<Complex64>,
    rel_thresh: f64,
    abs_thresh: Option<f64>,
    eps: f64,
) -> Result<Support> {
    let d = h.nrows();
    let deviation = (h - &linalg::identity(d))
        .iter()
        .fold(0.0_f64, |m, z| m.max(z.norm()));
    if deviation <= IDENTITY_TOLERANCE {
        let eye = linalg::identity(d);
        return Ok(Support {
            basis: eye.clone(),
            eigenvalues: vec![1.0; d],
            h_sqrt: eye.clone(),
            h_inv_sqrt: eye.clone(),
            h_inv: eye,
            max_eigenvalue: 1.0,
            identity: true,
        });
    }

    let eig = linalg::eigh(h)?;
    let max_eigenvalue = eig.max();
    let tau = abs_thresh
        .unwrap_or(0.0)
        .max(rel_thresh * max_eigenvalue.max(1.0));

    let mut keep: Vec<usize> = (0..d).filter(|&i| eig.values[i] > tau).collect();
    if keep.is_empty() {
        keep.push(d - 1);
    }

    let basis = Array2::from_shape_fn((d, keep.len()), |(r, c)| eig.vectors[[r, keep[c]]]);
    let eigenvalues: Vec<f64> = keep.iter().map(|&i| eig.values[i]).collect();
    debug!(
        dimension = d,
        support = keep.len(),
        threshold = tau,
        "Prepared support of operator sum"
    );

    let sqrt: Vec<f64> = eigenvalues.iter().map(|w| w.max(0.0).sqrt()).collect();
    let inv_sqrt: Vec<f64> = sqrt.iter().map(|r| 1.0 / r.max(eps)).collect();
    let inv: Vec<f64> = eigenvalues.iter().map(|w| 1.0 / w.max(eps)).collect();

    Ok(Support {
        h_sqrt: linalg::scaled_outer(&basis, &sqrt),
        h_inv_sqrt: linalg::scaled_outer(&basis, &inv_sqrt),
        h_inv: linalg::scaled_outer(&basis, &inv),
        basis,
        eigenvalues,
        max_eigenvalue,
        identity: false,
    })
}

/// Normalized operators Ē_j with the identity-resolution check.
#[derive(Debug, Clone)]
pub struct NormalizedOperators {
    /// s × s operators, one per design operator.
    pub operators: Vec<Array2<Complex64>>,
    /// max |Σ Ē_j − I|.
    pub max_dev_abs: f64,
    /// ‖Σ Ē_j − I‖_F.
    pub max_dev_fro: f64,
    /// Whether the check passed.
    pub valid: bool,
    /// Smallest eigenvalue among the first two Ē_j for small supports.
    pub min_eig_sample: Option<f64>,
}

/// Reduce `operators` to the support and check Σ Ē_j ≈ I.
///
/// With `strict` set a failed check is an error, otherwise it is only
/// recorded.
pub fn normalize_operators<'a, I>(
    operators: I,
    support: &Support,
    strict: bool,
) -> Result<NormalizedOperators>
where
    I: IntoIterator<Item = &'a Array2<Complex64>>,
{
    let s = support.dimension();
    let b = support.whitening();
    let b_dag = linalg::dagger(&b);

    let reduced: Vec<Array2<Complex64>> = operators
        .into_iter()
        .map(|m| linalg::hermitian_part(&b_dag.dot(m).dot(&b)))
        .collect();

    let eye = linalg::identity(s);
    let sum = reduced
        .iter()
        .fold(Array2::<Complex64>::zeros((s, s)), |acc, e| acc + e);
    let diff = &sum - &eye;
    let max_dev_abs = diff.iter().fold(0.0_f64, |m, z| m.max(z.norm()));
    let max_dev_fro = linalg::frobenius_norm(&diff);
    let atol = ETILDE_ATOL_PER_DIM * s.max(1) as f64;
    let valid = diff
        .iter()
        .zip(eye.iter())
        .all(|(dz, iz)| dz.norm() <= atol + ETILDE_RTOL * iz.norm());

    if !valid && strict {
        return Err(Error::Numerical(format!(
            "normalized operators do not resolve the identity: max deviation {:.3e} > {:.3e}",
            max_dev_abs, atol
        )));
    }

    let min_eig_sample = if s <= SAMPLE_SUPPORT_LIMIT && !reduced.is_empty() {
        let mut min = f64::INFINITY;
        for e in reduced.iter().take(2) {
            min = min.min(linalg::eigh(e)?.min());
        }
        Some(min)
    } else {
        None
    };

    Ok(NormalizedOperators {
        operators: reduced,
        max_dev_abs,
        max_dev_fro,
        valid,
        min_eig_sample,
    })
}

/// Lift σ to the full space and undo the whitening:
/// ρ = H^{-1/2}·U σ U†·H^{-1/2} / max(Tr(H⁻¹·U σ U†), eps).
pub fn map_back(sigma: &Array2<Complex64>, support: &Support, eps: f64) -> Array2<Complex64> {
    let u = &support.basis;
    let sigma_full = u.dot(sigma).dot(&linalg::dagger(u));
    let unnormalized = support
        .h_inv_sqrt
        .dot(&sigma_full)
        .dot(&support.h_inv_sqrt);
    let norm = linalg::trace_product(&support.h_inv, &sigma_full).re.max(eps);
    linalg::hermitian_part(&unnormalized.mapv(|z| z / norm))
}
