// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared test utilities for tomography tests.

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::simulation;

/// Shorthand complex constructor.
pub fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

/// Deterministic RNG.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Random full- or reduced-rank density matrix.
pub fn random_density(rng: &mut StdRng, d: usize, rank: usize) -> Array2<Complex64> {
    simulation::random_density_matrix(d, rank, rng)
}

/// Random pure state |ψ⟩⟨ψ|.
pub fn random_pure_density(rng: &mut StdRng, d: usize) -> Array2<Complex64> {
    simulation::pure_density(&simulation::random_pure_state(d, rng))
}

/// Random Hermitian matrix, generally indefinite and not trace-1.
pub fn random_hermitian(rng: &mut StdRng, d: usize) -> Array2<Complex64> {
    let a = Array2::from_shape_fn((d, d), |_| {
        c(rng.sample(StandardNormal), rng.sample(StandardNormal))
    });
    crate::linalg::hermitian_part(&a)
}

/// Bell state |Φ+⟩⟨Φ+| on two qubits.
pub fn bell_phi_plus() -> Array2<Complex64> {
    let s = std::f64::consts::FRAC_1_SQRT_2;
    let psi = Array1::from(vec![c(s, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(s, 0.0)]);
    simulation::pure_density(&psi)
}

/// Check matrix equality element-wise within `tol` (inclusive).
pub fn assert_matrix_close(a: &Array2<Complex64>, b: &Array2<Complex64>, tol: f64) {
    assert_eq!(a.shape(), b.shape());
    for ((i, j), val) in a.indexed_iter() {
        let diff = (val - b[[i, j]]).norm();
        assert!(
            diff <= tol,
            "Mismatch at ({}, {}): {:?} vs {:?} (diff={})",
            i,
            j,
            val,
            b[[i, j]],
            diff
        );
    }
}

/// Frobenius distance ‖A − B‖_F.
pub fn frobenius_distance(a: &Array2<Complex64>, b: &Array2<Complex64>) -> f64 {
    crate::linalg::frobenius_norm(&(a - b))
}
