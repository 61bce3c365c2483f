// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dense complex linear algebra on `ndarray` matrices.
//!
//! Decompositions (Hermitian eigensolver, SVD, Cholesky, LU) are delegated
//! to nalgebra; the rest of the crate works with `Array2<Complex64>` and
//! converts at this boundary only.

use nalgebra::{Cholesky, DMatrix, DVector, SymmetricEigen, SVD};
use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::error::{Error, Result};

/// Complex zero.
pub const ZERO: Complex64 = Complex64 { re: 0.0, im: 0.0 };
/// Complex one.
pub const ONE: Complex64 = Complex64 { re: 1.0, im: 0.0 };

/// Eigendecomposition of a Hermitian matrix, eigenvalues ascending.
#[derive(Debug, Clone)]
pub struct HermitianEigen {
    /// Real eigenvalues in ascending order.
    pub values: Vec<f64>,
    /// Eigenvectors as columns, in the order of `values`.
    pub vectors: Array2<Complex64>,
}

impl HermitianEigen {
    /// Reassemble V·diag(values)·V†.
    pub fn reconstruct(&self, values: &[f64]) -> Array2<Complex64> {
        scaled_outer(&self.vectors, values)
    }

    /// Smallest eigenvalue.
    pub fn min(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.0)
    }

    /// Largest eigenvalue.
    pub fn max(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.0)
    }

    /// Spectral norm max |λ|.
    pub fn spectral_norm(&self) -> f64 {
        self.values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()))
    }
}

/// Least-squares solution of A·x = b.
#[derive(Debug, Clone)]
pub struct LeastSquares {
    /// Minimum-norm solution.
    pub solution: Array1<Complex64>,
    /// Numerical rank of A.
    pub rank: usize,
    /// Singular values of A, descending.
    pub singular_values: Vec<f64>,
}

pub(crate) fn to_nalgebra(a: &Array2<Complex64>) -> DMatrix<Complex64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

pub(crate) fn from_nalgebra(m: &DMatrix<Complex64>) -> Array2<Complex64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Identity matrix of size n.
pub fn identity(n: usize) -> Array2<Complex64> {
    Array2::from_diag_elem(n, ONE)
}

/// Conjugate transpose A†.
pub fn dagger(a: &Array2<Complex64>) -> Array2<Complex64> {
    a.t().mapv(|z| z.conj())
}

/// Hermitian part (A + A†)/2.
pub fn hermitian_part(a: &Array2<Complex64>) -> Array2<Complex64> {
    let mut h = a + &dagger(a);
    h.mapv_inplace(|z| z * 0.5);
    h
}

/// Matrix trace.
pub fn trace(a: &Array2<Complex64>) -> Complex64 {
    a.diag().iter().sum()
}

/// Tr(A·B) without forming the product.
pub fn trace_product(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Complex64 {
    let n = a.nrows();
    let mut acc = ZERO;
    for i in 0..n {
        for k in 0..a.ncols() {
            acc += a[[i, k]] * b[[k, i]];
        }
    }
    acc
}

/// Frobenius norm.
pub fn frobenius_norm(a: &Array2<Complex64>) -> f64 {
    a.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
}

/// Kronecker product A ⊗ B.
pub fn kron(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Array2<Complex64> {
    let (ar, ac) = a.dim();
    let (br, bc) = b.dim();
    Array2::from_shape_fn((ar * br, ac * bc), |(i, j)| {
        a[[i / br, j / bc]] * b[[i % br, j % bc]]
    })
}

/// Outer product |u⟩⟨v|.
pub fn outer(u: &Array1<Complex64>, v: &Array1<Complex64>) -> Array2<Complex64> {
    Array2::from_shape_fn((u.len(), v.len()), |(i, j)| u[i] * v[j].conj())
}

/// V·diag(values)·V† using column scaling.
pub fn scaled_outer(vectors: &Array2<Complex64>, values: &[f64]) -> Array2<Complex64> {
    let mut scaled = vectors.clone();
    for (mut col, &w) in scaled.columns_mut().into_iter().zip(values) {
        col.mapv_inplace(|z| z * w);
    }
    scaled.dot(&dagger(vectors))
}

/// Hermitian eigendecomposition. The input is symmetrized first.
pub fn eigh(a: &Array2<Complex64>) -> Result<HermitianEigen> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(Error::InputShape {
            expected: "square matrix".into(),
            actual: format!("{}x{}", a.nrows(), a.ncols()),
        });
    }
    let h = to_nalgebra(&hermitian_part(a));
    let eig = SymmetricEigen::try_new(h, f64::EPSILON, 0)
        .ok_or_else(|| Error::Numerical("Hermitian eigensolver did not converge".into()))?;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| eig.eigenvalues[i].total_cmp(&eig.eigenvalues[j]));

    let values = order.iter().map(|&i| eig.eigenvalues[i]).collect();
    let vectors = Array2::from_shape_fn((n, n), |(r, c)| eig.eigenvectors[(r, order[c])]);
    Ok(HermitianEigen { values, vectors })
}

/// Singular values, descending.
pub fn singular_values(a: &Array2<Complex64>) -> Result<Vec<f64>> {
    let svd = SVD::try_new(to_nalgebra(a), false, false, f64::EPSILON, 0)
        .ok_or_else(|| Error::Numerical("SVD did not converge".into()))?;
    let mut values: Vec<f64> = svd.singular_values.iter().copied().collect();
    values.sort_by(|a, b| b.total_cmp(a));
    Ok(values)
}

/// Rank cut-off used for least squares and rank counting.
pub fn rank_tolerance(singular_values: &[f64], rows: usize, cols: usize) -> f64 {
    let largest = singular_values.first().copied().unwrap_or(0.0);
    largest * rows.max(cols) as f64 * f64::EPSILON
}

/// Numerical rank from singular values.
pub fn numerical_rank(singular_values: &[f64], rows: usize, cols: usize) -> usize {
    let tol = rank_tolerance(singular_values, rows, cols);
    singular_values.iter().filter(|&&s| s > tol).count()
}

/// Minimum-norm least-squares solve via SVD.
pub fn lstsq(a: &Array2<Complex64>, b: &Array1<Complex64>) -> Result<LeastSquares> {
    if a.nrows() != b.len() {
        return Err(Error::length_mismatch(a.nrows(), b.len()));
    }
    let (rows, cols) = a.dim();
    let svd = SVD::try_new(to_nalgebra(a), true, true, f64::EPSILON, 0)
        .ok_or_else(|| Error::Numerical("SVD did not converge".into()))?;

    let mut singular: Vec<f64> = svd.singular_values.iter().copied().collect();
    singular.sort_by(|x, y| y.total_cmp(x));
    let cutoff = rank_tolerance(&singular, rows, cols);

    let rhs = DVector::from_iterator(b.len(), b.iter().copied());
    let x = svd
        .solve(&rhs, cutoff)
        .map_err(|e| Error::Numerical(format!("least squares failed: {}", e)))?;

    Ok(LeastSquares {
        solution: Array1::from_iter(x.iter().copied()),
        rank: numerical_rank(&singular, rows, cols),
        singular_values: singular,
    })
}

/// Solve a square system A·x = b via LU.
pub fn solve(a: &Array2<Complex64>, b: &Array1<Complex64>) -> Result<Array1<Complex64>> {
    if a.nrows() != a.ncols() || a.nrows() != b.len() {
        return Err(Error::InputShape {
            expected: format!("square system of size {}", b.len()),
            actual: format!("{}x{}", a.nrows(), a.ncols()),
        });
    }
    let rhs = DVector::from_iterator(b.len(), b.iter().copied());
    let x = to_nalgebra(a)
        .lu()
        .solve(&rhs)
        .ok_or_else(|| Error::Numerical("linear system is singular".into()))?;
    Ok(Array1::from_iter(x.iter().copied()))
}

/// Lower Cholesky factor of a Hermitian positive-definite matrix.
///
/// Returns `None` unless every pivot is real and strictly positive. The
/// complex factorization takes square roots of negative pivots instead of
/// failing, so indefinite and singular inputs are caught here.
pub fn cholesky_lower(a: &Array2<Complex64>) -> Option<Array2<Complex64>> {
    let scale = a.diag().iter().fold(1.0_f64, |m, z| m.max(z.norm()));
    let l = Cholesky::new(to_nalgebra(a))?.l();
    let pivots_positive = (0..l.nrows()).all(|i| {
        let z = l[(i, i)];
        z.re > 0.0 && z.im.abs() <= f64::EPSILON * scale
    });
    if pivots_positive && l.iter().all(|z| z.is_finite()) {
        Some(from_nalgebra(&l))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn pauli_y() -> Array2<Complex64> {
        let mut y = Array2::zeros((2, 2));
        y[[0, 1]] = c(0.0, -1.0);
        y[[1, 0]] = c(0.0, 1.0);
        y
    }

    #[test]
    fn test_eigh_pauli_y() {
        let eig = eigh(&pauli_y()).unwrap();
        assert_relative_eq!(eig.values[0], -1.0, epsilon = 1e-12);
        assert_relative_eq!(eig.values[1], 1.0, epsilon = 1e-12);
        let back = eig.reconstruct(&eig.values);
        for (a, b) in back.iter().zip(pauli_y().iter()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_eigh_rejects_non_square() {
        let a = Array2::<Complex64>::zeros((2, 3));
        assert!(matches!(eigh(&a), Err(Error::InputShape { .. })));
    }

    #[test]
    fn test_kron_dimensions_and_values() {
        let a = identity(2);
        let y = pauli_y();
        let k = kron(&a, &y);
        assert_eq!(k.dim(), (4, 4));
        assert_eq!(k[[2, 3]], c(0.0, -1.0));
        assert_eq!(k[[0, 2]], ZERO);
    }

    #[test]
    fn test_lstsq_recovers_exact_solution() {
        let a = Array2::from_shape_fn((3, 2), |(i, j)| c((i + j) as f64, (i * j) as f64 + 1.0));
        let x = Array1::from(vec![c(1.0, -0.5), c(0.25, 2.0)]);
        let b = a.dot(&x);
        let ls = lstsq(&a, &b).unwrap();
        assert_eq!(ls.rank, 2);
        for (u, v) in ls.solution.iter().zip(x.iter()) {
            assert!((u - v).norm() < 1e-10);
        }
    }

    #[test]
    fn test_rank_of_singular_matrix() {
        let a = Array2::from_shape_fn((3, 3), |(i, _)| c(i as f64 + 1.0, 0.0));
        let sv = singular_values(&a).unwrap();
        assert_eq!(numerical_rank(&sv, 3, 3), 1);
    }

    #[test]
    fn test_solve_square_system() {
        let mut a = identity(2);
        a[[0, 1]] = c(0.0, 1.0);
        let b = Array1::from(vec![c(1.0, 1.0), c(2.0, 0.0)]);
        let x = solve(&a, &b).unwrap();
        let back = a.dot(&x);
        for (u, v) in back.iter().zip(b.iter()) {
            assert!((u - v).norm() < 1e-12);
        }
    }

    #[test]
    fn test_cholesky_lower_reproduces_matrix() {
        let mut a = identity(2) * c(2.0, 0.0);
        a[[0, 1]] = c(0.5, -0.5);
        a[[1, 0]] = c(0.5, 0.5);
        let l = cholesky_lower(&a).unwrap();
        assert_eq!(l[[0, 1]], ZERO);
        let back = l.dot(&dagger(&l));
        for (u, v) in back.iter().zip(a.iter()) {
            assert!((u - v).norm() < 1e-12);
        }
    }

    #[test]
    fn test_cholesky_fails_on_indefinite() {
        let mut a = identity(2);
        a[[1, 1]] = c(-1.0, 0.0);
        assert!(cholesky_lower(&a).is_none());

        a[[1, 1]] = c(-0.5, 0.0);
        assert!(cholesky_lower(&a).is_none());
    }

    #[test]
    fn test_cholesky_fails_on_indefinite_complex() {
        // Eigenvalues 1 ± √2: positive diagonal, indefinite overall.
        let mut a = identity(2);
        a[[0, 1]] = c(1.0, -1.0);
        a[[1, 0]] = c(1.0, 1.0);
        assert!(cholesky_lower(&a).is_none());
    }

    #[test]
    fn test_cholesky_fails_on_singular() {
        let a = Array2::from_elem((2, 2), c(1.0, 0.0));
        assert!(cholesky_lower(&a).is_none());
    }

    #[test]
    fn test_trace_product_matches_dot() {
        let a = Array2::from_shape_fn((3, 3), |(i, j)| c(i as f64, j as f64));
        let b = Array2::from_shape_fn((3, 3), |(i, j)| c(j as f64 - 1.0, i as f64));
        let expected = trace(&a.dot(&b));
        assert!((trace_product(&a, &b) - expected).norm() < 1e-12);
    }
}
