// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Mutually unbiased bases for prime-power dimensions.
//!
//! Ref: Wootters & Fields (1989), Ann. Phys. 191, 363.
//! Ref: Bandyopadhyay, Boykin, Roychowdhury, Vatan (2002), Algorithmica 34, 512.
//!
//! Both constructions return d+1 bases of C^d as column matrices, the
//! computational basis first:
//!
//! - Quadratic phase (odd p):
//!   ψ_{c,γ}[α] = χ(cα² + γα)/√d with χ(x) = ω^{Tr x}, ω = e^{2πi/p}.
//! - Stabilizer (any p): basis `a` is the joint eigenbasis of the commuting
//!   Weyl operators W(e_j, S(a)·e_j), j = 0..k-1, where S(a) = G·M(a) mod p,
//!   G the trace-form Gram matrix and M(a) multiplication by `a` in the
//!   polynomial basis.

use std::f64::consts::PI;

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use tracing::debug;

use super::field::{build_field, prime_power, FieldBackendKind, FiniteField};
use super::{DesignSpec, MeasurementOperator, MubMethod, MubVariant};
use crate::error::{ConfigurationError, Result};
use crate::linalg::{self, ONE, ZERO};

/// Relative residual below which a compact-selection row counts as dependent.
const RANK_TOLERANCE: f64 = 1e-10;

/// Build the d+1 mutually unbiased bases of C^d.
///
/// Each returned matrix holds one orthonormal basis in its columns.
pub fn mub_bases(
    dimension: usize,
    method: MubMethod,
    backend: FieldBackendKind,
) -> Result<Vec<Array2<Complex64>>> {
    if dimension < 2 {
        return Err(ConfigurationError::InvalidDimension(dimension).into());
    }
    let (p, k) = prime_power(dimension).ok_or(ConfigurationError::NotPrimePower(dimension))?;

    let algorithm = match method {
        MubMethod::Auto if p == 2 => MubMethod::Stabilizer,
        MubMethod::Auto => MubMethod::FiniteField,
        MubMethod::FiniteField if p == 2 => {
            return Err(ConfigurationError::MethodUnavailable(
                "quadratic-phase MUB formula requires odd characteristic".into(),
            )
            .into())
        }
        other => other,
    };

    let field = build_field(p, k, backend)?;
    debug!(dimension, p, k, method = ?algorithm, "Constructing MUB");

    let mut bases = vec![linalg::identity(dimension)];
    match algorithm {
        MubMethod::Stabilizer => bases.extend(stabilizer_bases(field.as_ref())),
        _ => bases.extend(quadratic_phase_bases(field.as_ref())),
    }
    Ok(bases)
}

/// Measurement operators for a MUB design.
pub(super) fn build(dimension: usize, spec: &DesignSpec) -> Result<Vec<MeasurementOperator>> {
    let bases = mub_bases(dimension, spec.method, spec.field_backend)?;
    let full: Vec<MeasurementOperator> = bases
        .iter()
        .enumerate()
        .flat_map(|(group, basis)| {
            basis
                .columns()
                .into_iter()
                .map(move |col| MeasurementOperator::projector(&col.to_owned(), 1.0, group))
                .collect::<Vec<_>>()
        })
        .collect();

    match spec.variant {
        MubVariant::Full => Ok(full),
        MubVariant::Compact => select_independent(full, dimension * dimension),
    }
}

fn root_of_unity(p: u32, power: u32) -> Complex64 {
    Complex64::from_polar(1.0, 2.0 * PI * (power % p) as f64 / p as f64)
}

fn quadratic_phase_bases(field: &dyn FiniteField) -> Vec<Array2<Complex64>> {
    let q = field.order();
    let p = field.characteristic();
    let norm = 1.0 / (q as f64).sqrt();

    (0..q)
        .map(|c| {
            Array2::from_shape_fn((q, q), |(alpha, gamma)| {
                let sq = field.mul(alpha, alpha);
                let arg = field.add(field.mul(c, sq), field.mul(gamma, alpha));
                root_of_unity(p, field.trace(arg)) * norm
            })
        })
        .collect()
}

/// Single-qudit Weyl operator X^u Z^v; for qubits (1,1) maps to Y = iXZ so
/// every generator has eigenvalues ±1.
fn weyl(p: u32, u: u32, v: u32) -> Array2<Complex64> {
    let n = p as usize;
    let mut shift = Array2::<Complex64>::zeros((n, n));
    for x in 0..n {
        shift[[(x + u as usize) % n, x]] = ONE;
    }
    let clock = Array2::from_diag(&Array1::from_shape_fn(n, |x| {
        root_of_unity(p, (x as u32 * v) % p)
    }));
    let w = shift.dot(&clock);
    if p == 2 && u == 1 && v == 1 {
        w.mapv(|z| z * Complex64::new(0.0, 1.0))
    } else {
        w
    }
}

/// S(a) = G·M(a) mod p, where G[i][j] = Tr(x^i x^j) and column j of M(a)
/// holds the coordinates of a·x^j.
fn symmetric_matrix(field: &dyn FiniteField, a: usize) -> Vec<Vec<u32>> {
    let k = field.degree() as usize;
    let p = field.characteristic();
    let basis: Vec<usize> = (0..k as u32).map(|j| field.basis_element(j)).collect();

    let gram: Vec<Vec<u32>> = basis
        .iter()
        .map(|&ei| basis.iter().map(|&ej| field.trace(field.mul(ei, ej))).collect())
        .collect();
    let mult: Vec<Vec<u32>> = basis.iter().map(|&ej| field.digits(field.mul(a, ej))).collect();

    (0..k)
        .map(|i| {
            (0..k)
                .map(|j| (0..k).map(|l| gram[i][l] * mult[j][l]).sum::<u32>() % p)
                .collect()
        })
        .collect()
}

fn stabilizer_bases(field: &dyn FiniteField) -> Vec<Array2<Complex64>> {
    let q = field.order();
    let k = field.degree() as usize;
    let p = field.characteristic();

    (0..q)
        .map(|a| {
            let s = symmetric_matrix(field, a);
            // Generator j: X on qudit j, Z powers from column j of S.
            let generators: Vec<Array2<Complex64>> = (0..k)
                .map(|j| {
                    (0..k)
                        .map(|qudit| weyl(p, (qudit == j) as u32, s[qudit][j]))
                        .reduce(|acc, w| linalg::kron(&acc, &w))
                        .unwrap_or_else(|| linalg::identity(1))
                })
                .collect();
            joint_eigenbasis(&generators, p, q)
        })
        .collect()
}

/// Eigenprojector onto eigenvalue ω^b of `g`: (1/p) Σ_t ω^{-bt} g^t.
fn eigenprojector(g: &Array2<Complex64>, p: u32, b: u32) -> Array2<Complex64> {
    let n = g.nrows();
    let mut acc = Array2::<Complex64>::zeros((n, n));
    let mut power = linalg::identity(n);
    for t in 0..p {
        let phase = root_of_unity(p, (p - b % p) * t % p);
        acc = acc + power.mapv(|z| z * phase);
        power = power.dot(g);
    }
    acc.mapv(|z| z / p as f64)
}

/// Joint eigenvectors of k commuting generators, ordered by eigenvalue
/// pattern (b_0 fastest).
fn joint_eigenbasis(generators: &[Array2<Complex64>], p: u32, d: usize) -> Array2<Complex64> {
    let projectors: Vec<Vec<Array2<Complex64>>> = generators
        .iter()
        .map(|g| (0..p).map(|b| eigenprojector(g, p, b)).collect())
        .collect();

    let mut basis = Array2::<Complex64>::zeros((d, d));
    for pattern in 0..d {
        let mut rest = pattern;
        let mut pi = linalg::identity(d);
        for proj in &projectors {
            let b = rest % p as usize;
            rest /= p as usize;
            pi = pi.dot(&proj[b]);
        }
        // Rank-1 projector: its largest column is a multiple of the eigenvector.
        let (best, norm) = (0..d)
            .map(|c| (c, pi.column(c).iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()))
            .fold((0, 0.0), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
        for r in 0..d {
            basis[[r, pattern]] = if norm > 0.0 { pi[[r, best]] / norm } else { ZERO };
        }
    }
    basis
}

/// Greedily keep rows whose flattened operator is linearly independent of
/// those already kept (modified Gram–Schmidt), until `required` are found.
/// The result forms a single group.
fn select_independent(
    operators: Vec<MeasurementOperator>,
    required: usize,
) -> Result<Vec<MeasurementOperator>> {
    let mut orthonormal: Vec<Array1<Complex64>> = Vec::with_capacity(required);
    let mut selected = Vec::with_capacity(required);

    for op in operators {
        if selected.len() == required {
            break;
        }
        let row = Array1::from_iter(op.matrix.iter().copied());
        let row_norm = norm(&row);
        let mut residual = row.clone();
        // Two passes keep the residual orthogonal in floating point.
        for _ in 0..2 {
            for qv in &orthonormal {
                let overlap: Complex64 = qv.iter().zip(residual.iter()).map(|(a, b)| a.conj() * b).sum();
                residual = residual - qv.mapv(|z| z * overlap);
            }
        }
        let res_norm = norm(&residual);
        if res_norm > RANK_TOLERANCE * row_norm.max(1.0) {
            orthonormal.push(residual.mapv(|z| z / res_norm));
            selected.push(MeasurementOperator {
                matrix: op.matrix,
                group: 0,
            });
        }
    }

    if selected.len() < required {
        return Err(ConfigurationError::RankDeficient {
            found: selected.len(),
            required,
        }
        .into());
    }
    debug!(rows = selected.len(), "Selected compact MUB rows");
    Ok(selected)
}

fn norm(v: &Array1<Complex64>) -> f64 {
    v.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
}
