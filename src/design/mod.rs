// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Measurement designs.
//!
//! A [`MeasurementDesign`] is an ordered list of Hermitian measurement
//! operators for a fixed Hilbert-space dimension, each tagged with the id of
//! the measurement group (basis) it belongs to, together with the flattened
//! measurement matrix whose row j is operator j in row-major order.
//!
//! Design families:
//! - MUB: d+1 mutually unbiased bases for prime-power d (`full` or `compact`)
//! - SIC: the qubit tetrahedral SIC-POVM (d = 2 only)
//! - NoPOVM: standard basis plus pairwise combination states; informationally
//!   complete but the operators do not sum to the identity
//!
//! Designs are immutable once built. Use [`DesignCache`] to share them.

pub mod cache;
pub mod field;
mod mub;
mod nopovm;
mod sic;

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigurationError, Error, Result};
use crate::linalg;

pub use cache::{CacheStats, DesignCache};
pub use field::{FieldBackendKind, FiniteField};
pub use mub::mub_bases;

/// Design family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignKind {
    /// Mutually unbiased bases
    Mub,
    /// Symmetric informationally complete POVM
    Sic,
    /// Standard plus combination basis, not a POVM
    #[serde(rename = "nopovm")]
    NoPovm,
}

impl fmt::Display for DesignKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesignKind::Mub => write!(f, "mub"),
            DesignKind::Sic => write!(f, "sic"),
            DesignKind::NoPovm => write!(f, "nopovm"),
        }
    }
}

/// Output variant for MUB designs.
///
/// Defaults to `Full`, which keeps per-basis groups for normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MubVariant {
    /// All d(d+1) projectors, one group per basis
    #[default]
    Full,
    /// d² linearly independent projectors, single group
    Compact,
}

/// Basis construction algorithm for MUB designs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MubMethod {
    /// Stabilizer for characteristic 2, quadratic phase otherwise
    #[default]
    Auto,
    /// Finite-field quadratic-phase formula (odd characteristic only)
    FiniteField,
    /// Weyl–Heisenberg stabilizer construction (any prime power)
    Stabilizer,
}

/// Full description of a design request. Also the cache key together with
/// the dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesignSpec {
    /// Design family.
    pub kind: DesignKind,
    /// MUB output variant (ignored by other families).
    #[serde(default)]
    pub variant: MubVariant,
    /// MUB construction algorithm (ignored by other families).
    #[serde(default)]
    pub method: MubMethod,
    /// Finite-field backend (ignored by other families).
    #[serde(default)]
    pub field_backend: FieldBackendKind,
}

impl DesignSpec {
    fn of(kind: DesignKind) -> Self {
        Self {
            kind,
            variant: MubVariant::Full,
            method: MubMethod::Auto,
            field_backend: FieldBackendKind::Auto,
        }
    }

    /// MUB, full variant.
    pub fn mub() -> Self {
        Self::of(DesignKind::Mub)
    }

    /// MUB, compact variant.
    pub fn mub_compact() -> Self {
        Self {
            variant: MubVariant::Compact,
            ..Self::mub()
        }
    }

    /// Qubit SIC-POVM.
    pub fn sic() -> Self {
        Self::of(DesignKind::Sic)
    }

    /// Non-POVM combination design.
    pub fn nopovm() -> Self {
        Self::of(DesignKind::NoPovm)
    }

    /// Override the MUB construction method.
    pub fn with_method(mut self, method: MubMethod) -> Self {
        self.method = method;
        self
    }

    /// Override the finite-field backend.
    pub fn with_field_backend(mut self, backend: FieldBackendKind) -> Self {
        self.field_backend = backend;
        self
    }

    /// Number of operators this design has at dimension d.
    pub fn operator_count(&self, d: usize) -> usize {
        match (self.kind, self.variant) {
            (DesignKind::Mub, MubVariant::Full) => d * (d + 1),
            _ => d * d,
        }
    }

    /// Short name, e.g. `mub-compact`.
    pub fn name(&self) -> String {
        match (self.kind, self.variant) {
            (DesignKind::Mub, MubVariant::Full) => "mub-full".into(),
            (DesignKind::Mub, MubVariant::Compact) => "mub-compact".into(),
            (kind, _) => kind.to_string(),
        }
    }
}

impl Default for DesignSpec {
    fn default() -> Self {
        Self::mub()
    }
}

impl FromStr for DesignSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mub" | "mub-full" | "mub_full" => Ok(Self::mub()),
            "mub-compact" | "mub_compact" => Ok(Self::mub_compact()),
            "sic" => Ok(Self::sic()),
            "nopovm" | "no-povm" | "no_povm" => Ok(Self::nopovm()),
            other => Err(ConfigurationError::UnknownDesign(other.to_string()).into()),
        }
    }
}

/// A Hermitian measurement operator tagged with its group id.
#[derive(Debug, Clone)]
pub struct MeasurementOperator {
    /// Operator matrix (d × d).
    pub matrix: Array2<Complex64>,
    /// Measurement group (basis) id.
    pub group: usize,
}

impl MeasurementOperator {
    /// Rank-1 projector |ψ⟩⟨ψ| scaled by `weight`.
    pub fn projector(state: &Array1<Complex64>, weight: f64, group: usize) -> Self {
        let mut matrix = linalg::outer(state, state);
        if weight != 1.0 {
            matrix.mapv_inplace(|z| z * weight);
        }
        Self { matrix, group }
    }
}

/// An immutable, ordered set of measurement operators.
#[derive(Debug, Clone)]
pub struct MeasurementDesign {
    dimension: usize,
    spec: DesignSpec,
    operators: Vec<MeasurementOperator>,
    measurement_matrix: Array2<Complex64>,
}

impl MeasurementDesign {
    /// Build a design. Deterministic: the same arguments give the same
    /// operators in the same order.
    pub fn build(dimension: usize, spec: DesignSpec) -> Result<Self> {
        if dimension < 2 {
            return Err(ConfigurationError::InvalidDimension(dimension).into());
        }
        debug!(dimension, design = %spec.name(), "Building measurement design");

        let operators = match spec.kind {
            DesignKind::Mub => mub::build(dimension, &spec)?,
            DesignKind::Sic => sic::build(dimension)?,
            DesignKind::NoPovm => nopovm::build(dimension),
        };
        Ok(Self::from_operators(dimension, spec, operators))
    }

    fn from_operators(dimension: usize, spec: DesignSpec, operators: Vec<MeasurementOperator>) -> Self {
        let measurement_matrix = flatten_rows(&operators, dimension);
        Self {
            dimension,
            spec,
            operators,
            measurement_matrix,
        }
    }

    /// Hilbert-space dimension d.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The request this design was built from.
    pub fn spec(&self) -> &DesignSpec {
        &self.spec
    }

    /// Design family.
    pub fn kind(&self) -> DesignKind {
        self.spec.kind
    }

    /// Number of operators m.
    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }

    /// Operators in design order.
    pub fn operators(&self) -> &[MeasurementOperator] {
        &self.operators
    }

    /// m × d² matrix, row j = operator j flattened row-major.
    pub fn measurement_matrix(&self) -> &Array2<Complex64> {
        &self.measurement_matrix
    }

    /// Group id per operator.
    pub fn groups(&self) -> Vec<usize> {
        self.operators.iter().map(|op| op.group).collect()
    }

    /// Operator indices per group, groups in ascending id order.
    pub fn group_indices(&self) -> Vec<Vec<usize>> {
        let mut ids: Vec<usize> = self.groups();
        ids.sort_unstable();
        ids.dedup();
        ids.iter()
            .map(|&g| {
                self.operators
                    .iter()
                    .enumerate()
                    .filter(|(_, op)| op.group == g)
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect()
    }

    /// H = Σ_j M_j.
    pub fn operator_sum(&self) -> Array2<Complex64> {
        let d = self.dimension;
        self.operators
            .iter()
            .fold(Array2::<Complex64>::zeros((d, d)), |acc, op| acc + &op.matrix)
    }

    /// Whether the operators sum to the identity within `tolerance`.
    pub fn is_povm(&self, tolerance: f64) -> bool {
        let diff = self.operator_sum() - linalg::identity(self.dimension);
        diff.iter().all(|z| z.norm() <= tolerance)
    }

    /// Model probabilities q_j = Re Tr(M_j ρ).
    pub fn expected_probabilities(&self, rho: &Array2<Complex64>) -> Vec<f64> {
        self.operators
            .iter()
            .map(|op| linalg::trace_product(&op.matrix, rho).re)
            .collect()
    }

    /// Fail unless `observed` has one entry per operator.
    pub fn check_length(&self, observed: &[f64]) -> Result<()> {
        if observed.len() != self.operator_count() {
            return Err(Error::length_mismatch(self.operator_count(), observed.len()));
        }
        Ok(())
    }

    /// Divide each group's entries by the group sum.
    pub fn normalize_per_group(&self, observed: &[f64], tolerance: f64) -> Result<Vec<f64>> {
        self.check_length(observed)?;
        let mut out = observed.to_vec();
        for (g, indices) in self.group_indices().iter().enumerate() {
            let sum: f64 = indices.iter().map(|&j| observed[j]).sum();
            if sum.abs() <= tolerance {
                return Err(Error::Normalization(format!(
                    "group {} sums to {:.3e}; cannot normalize",
                    g, sum
                )));
            }
            for &j in indices {
                out[j] /= sum;
            }
        }
        Ok(out)
    }

    /// Divide the whole vector by the sum of its first d entries.
    ///
    /// For NoPOVM the leading d operators are the standard-basis projectors,
    /// which alone resolve the identity.
    pub fn normalize_leading_basis(&self, observed: &[f64], tolerance: f64) -> Result<Vec<f64>> {
        self.check_length(observed)?;
        let leading: f64 = observed.iter().take(self.dimension).sum();
        if leading.abs() <= tolerance {
            return Err(Error::Normalization(format!(
                "leading {} entries sum to {:.3e}; cannot normalize",
                self.dimension, leading
            )));
        }
        Ok(observed.iter().map(|v| v / leading).collect())
    }
}

fn flatten_rows(operators: &[MeasurementOperator], d: usize) -> Array2<Complex64> {
    let mut m = Array2::<Complex64>::zeros((operators.len(), d * d));
    for (j, op) in operators.iter().enumerate() {
        for ((a, b), &z) in op.matrix.indexed_iter() {
            m[[j, a * d + b]] = z;
        }
    }
    m
}

/// Infer d from the operator count m, testing m = d² before m = d(d+1).
///
/// The inferred shape must agree with `spec`: `mub-full` requires
/// m = d(d+1), every other design m = d².
pub fn infer_dimension(m: usize, spec: &DesignSpec) -> Result<usize> {
    let root = (m as f64).sqrt().round() as usize;
    if root >= 2 && root * root == m && spec.operator_count(root) == m {
        return Ok(root);
    }
    let mut d = 2;
    while d * (d + 1) <= m {
        if d * (d + 1) == m && spec.operator_count(d) == m {
            return Ok(d);
        }
        d += 1;
    }
    Err(Error::InputShape {
        expected: format!("operator count d² or d(d+1) for design '{}'", spec.name()),
        actual: format!("length {}", m),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_design_spec_parsing() {
        assert_eq!("mub".parse::<DesignSpec>().unwrap(), DesignSpec::mub());
        assert_eq!(
            "MUB-Compact".parse::<DesignSpec>().unwrap(),
            DesignSpec::mub_compact()
        );
        assert_eq!("nopovm".parse::<DesignSpec>().unwrap().kind, DesignKind::NoPovm);
        let err = "tetra".parse::<DesignSpec>().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_mub_defaults_to_full_variant() {
        assert_eq!(MubVariant::default(), MubVariant::Full);
        assert_eq!(DesignSpec::mub().variant, MubVariant::Full);
        assert_eq!(DesignSpec::mub().operator_count(3), 12);
    }

    #[test]
    fn test_dimension_below_two_rejected() {
        let err = MeasurementDesign::build(1, DesignSpec::nopovm()).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::InvalidDimension(1))
        ));
    }

    #[test]
    fn test_measurement_matrix_rows_are_flattened_operators() {
        let design = MeasurementDesign::build(3, DesignSpec::nopovm()).unwrap();
        let m = design.measurement_matrix();
        assert_eq!(m.dim(), (9, 9));
        for (j, op) in design.operators().iter().enumerate() {
            for a in 0..3 {
                for b in 0..3 {
                    assert_eq!(m[[j, a * 3 + b]], op.matrix[[a, b]]);
                }
            }
        }
    }

    #[test]
    fn test_normalize_per_group() {
        let design = MeasurementDesign::build(2, DesignSpec::mub()).unwrap();
        let observed = vec![30.0, 10.0, 5.0, 15.0, 1.0, 3.0];
        let p = design.normalize_per_group(&observed, 1e-10).unwrap();
        assert_relative_eq!(p[0], 0.75, epsilon = 1e-12);
        assert_relative_eq!(p[3], 0.75, epsilon = 1e-12);
        assert_relative_eq!(p[5], 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_zero_group_fails() {
        let design = MeasurementDesign::build(2, DesignSpec::mub()).unwrap();
        let observed = vec![1.0, 1.0, 0.0, 0.0, 1.0, 1.0];
        let err = design.normalize_per_group(&observed, 1e-10).unwrap_err();
        assert!(matches!(err, Error::Normalization(_)));
    }

    #[test]
    fn test_wrong_length_is_input_shape_error() {
        let design = MeasurementDesign::build(4, DesignSpec::nopovm()).unwrap();
        let observed = vec![1.0; 15];
        let err = design.normalize_per_group(&observed, 1e-10).unwrap_err();
        assert!(matches!(err, Error::InputShape { .. }));
    }

    #[test]
    fn test_leading_basis_normalization() {
        let design = MeasurementDesign::build(2, DesignSpec::nopovm()).unwrap();
        let p = design
            .normalize_leading_basis(&[2.0, 2.0, 3.0, 1.0], 1e-10)
            .unwrap();
        assert_eq!(p, vec![0.5, 0.5, 0.75, 0.25]);
    }

    #[test]
    fn test_infer_dimension() {
        assert_eq!(infer_dimension(16, &DesignSpec::nopovm()).unwrap(), 4);
        assert_eq!(infer_dimension(20, &DesignSpec::mub()).unwrap(), 4);
        assert_eq!(infer_dimension(6, &DesignSpec::mub()).unwrap(), 2);
        assert_eq!(infer_dimension(9, &DesignSpec::mub_compact()).unwrap(), 3);
        assert!(infer_dimension(15, &DesignSpec::nopovm()).is_err());
        assert!(infer_dimension(16, &DesignSpec::mub()).is_err());
    }

    #[test]
    fn test_expected_probabilities_of_basis_state() {
        let design = MeasurementDesign::build(2, DesignSpec::mub()).unwrap();
        let mut rho = Array2::<Complex64>::zeros((2, 2));
        rho[[0, 0]] = Complex64::new(1.0, 0.0);
        let q = design.expected_probabilities(&rho);
        assert_relative_eq!(q[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(q[1], 0.0, epsilon = 1e-12);
        for &v in &q[2..] {
            assert_relative_eq!(v, 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_povm_property_by_family() {
        let mub = MeasurementDesign::build(3, DesignSpec::mub()).unwrap();
        // Full MUB: d+1 bases each resolving the identity.
        let h = mub.operator_sum();
        assert_relative_eq!(h[[0, 0]].re, 4.0, epsilon = 1e-10);
        assert!(!mub.is_povm(1e-10));

        let sic = MeasurementDesign::build(2, DesignSpec::sic()).unwrap();
        assert!(sic.is_povm(1e-10));

        let nopovm = MeasurementDesign::build(3, DesignSpec::nopovm()).unwrap();
        assert!(!nopovm.is_povm(1e-6));
    }
}
