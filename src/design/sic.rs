// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Qubit SIC-POVM.
//!
//! The four tetrahedral states |0⟩ and (|0⟩ + √2 ω^k |1⟩)/√3 for k = 0, 1, 2
//! with ω = e^{2πi/3}. Each projector is weighted by 1/d so the set sums to
//! the identity.

use std::f64::consts::PI;

use ndarray::Array1;
use num_complex::Complex64;

use super::MeasurementOperator;
use crate::error::{ConfigurationError, Result};

pub(super) fn build(dimension: usize) -> Result<Vec<MeasurementOperator>> {
    if dimension != 2 {
        return Err(ConfigurationError::NotImplemented(format!(
            "SIC-POVM is only implemented for d = 2, got d = {}",
            dimension
        ))
        .into());
    }

    let weight = 1.0 / dimension as f64;
    let a = 1.0 / 3f64.sqrt();
    let b = (2.0 / 3.0f64).sqrt();

    let mut states = vec![Array1::from(vec![Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)])];
    for k in 0..3 {
        let omega = Complex64::from_polar(1.0, 2.0 * PI * k as f64 / 3.0);
        states.push(Array1::from(vec![Complex64::new(a, 0.0), omega * b]));
    }

    Ok(states
        .iter()
        .map(|s| MeasurementOperator::projector(s, weight, 0))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{DesignSpec, MeasurementDesign};
    use crate::error::Error;
    use crate::linalg;
    use approx::assert_relative_eq;

    #[test]
    fn test_sic_qubit_is_povm() {
        let ops = build(2).unwrap();
        assert_eq!(ops.len(), 4);
        let sum = ops
            .iter()
            .fold(ndarray::Array2::<Complex64>::zeros((2, 2)), |acc, op| acc + &op.matrix);
        let diff = sum - linalg::identity(2);
        assert!(diff.iter().all(|z| z.norm() < 1e-12));
    }

    #[test]
    fn test_sic_overlaps_are_symmetric() {
        let ops = build(2).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                // Tr(Π_i Π_j) with Π = 2·M: 1 on the diagonal, 1/3 off it.
                let t = linalg::trace_product(&ops[i].matrix, &ops[j].matrix).re * 4.0;
                let expected = if i == j { 1.0 } else { 1.0 / 3.0 };
                assert_relative_eq!(t, expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_sic_higher_dimension_is_configuration_error() {
        let err = MeasurementDesign::build(3, DesignSpec::sic()).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::NotImplemented(_))
        ));
    }
}
