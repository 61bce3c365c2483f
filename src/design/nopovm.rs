// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Standard-plus-combination design (not a POVM).
//!
//! d standard-basis projectors followed by, for each pair i < j, the
//! projectors onto (|i⟩ + |j⟩)/√2 and (|i⟩ − i|j⟩)/√2. That is d² operators
//! in a single group; Σ_j M_j ≠ I.

use std::f64::consts::FRAC_1_SQRT_2;

use ndarray::Array1;
use num_complex::Complex64;

use super::MeasurementOperator;

pub(super) fn build(dimension: usize) -> Vec<MeasurementOperator> {
    let d = dimension;
    let mut states = Vec::with_capacity(d * d);

    for i in 0..d {
        let mut e = Array1::zeros(d);
        e[i] = Complex64::new(1.0, 0.0);
        states.push(e);
    }
    for i in 0..d.saturating_sub(1) {
        for j in (i + 1)..d {
            let mut plus = Array1::zeros(d);
            plus[i] = Complex64::new(FRAC_1_SQRT_2, 0.0);
            plus[j] = Complex64::new(FRAC_1_SQRT_2, 0.0);
            states.push(plus);

            let mut minus_i = Array1::zeros(d);
            minus_i[i] = Complex64::new(FRAC_1_SQRT_2, 0.0);
            minus_i[j] = Complex64::new(0.0, -FRAC_1_SQRT_2);
            states.push(minus_i);
        }
    }

    states
        .iter()
        .map(|s| MeasurementOperator::projector(s, 1.0, 0))
        .collect()
}
