// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Physically constrained density matrices.
//!
//! A [`PhysicalDensityMatrix`] wraps a complex d × d matrix and enforces the
//! density-matrix constraints (Hermitian, positive semidefinite, unit trace)
//! according to an [`EnforceMode`] fixed at construction.
//!
//! All checks use an adaptive tolerance
//!
//!   tol = max(user_tol, K · n · ε · max(1, ‖A‖₂))
//!
//! with K = [`K_FACTOR`], n the dimension and ε machine epsilon, so that the
//! accepted round-off grows with dimension and operator norm.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigurationError, Error, Result};
use crate::linalg::{self, HermitianEigen};

/// Sensitivity constant of the adaptive tolerance.
pub const K_FACTOR: f64 = 50.0;

/// Default absolute tolerance.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Decimal places kept by [`PhysicalDensityMatrix::fidelity`].
pub const FIDELITY_DECIMALS: i32 = 8;

// Input deviations above these are reported rather than silently absorbed.
const HERMITIAN_SIGNIFICANCE: f64 = 1e-6;
const TRACE_SIGNIFICANCE: f64 = 1e-6;
const IMAG_TRACE_SIGNIFICANCE: f64 = 1e-9;
const NEGATIVE_EIGENVALUE_FACTOR: f64 = 10.0;

/// Default relative threshold for [`PhysicalDensityMatrix::is_hermitian`].
const DEFAULT_HERMITIAN_TOLERANCE: f64 = 1e-6;

/// Adaptive tolerance max(user_tol, K · n · ε · max(1, ‖A‖₂)).
pub fn adaptive_tolerance(n: usize, spectral_norm: f64, user_tol: f64) -> f64 {
    user_tol.max(K_FACTOR * n as f64 * f64::EPSILON * spectral_norm.max(1.0))
}

/// How physicality is enforced at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforceMode {
    /// Repair round-off, report significant violations.
    #[default]
    WithinTol,
    /// Clip every negative eigenvalue and renormalize, silently.
    Project,
    /// Keep the input unchanged.
    None,
}

impl fmt::Display for EnforceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnforceMode::WithinTol => write!(f, "within_tol"),
            EnforceMode::Project => write!(f, "project"),
            EnforceMode::None => write!(f, "none"),
        }
    }
}

impl FromStr for EnforceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "within_tol" | "within-tol" => Ok(EnforceMode::WithinTol),
            "project" => Ok(EnforceMode::Project),
            "none" => Ok(EnforceMode::None),
            other => Err(ConfigurationError::invalid(
                "enforce",
                format!("unknown mode '{}'", other),
            )
            .into()),
        }
    }
}

/// Construction options for [`PhysicalDensityMatrix`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityOptions {
    /// User tolerance (lower bound of the adaptive tolerance).
    pub tolerance: f64,
    /// Enforcement mode.
    pub enforce: EnforceMode,
    /// Return an error instead of warning on significant violations.
    pub strict: bool,
    /// Emit a `tracing` warning on significant violations.
    pub warn: bool,
}

impl Default for DensityOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            enforce: EnforceMode::WithinTol,
            strict: false,
            warn: true,
        }
    }
}

impl DensityOptions {
    /// Options with the given enforcement mode and defaults otherwise.
    pub fn with_enforce(enforce: EnforceMode) -> Self {
        Self {
            enforce,
            ..Self::default()
        }
    }

    /// Same options without warnings.
    pub fn quiet(self) -> Self {
        Self { warn: false, ..self }
    }

    /// Validate option values.
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConfigurationError::invalid("tolerance", "must be finite and > 0").into());
        }
        Ok(())
    }
}

/// Raw physicality metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalDiagnostics {
    pub min_eigenvalue: f64,
    pub max_eigenvalue: f64,
    pub trace_real: f64,
    pub trace_imag: f64,
    /// ‖A − A†‖_F / ‖A‖_F
    pub hermitian_residual: f64,
    /// ‖A − A†‖_F
    pub hermitian_residual_abs: f64,
    pub effective_tolerance: f64,
    pub is_hermitian: bool,
    pub is_positive_semidefinite: bool,
    pub is_normalized: bool,
    pub is_physical: bool,
    pub enforce_mode: EnforceMode,
}

/// A density matrix with enforced (or reported) physicality.
#[derive(Debug, Clone)]
pub struct PhysicalDensityMatrix {
    matrix: Array2<Complex64>,
    options: DensityOptions,
    /// Spectrum of the Hermitian part of `matrix`.
    spectrum: HermitianEigen,
}

impl PhysicalDensityMatrix {
    /// Wrap `matrix`, enforcing physicality according to `options`.
    pub fn new(matrix: Array2<Complex64>, options: DensityOptions) -> Result<Self> {
        validate_matrix(&matrix)?;
        options.validate()?;

        let matrix = match options.enforce {
            EnforceMode::WithinTol => sanitize_within_tol(&matrix, &options)?,
            EnforceMode::Project => Self::project_to_physical(&matrix, options.tolerance)?,
            EnforceMode::None => matrix,
        };
        let spectrum = linalg::eigh(&matrix)?;
        Ok(Self {
            matrix,
            options,
            spectrum,
        })
    }

    /// I/d.
    pub fn maximally_mixed(dimension: usize, options: DensityOptions) -> Result<Self> {
        if dimension == 0 {
            return Err(ConfigurationError::InvalidDimension(dimension).into());
        }
        let rho = Array2::from_diag_elem(dimension, Complex64::new(1.0 / dimension as f64, 0.0));
        Self::new(rho, options)
    }

    /// |ψ⟩⟨ψ| / ⟨ψ|ψ⟩.
    pub fn pure_state(state: &Array1<Complex64>, options: DensityOptions) -> Result<Self> {
        let norm_sqr: f64 = state.iter().map(|z| z.norm_sqr()).sum();
        if norm_sqr <= 0.0 || !norm_sqr.is_finite() {
            return Err(Error::Normalization("state vector has zero norm".into()));
        }
        let mut rho = linalg::outer(state, state);
        rho.mapv_inplace(|z| z / norm_sqr);
        Self::new(rho, options)
    }

    /// Row-major reshape of a length-d² solution vector, complex-conjugated.
    ///
    /// Rows of the measurement matrix are flattened operators, so M·x = p
    /// solves for the transpose of ρ; for Hermitian ρ that is conj(ρ).
    pub fn from_linear_vector(
        vector: &Array1<Complex64>,
        dimension: usize,
        options: DensityOptions,
    ) -> Result<Self> {
        Self::new(reshape_conjugate(vector, dimension)?, options)
    }

    /// Underlying matrix.
    pub fn matrix(&self) -> &Array2<Complex64> {
        &self.matrix
    }

    /// Consume and return the matrix.
    pub fn into_matrix(self) -> Array2<Complex64> {
        self.matrix
    }

    /// Dimension d.
    pub fn dimension(&self) -> usize {
        self.matrix.nrows()
    }

    /// Construction options.
    pub fn options(&self) -> &DensityOptions {
        &self.options
    }

    /// Enforcement mode (fixed at construction).
    pub fn enforce_mode(&self) -> EnforceMode {
        self.options.enforce
    }

    /// Tr(ρ).
    pub fn trace(&self) -> Complex64 {
        linalg::trace(&self.matrix)
    }

    /// Tr(ρ²).
    pub fn purity(&self) -> f64 {
        linalg::trace_product(&self.matrix, &self.matrix).re
    }

    /// Adaptive tolerance of this matrix with its own user tolerance.
    pub fn adaptive_tolerance(&self) -> f64 {
        adaptive_tolerance(
            self.dimension(),
            self.spectrum.spectral_norm(),
            self.options.tolerance,
        )
    }

    /// Eigenvalues in descending order, values below tolerance set to zero.
    pub fn eigenvalues(&self) -> Vec<f64> {
        let tol = self.adaptive_tolerance();
        self.spectrum
            .values
            .iter()
            .rev()
            .map(|&v| if v < tol { 0.0 } else { v })
            .collect()
    }

    fn effective_tolerance(&self, tol: Option<f64>, use_auto: bool) -> f64 {
        let auto = self.adaptive_tolerance();
        match (tol, use_auto) {
            (Some(t), true) => t.max(auto),
            (Some(t), false) => t,
            (None, _) => auto,
        }
    }

    /// Relative residual ‖A − A†‖_F / ‖A‖_F ≤ tol (default 1e-6). With
    /// `use_auto` the threshold is raised to at least K · n · ε.
    pub fn is_hermitian(&self, tol: Option<f64>, use_auto: bool) -> bool {
        let mut threshold = tol.unwrap_or(DEFAULT_HERMITIAN_TOLERANCE);
        if use_auto {
            threshold = threshold.max(adaptive_tolerance(self.dimension(), 1.0, 0.0));
        }
        hermitian_residual(&self.matrix) <= threshold
    }

    /// min eig ≥ −tol.
    pub fn is_positive_semidefinite(&self, tol: Option<f64>, use_auto: bool) -> bool {
        self.spectrum.min() >= -self.effective_tolerance(tol, use_auto)
    }

    /// |Re Tr(ρ) − 1| ≤ tol.
    pub fn is_normalized(&self, tol: Option<f64>, use_auto: bool) -> bool {
        (self.trace().re - 1.0).abs() <= self.effective_tolerance(tol, use_auto)
    }

    /// Positive semidefinite and normalized.
    pub fn is_physical(&self, tol: Option<f64>, use_auto: bool) -> bool {
        self.is_positive_semidefinite(tol, use_auto) && self.is_normalized(tol, use_auto)
    }

    /// All raw metrics and checks.
    pub fn diagnostics(&self, tol: Option<f64>, use_auto: bool) -> PhysicalDiagnostics {
        let tr = self.trace();
        let diff = &self.matrix - &linalg::dagger(&self.matrix);
        PhysicalDiagnostics {
            min_eigenvalue: self.spectrum.min(),
            max_eigenvalue: self.spectrum.max(),
            trace_real: tr.re,
            trace_imag: tr.im,
            hermitian_residual: hermitian_residual(&self.matrix),
            hermitian_residual_abs: linalg::frobenius_norm(&diff),
            effective_tolerance: self.effective_tolerance(tol, use_auto),
            is_hermitian: self.is_hermitian(tol, use_auto),
            is_positive_semidefinite: self.is_positive_semidefinite(tol, use_auto),
            is_normalized: self.is_normalized(tol, use_auto),
            is_physical: self.is_physical(tol, use_auto),
            enforce_mode: self.options.enforce,
        }
    }

    /// Re-run the within-tolerance repair on the stored matrix.
    pub fn sanitize_within_tol(&mut self) -> Result<()> {
        self.matrix = sanitize_within_tol(&self.matrix, &self.options)?;
        self.spectrum = linalg::eigh(&self.matrix)?;
        Ok(())
    }

    /// Force `matrix` onto the set of density matrices: clip all negative
    /// eigenvalues, renormalize, fall back to I/n if nothing is left.
    pub fn project_to_physical(
        matrix: &Array2<Complex64>,
        tolerance: f64,
    ) -> Result<Array2<Complex64>> {
        validate_matrix(matrix)?;
        let n = matrix.nrows();
        let eig = linalg::eigh(matrix)?;
        let tol = adaptive_tolerance(n, eig.spectral_norm(), tolerance);

        let clipped: Vec<f64> = eig.values.iter().map(|&v| v.max(0.0)).collect();
        let sum: f64 = clipped.iter().sum();
        let values: Vec<f64> = if sum <= tol {
            vec![1.0 / n as f64; n]
        } else {
            clipped.iter().map(|v| v / sum).collect()
        };

        Ok(renormalize_trace(linalg::hermitian_part(&eig.reconstruct(&values))))
    }

    /// Principal square root via eigendecomposition, eigenvalues below the
    /// adaptive tolerance treated as zero.
    pub fn matrix_square_root(&self, matrix: &Array2<Complex64>) -> Result<Array2<Complex64>> {
        let eig = linalg::eigh(matrix)?;
        let tol = adaptive_tolerance(matrix.nrows(), eig.spectral_norm(), self.options.tolerance);
        let roots: Vec<f64> = eig
            .values
            .iter()
            .map(|&v| if v < tol { 0.0 } else { v.sqrt() })
            .collect();
        Ok(linalg::hermitian_part(&eig.reconstruct(&roots)))
    }

    /// Uhlmann fidelity F = [Tr √(√ρ₁ ρ₂ √ρ₁)]², rounded to
    /// [`FIDELITY_DECIMALS`] places.
    pub fn fidelity(&self, other: &PhysicalDensityMatrix) -> Result<f64> {
        if self.dimension() != other.dimension() {
            return Err(Error::InputShape {
                expected: format!("dimension {}", self.dimension()),
                actual: format!("dimension {}", other.dimension()),
            });
        }
        let sqrt_rho = self.matrix_square_root(&self.matrix)?;
        let inner = sqrt_rho.dot(&other.matrix).dot(&sqrt_rho);
        let sqrt_inner = self.matrix_square_root(&inner)?;
        let f = linalg::trace(&sqrt_inner).re.powi(2);
        let scale = 10f64.powi(FIDELITY_DECIMALS);
        Ok((f * scale).round() / scale)
    }

    /// Element-wise real part.
    pub fn real_part(&self) -> Array2<f64> {
        self.matrix.mapv(|z| z.re)
    }

    /// Element-wise imaginary part.
    pub fn imag_part(&self) -> Array2<f64> {
        self.matrix.mapv(|z| z.im)
    }

    /// Element-wise modulus.
    pub fn amplitude(&self) -> Array2<f64> {
        self.matrix.mapv(|z| z.norm())
    }

    /// Element-wise argument.
    pub fn phase(&self) -> Array2<f64> {
        self.matrix.mapv(|z| z.arg())
    }
}

pub(crate) fn reshape_conjugate(
    vector: &Array1<Complex64>,
    dimension: usize,
) -> Result<Array2<Complex64>> {
    if vector.len() != dimension * dimension {
        return Err(Error::length_mismatch(dimension * dimension, vector.len()));
    }
    Ok(Array2::from_shape_fn((dimension, dimension), |(i, j)| {
        vector[i * dimension + j].conj()
    }))
}

fn validate_matrix(matrix: &Array2<Complex64>) -> Result<()> {
    let (rows, cols) = matrix.dim();
    if rows == 0 || rows != cols {
        return Err(Error::InputShape {
            expected: "non-empty square matrix".into(),
            actual: format!("{}x{}", rows, cols),
        });
    }
    if let Some(((i, j), _)) = matrix
        .indexed_iter()
        .find(|(_, z)| !z.re.is_finite() || !z.im.is_finite())
    {
        return Err(Error::InputShape {
            expected: "finite entries".into(),
            actual: format!("non-finite value at ({}, {})", i, j),
        });
    }
    Ok(())
}

fn hermitian_residual(matrix: &Array2<Complex64>) -> f64 {
    let diff = matrix - &linalg::dagger(matrix);
    linalg::frobenius_norm(&diff) / (linalg::frobenius_norm(matrix) + 1e-30)
}

fn renormalize_trace(rho: Array2<Complex64>) -> Array2<Complex64> {
    let n = rho.nrows();
    let tr = linalg::trace(&rho).re;
    if tr <= 0.0 {
        Array2::from_diag_elem(n, Complex64::new(1.0 / n as f64, 0.0))
    } else {
        rho.mapv(|z| z / tr)
    }
}

fn report(options: &DensityOptions, message: String) -> Result<()> {
    if options.strict {
        return Err(Error::Physicality(message));
    }
    if options.warn {
        warn!("{}", message);
    }
    Ok(())
}

/// Symmetrize, diagnose, clip eigenvalues below tolerance, renormalize.
fn sanitize_within_tol(
    matrix: &Array2<Complex64>,
    options: &DensityOptions,
) -> Result<Array2<Complex64>> {
    let n = matrix.nrows();
    let eig = linalg::eigh(matrix)?;
    let tol = adaptive_tolerance(n, eig.spectral_norm(), options.tolerance);

    let herm_res = hermitian_residual(matrix);
    let tr = linalg::trace(matrix);
    let tr_dev = (tr.re - 1.0).abs();
    let tr_im = tr.im.abs();
    if herm_res > HERMITIAN_SIGNIFICANCE
        || tr_dev > TRACE_SIGNIFICANCE
        || tr_im > IMAG_TRACE_SIGNIFICANCE
    {
        report(
            options,
            format!(
                "input deviates from physical constraints: hermitian_residual={:.2e}, \
                 trace_deviation={:.2e}, imag_trace={:.2e}; use enforce=project to force projection",
                herm_res, tr_dev, tr_im
            ),
        )?;
    }

    let min_eig = eig.min();
    if min_eig < -NEGATIVE_EIGENVALUE_FACTOR * tol {
        report(
            options,
            format!(
                "significant negative eigenvalue {:.3e} < -{}*tol ({:.1e}); use enforce=project to force projection",
                min_eig, NEGATIVE_EIGENVALUE_FACTOR, tol
            ),
        )?;
    }

    let clipped: Vec<f64> = eig
        .values
        .iter()
        .map(|&v| if v < tol { 0.0 } else { v })
        .collect();
    let sum: f64 = clipped.iter().sum();
    let values: Vec<f64> = if sum <= tol {
        vec![1.0 / n as f64; n]
    } else {
        clipped.iter().map(|v| v / sum).collect()
    };

    Ok(renormalize_trace(linalg::hermitian_part(&eig.reconstruct(&values))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_matrix_close, c, random_density, random_hermitian, seeded_rng};
    use approx::assert_relative_eq;

    fn diag(values: &[f64]) -> Array2<Complex64> {
        Array2::from_diag(&Array1::from_iter(values.iter().map(|&v| c(v, 0.0))))
    }

    fn ket(values: &[(f64, f64)]) -> Array1<Complex64> {
        Array1::from_iter(values.iter().map(|&(re, im)| c(re, im)))
    }

    // =========================================================================
    // Construction
    // =========================================================================

    #[test]
    fn test_valid_state_is_unchanged() {
        let mut rng = seeded_rng(7);
        let rho = random_density(&mut rng, 3, 3);
        let dm = PhysicalDensityMatrix::new(rho.clone(), DensityOptions::default()).unwrap();
        assert_matrix_close(dm.matrix(), &rho, 1e-12);
    }

    #[test]
    fn test_rejects_non_square() {
        let err = PhysicalDensityMatrix::new(Array2::zeros((2, 3)), DensityOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InputShape { .. }));
    }

    #[test]
    fn test_rejects_empty_and_non_finite() {
        assert!(PhysicalDensityMatrix::new(Array2::zeros((0, 0)), DensityOptions::default()).is_err());
        let mut m = diag(&[0.5, 0.5]);
        m[[0, 1]] = c(f64::NAN, 0.0);
        assert!(PhysicalDensityMatrix::new(m, DensityOptions::default()).is_err());
    }

    #[test]
    fn test_rejects_non_positive_tolerance() {
        let options = DensityOptions {
            tolerance: 0.0,
            ..DensityOptions::default()
        };
        let err = PhysicalDensityMatrix::new(diag(&[1.0, 0.0]), options).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_within_tol_clips_round_off() {
        let dm = PhysicalDensityMatrix::new(diag(&[1.0 + 1e-13, -1e-13]), DensityOptions::default())
            .unwrap();
        assert!(dm.spectrum.min() >= 0.0 - 1e-15);
        assert_relative_eq!(dm.trace().re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_within_tol_strict_rejects_non_hermitian() {
        let mut m = diag(&[0.5, 0.5]);
        m[[0, 1]] = c(0.3, 0.0);
        let options = DensityOptions {
            strict: true,
            ..DensityOptions::default()
        };
        let err = PhysicalDensityMatrix::new(m, options).unwrap_err();
        assert!(matches!(err, Error::Physicality(_)));
    }

    #[test]
    fn test_within_tol_strict_rejects_negative_eigenvalue() {
        let options = DensityOptions {
            strict: true,
            ..DensityOptions::default()
        };
        let err = PhysicalDensityMatrix::new(diag(&[1.1, -0.1]), options).unwrap_err();
        assert!(matches!(err, Error::Physicality(_)));
    }

    #[test]
    fn test_within_tol_non_strict_still_returns_physical() {
        let dm = PhysicalDensityMatrix::new(diag(&[1.2, -0.1, -0.1]), DensityOptions::default().quiet())
            .unwrap();
        assert!(dm.is_physical(None, true));
        assert_relative_eq!(dm.matrix()[[0, 0]].re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_within_tol_collapse_falls_back_to_maximally_mixed() {
        let dm = PhysicalDensityMatrix::new(diag(&[-0.5, -0.5]), DensityOptions::default().quiet())
            .unwrap();
        assert_matrix_close(dm.matrix(), &diag(&[0.5, 0.5]), 1e-12);
    }

    #[test]
    fn test_none_mode_keeps_raw_input() {
        let m = diag(&[1.5, -0.5]);
        let dm = PhysicalDensityMatrix::new(m.clone(), DensityOptions::with_enforce(EnforceMode::None))
            .unwrap();
        assert_matrix_close(dm.matrix(), &m, 0.0);
        assert!(!dm.is_physical(None, true));
        assert_eq!(dm.enforce_mode(), EnforceMode::None);
    }

    #[test]
    fn test_project_mode_never_errors_in_strict() {
        let options = DensityOptions {
            enforce: EnforceMode::Project,
            strict: true,
            ..DensityOptions::default()
        };
        let dm = PhysicalDensityMatrix::new(diag(&[3.0, -2.0]), options).unwrap();
        assert_matrix_close(dm.matrix(), &diag(&[1.0, 0.0]), 1e-12);
    }

    // =========================================================================
    // Properties
    // =========================================================================

    #[test]
    fn test_project_is_idempotent() {
        let mut rng = seeded_rng(11);
        for d in 2..6 {
            let h = random_hermitian(&mut rng, d);
            let once = PhysicalDensityMatrix::project_to_physical(&h, 1e-10).unwrap();
            let twice = PhysicalDensityMatrix::project_to_physical(&once, 1e-10).unwrap();
            assert_matrix_close(&once, &twice, 1e-12);
        }
    }

    #[test]
    fn test_tolerance_monotonicity() {
        let m = diag(&[1.0 + 2e-8, -1e-8, -1e-8]);
        let dm = PhysicalDensityMatrix::new(m, DensityOptions::with_enforce(EnforceMode::None)).unwrap();
        assert!(dm.is_physical(Some(1e-6), false));
        assert!(!dm.is_physical(Some(1e-12), false));

        let mut rng = seeded_rng(3);
        for _ in 0..10 {
            let h = random_hermitian(&mut rng, 3);
            let dm = PhysicalDensityMatrix::new(h, DensityOptions::with_enforce(EnforceMode::None))
                .unwrap();
            for use_auto in [true, false] {
                if dm.is_physical(Some(1e-12), use_auto) {
                    assert!(dm.is_physical(Some(1e-6), use_auto));
                }
            }
        }
    }

    #[test]
    fn test_enforced_trace_and_eigenvalue_bounds() {
        let mut rng = seeded_rng(5);
        for mode in [EnforceMode::WithinTol, EnforceMode::Project] {
            for d in 2..6 {
                let h = random_hermitian(&mut rng, d);
                let dm = PhysicalDensityMatrix::new(h, DensityOptions::with_enforce(mode).quiet())
                    .unwrap();
                assert!((dm.trace().re - 1.0).abs() < 1e-9);
                let diag = dm.diagnostics(None, true);
                assert!(diag.min_eigenvalue >= -diag.effective_tolerance);
                assert!(diag.is_physical);
            }
        }
    }

    #[test]
    fn test_resanitize_in_place() {
        let mut dm = PhysicalDensityMatrix::new(diag(&[0.7, 0.3]), DensityOptions::default()).unwrap();
        dm.sanitize_within_tol().unwrap();
        assert!(dm.is_physical(None, true));
        assert_eq!(dm.enforce_mode(), EnforceMode::WithinTol);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[test]
    fn test_maximally_mixed_purity() {
        for d in 2..6 {
            let dm = PhysicalDensityMatrix::maximally_mixed(d, DensityOptions::default()).unwrap();
            assert_relative_eq!(dm.purity(), 1.0 / d as f64, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_eigenvalues_descending() {
        let dm = PhysicalDensityMatrix::new(diag(&[0.2, 0.5, 0.3]), DensityOptions::default()).unwrap();
        let ev = dm.eigenvalues();
        assert_relative_eq!(ev[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(ev[1], 0.3, epsilon = 1e-12);
        assert_relative_eq!(ev[2], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_is_hermitian_relative_threshold() {
        let mut m = diag(&[0.5, 0.5]);
        m[[0, 1]] = c(1e-9, 0.0);
        let dm = PhysicalDensityMatrix::new(m, DensityOptions::with_enforce(EnforceMode::None)).unwrap();
        assert!(dm.is_hermitian(None, false));
        assert!(!dm.is_hermitian(Some(1e-12), false));
    }

    #[test]
    fn test_diagnostics_fields() {
        let dm = PhysicalDensityMatrix::new(diag(&[0.6, 0.4]), DensityOptions::default()).unwrap();
        let d = dm.diagnostics(Some(1e-8), true);
        assert_relative_eq!(d.min_eigenvalue, 0.4, epsilon = 1e-12);
        assert_relative_eq!(d.max_eigenvalue, 0.6, epsilon = 1e-12);
        assert_relative_eq!(d.trace_real, 1.0, epsilon = 1e-12);
        assert!(d.effective_tolerance >= 1e-8);
        assert!(d.is_hermitian && d.is_physical);
    }

    #[test]
    fn test_pure_state_normalizes() {
        let dm = PhysicalDensityMatrix::pure_state(&ket(&[(2.0, 0.0), (0.0, 2.0)]), DensityOptions::default())
            .unwrap();
        assert_relative_eq!(dm.purity(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(dm.matrix()[[0, 1]].im, -0.5, epsilon = 1e-12);
        assert!(PhysicalDensityMatrix::pure_state(&ket(&[(0.0, 0.0)]), DensityOptions::default()).is_err());
    }

    #[test]
    fn test_from_linear_vector_conjugates() {
        let x = ket(&[(0.5, 0.0), (0.1, 0.2), (0.1, -0.2), (0.5, 0.0)]);
        let dm = PhysicalDensityMatrix::from_linear_vector(&x, 2, DensityOptions::with_enforce(EnforceMode::None))
            .unwrap();
        assert_eq!(dm.matrix()[[0, 1]], c(0.1, -0.2));
        assert!(PhysicalDensityMatrix::from_linear_vector(&x, 3, DensityOptions::default()).is_err());
    }

    // =========================================================================
    // Fidelity
    // =========================================================================

    #[test]
    fn test_fidelity_identical_and_orthogonal() {
        let zero = PhysicalDensityMatrix::pure_state(&ket(&[(1.0, 0.0), (0.0, 0.0)]), DensityOptions::default())
            .unwrap();
        let one = PhysicalDensityMatrix::pure_state(&ket(&[(0.0, 0.0), (1.0, 0.0)]), DensityOptions::default())
            .unwrap();
        let plus = PhysicalDensityMatrix::pure_state(&ket(&[(1.0, 0.0), (1.0, 0.0)]), DensityOptions::default())
            .unwrap();
        assert_relative_eq!(zero.fidelity(&zero).unwrap(), 1.0, epsilon = 1e-8);
        assert_relative_eq!(zero.fidelity(&one).unwrap(), 0.0, epsilon = 1e-8);
        assert_relative_eq!(zero.fidelity(&plus).unwrap(), 0.5, epsilon = 1e-8);
    }

    #[test]
    fn test_fidelity_mixed_states_symmetric() {
        let mut rng = seeded_rng(21);
        let a = PhysicalDensityMatrix::new(random_density(&mut rng, 3, 2), DensityOptions::default()).unwrap();
        let b = PhysicalDensityMatrix::new(random_density(&mut rng, 3, 3), DensityOptions::default()).unwrap();
        let fab = a.fidelity(&b).unwrap();
        let fba = b.fidelity(&a).unwrap();
        assert!(fab > 0.0 && fab <= 1.0);
        assert_relative_eq!(fab, fba, epsilon = 1e-6);
    }

    #[test]
    fn test_fidelity_dimension_mismatch() {
        let a = PhysicalDensityMatrix::maximally_mixed(2, DensityOptions::default()).unwrap();
        let b = PhysicalDensityMatrix::maximally_mixed(3, DensityOptions::default()).unwrap();
        assert!(matches!(a.fidelity(&b), Err(Error::InputShape { .. })));
    }

    #[test]
    fn test_enforce_mode_parsing() {
        assert_eq!("project".parse::<EnforceMode>().unwrap(), EnforceMode::Project);
        assert_eq!("WITHIN_TOL".parse::<EnforceMode>().unwrap(), EnforceMode::WithinTol);
        assert!("clip".parse::<EnforceMode>().is_err());
        assert_eq!(EnforceMode::None.to_string(), "none");
    }
}
