// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Estimator-agnostic reconstruction interface.
//!
//! [`Reconstructor`] lets a batch driver hold any estimator behind a trait
//! object; [`ReconstructionRecord`] is the flat, serializable form handed to
//! persistence layers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::density::PhysicalDensityMatrix;
use crate::design::MeasurementDesign;
use crate::error::{ConfigurationError, Error, Result};
use crate::linear::{LinearEstimator, LinearResult};
use crate::rhor::{RhoREstimator, RhoRResult};
use crate::wls::{WlsEstimator, WlsResult};

/// Reconstruction method tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructionMethod {
    /// Linear inversion.
    Linear,
    /// Weighted least squares.
    Wls,
    /// Strict RρR maximum likelihood.
    Rhor,
}

impl fmt::Display for ReconstructionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconstructionMethod::Linear => write!(f, "linear"),
            ReconstructionMethod::Wls => write!(f, "wls"),
            ReconstructionMethod::Rhor => write!(f, "rhor"),
        }
    }
}

impl FromStr for ReconstructionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(ReconstructionMethod::Linear),
            "wls" => Ok(ReconstructionMethod::Wls),
            "rhor" | "mle" => Ok(ReconstructionMethod::Rhor),
            other => Err(ConfigurationError::invalid(
                "method",
                format!("unknown reconstruction method '{}'", other),
            )
            .into()),
        }
    }
}

/// Output of any estimator.
#[derive(Debug, Clone)]
pub enum Reconstruction {
    /// Linear inversion result.
    Linear(LinearResult),
    /// WLS result.
    Wls(WlsResult),
    /// RρR result.
    Rhor(RhoRResult),
}

impl Reconstruction {
    /// Method that produced this result.
    pub fn method(&self) -> ReconstructionMethod {
        match self {
            Reconstruction::Linear(_) => ReconstructionMethod::Linear,
            Reconstruction::Wls(_) => ReconstructionMethod::Wls,
            Reconstruction::Rhor(_) => ReconstructionMethod::Rhor,
        }
    }

    /// The reconstructed density matrix.
    pub fn density(&self) -> &PhysicalDensityMatrix {
        match self {
            Reconstruction::Linear(r) => &r.density,
            Reconstruction::Wls(r) => &r.density,
            Reconstruction::Rhor(r) => &r.density,
        }
    }

    /// Scalar metrics: purity and trace plus estimator-specific values.
    pub fn metrics(&self) -> BTreeMap<String, f64> {
        let density = self.density();
        let mut m = BTreeMap::new();
        m.insert("purity".to_string(), density.purity());
        m.insert("trace".to_string(), density.trace().re);
        match self {
            Reconstruction::Linear(r) => {
                m.insert("residual_norm".to_string(), r.residual_norm);
                m.insert("rank".to_string(), r.rank as f64);
            }
            Reconstruction::Wls(r) => {
                m.insert("objective".to_string(), r.objective_value);
                m.insert("initial_objective".to_string(), r.initial_objective);
                m.insert("iterations".to_string(), r.iterations as f64);
                m.insert("status".to_string(), r.status_code() as f64);
                m.insert("success".to_string(), f64::from(u8::from(r.success())));
            }
            Reconstruction::Rhor(r) => {
                m.insert("log_likelihood".to_string(), r.log_likelihood);
                m.insert("iterations".to_string(), r.iterations as f64);
                m.insert("converged".to_string(), f64::from(u8::from(r.converged)));
                m.insert(
                    "decrease_ll_count".to_string(),
                    r.diagnostics.decrease_ll_count as f64,
                );
                m.insert("reset_count".to_string(), r.diagnostics.reset_count as f64);
            }
        }
        m
    }

    /// Normalized probabilities the estimator fitted.
    pub fn probabilities(&self) -> &[f64] {
        match self {
            Reconstruction::Linear(r) => &r.normalized_probabilities,
            Reconstruction::Wls(r) => &r.normalized_probabilities,
            Reconstruction::Rhor(r) => &r.normalized_probabilities,
        }
    }
}

/// Common estimator interface.
pub trait Reconstructor: Send + Sync {
    /// Method tag.
    fn method(&self) -> ReconstructionMethod;

    /// Design the estimator is bound to.
    fn design(&self) -> &MeasurementDesign;

    /// Reconstruct from an observed vector.
    fn reconstruct(&self, observed: &[f64]) -> Result<Reconstruction>;
}

impl Reconstructor for LinearEstimator {
    fn method(&self) -> ReconstructionMethod {
        ReconstructionMethod::Linear
    }

    fn design(&self) -> &MeasurementDesign {
        LinearEstimator::design(self)
    }

    fn reconstruct(&self, observed: &[f64]) -> Result<Reconstruction> {
        LinearEstimator::reconstruct(self, observed).map(Reconstruction::Linear)
    }
}

impl Reconstructor for WlsEstimator {
    fn method(&self) -> ReconstructionMethod {
        ReconstructionMethod::Wls
    }

    fn design(&self) -> &MeasurementDesign {
        WlsEstimator::design(self)
    }

    fn reconstruct(&self, observed: &[f64]) -> Result<Reconstruction> {
        WlsEstimator::reconstruct(self, observed).map(Reconstruction::Wls)
    }
}

impl Reconstructor for RhoREstimator {
    fn method(&self) -> ReconstructionMethod {
        ReconstructionMethod::Rhor
    }

    fn design(&self) -> &MeasurementDesign {
        RhoREstimator::design(self)
    }

    fn reconstruct(&self, observed: &[f64]) -> Result<Reconstruction> {
        RhoREstimator::reconstruct(self, observed).map(Reconstruction::Rhor)
    }
}

/// Build a boxed estimator for `method` using the sections of `config`.
pub fn build_reconstructor(
    method: ReconstructionMethod,
    design: Arc<MeasurementDesign>,
    config: &Config,
) -> Result<Box<dyn Reconstructor>> {
    Ok(match method {
        ReconstructionMethod::Linear => {
            Box::new(LinearEstimator::new(design, config.linear_config())?)
        }
        ReconstructionMethod::Wls => Box::new(WlsEstimator::new(design, config.wls_config())?),
        ReconstructionMethod::Rhor => Box::new(RhoREstimator::new(design, config.rhor_config())?),
    })
}

/// Real and imaginary parts of a density matrix, row by row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRecord {
    /// Re ρ.
    pub real: Vec<Vec<f64>>,
    /// Im ρ.
    pub imag: Vec<Vec<f64>>,
}

impl MatrixRecord {
    /// Split `rho` into nested real and imaginary rows.
    pub fn from_density(rho: &PhysicalDensityMatrix) -> Self {
        let rows = |part: ndarray::Array2<f64>| -> Vec<Vec<f64>> {
            part.rows().into_iter().map(|r| r.to_vec()).collect()
        };
        Self {
            real: rows(rho.real_part()),
            imag: rows(rho.imag_part()),
        }
    }
}

/// Serializable summary of one reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionRecord {
    /// Method tag.
    pub method: ReconstructionMethod,
    /// Hilbert-space dimension.
    pub dimension: usize,
    /// Design name.
    pub design: String,
    /// Normalized probabilities used by the estimator.
    pub probabilities: Vec<f64>,
    /// The reconstructed matrix.
    pub density_matrix: MatrixRecord,
    /// Scalar metrics.
    pub metrics: BTreeMap<String, f64>,
    /// Free-form metadata supplied by the caller.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ReconstructionRecord {
    /// Summarize `result` obtained on `design`.
    pub fn new(result: &Reconstruction, design: &MeasurementDesign) -> Self {
        Self {
            method: result.method(),
            dimension: design.dimension(),
            design: design.spec().name(),
            probabilities: result.probabilities().to_vec(),
            density_matrix: MatrixRecord::from_density(result.density()),
            metrics: result.metrics(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a record from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
