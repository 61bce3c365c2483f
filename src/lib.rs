// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! QubitOS quantum state tomography.
//!
//! This crate reconstructs finite-dimensional density matrices from measured
//! outcome frequencies.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  Reconstructor                    │
//! ├────────────────┬────────────────┬────────────────┤
//! │    Linear      │      WLS       │   RρR Strict   │
//! │  (lstsq/SVD)   │ (Cholesky+BFGS)│ (fixed point)  │
//! ├────────────────┴────────────────┴────────────────┤
//! │   PhysicalDensityMatrix   │   MeasurementDesign   │
//! │   (tolerance, enforce)    │  MUB / SIC / NoPOVM   │
//! └───────────────────────────┴───────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`design`]: Measurement designs, finite fields and the design cache
//! - [`density`]: Physically constrained density matrices
//! - [`linear`], [`wls`], [`rhor`]: Reconstruction estimators
//! - [`reconstruction`]: Estimator trait and serializable records
//! - [`spectral`]: Dominant pure-state extraction
//! - [`simulation`]: Synthetic probabilities and counts
//! - [`config`]: Configuration management
//! - [`validation`]: Input validation utilities
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use qubit_os_tomography::design::{DesignSpec, MeasurementDesign};
//! use qubit_os_tomography::linear::{LinearConfig, LinearEstimator};
//!
//! let design = Arc::new(MeasurementDesign::build(2, DesignSpec::mub()).unwrap());
//! let estimator = LinearEstimator::new(design, LinearConfig::default()).unwrap();
//! let result = estimator
//!     .reconstruct(&[100.0, 0.0, 50.0, 50.0, 50.0, 50.0])
//!     .unwrap();
//! assert!((result.density.purity() - 1.0).abs() < 1e-8);
//! ```

pub mod config;
pub mod density;
pub mod design;
pub mod error;
pub mod linalg;
pub mod linear;
pub mod reconstruction;
pub mod rhor;
pub mod simulation;
pub mod spectral;
pub mod validation;
pub mod wls;

pub use config::Config;
pub use density::{DensityOptions, EnforceMode, PhysicalDensityMatrix};
pub use design::{DesignSpec, MeasurementDesign};
pub use error::{Error, Result};
pub use reconstruction::{Reconstruction, ReconstructionMethod, Reconstructor};

#[cfg(test)]
pub mod test_utils;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
