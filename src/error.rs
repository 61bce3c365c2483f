// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for tomography.

use std::fmt;

/// Result type alias for tomography operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Tomography error types.
#[derive(Debug)]
pub enum Error {
    /// Invalid or unsupported configuration (fatal)
    Configuration(ConfigurationError),
    /// Observed vector or matrix has the wrong shape
    InputShape { expected: String, actual: String },
    /// A measurement group (or the whole vector) sums to zero
    Normalization(String),
    /// Significant physicality violation under strict enforcement
    Physicality(String),
    /// Decomposition or solver failure
    Numerical(String),
    /// IO error
    Io(std::io::Error),
    /// Serialization error
    Serialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(e) => write!(f, "Configuration error: {}", e),
            Error::InputShape { expected, actual } => {
                write!(f, "Input shape error: expected {}, got {}", expected, actual)
            }
            Error::Normalization(msg) => write!(f, "Normalization error: {}", msg),
            Error::Physicality(msg) => write!(f, "Physicality violation: {}", msg),
            Error::Numerical(msg) => write!(f, "Numerical error: {}", msg),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Configuration(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ConfigurationError> for Error {
    fn from(e: ConfigurationError) -> Self {
        Error::Configuration(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Shape mismatch for an observed vector.
    pub fn length_mismatch(expected: usize, actual: usize) -> Self {
        Error::InputShape {
            expected: format!("length {}", expected),
            actual: format!("length {}", actual),
        }
    }

    /// Returns true for configuration errors.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}

/// Configuration errors. Never retried.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Hilbert-space dimension below 2
    InvalidDimension(usize),
    /// Design name not recognised
    UnknownDesign(String),
    /// MUB requested for a dimension that is not a prime power
    NotPrimePower(usize),
    /// Finite field GF(p^k) not available in the selected backend
    UnsupportedField { p: u32, k: u32 },
    /// Design exists but is not implemented for this dimension
    NotImplemented(String),
    /// Construction method not valid for the requested parameters
    MethodUnavailable(String),
    /// Compact selection found too few independent rows
    RankDeficient { found: usize, required: usize },
    /// Diagonal loading exhausted without a successful factorization
    CholeskyFailed { attempts: usize },
    /// Parameter out of range
    InvalidParameter { name: String, message: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::InvalidDimension(d) => {
                write!(f, "dimension must be >= 2, got {}", d)
            }
            ConfigurationError::UnknownDesign(name) => {
                write!(f, "unknown measurement design '{}'", name)
            }
            ConfigurationError::NotPrimePower(d) => {
                write!(f, "MUB requires a prime-power dimension, got {}", d)
            }
            ConfigurationError::UnsupportedField { p, k } => {
                write!(f, "GF({}^{}) is not supported by the selected field backend", p, k)
            }
            ConfigurationError::NotImplemented(msg) => write!(f, "not implemented: {}", msg),
            ConfigurationError::MethodUnavailable(msg) => {
                write!(f, "method unavailable: {}", msg)
            }
            ConfigurationError::RankDeficient { found, required } => {
                write!(
                    f,
                    "found only {} linearly independent rows, {} required",
                    found, required
                )
            }
            ConfigurationError::CholeskyFailed { attempts } => {
                write!(
                    f,
                    "Cholesky factorization failed after {} diagonal-loading attempts",
                    attempts
                )
            }
            ConfigurationError::InvalidParameter { name, message } => {
                write!(f, "parameter '{}': {}", name, message)
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

impl ConfigurationError {
    /// Shorthand for an out-of-range parameter.
    pub fn invalid(name: &str, message: impl Into<String>) -> Self {
        ConfigurationError::InvalidParameter {
            name: name.to_string(),
            message: message.into(),
        }
    }
}
