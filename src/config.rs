// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration management for tomography runs.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (later sources override earlier ones):
//!
//! 1. Built-in defaults
//! 2. tomography.yaml file
//! 3. Environment variables (QTOMO_*)

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::density::{DensityOptions, EnforceMode};
use crate::design::cache::{DesignCache, DEFAULT_CAPACITY};
use crate::error::{ConfigurationError, Result};
use crate::linear::LinearConfig;
use crate::rhor::RhoRConfig;
use crate::wls::WlsConfig;

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Physicality enforcement shared by all estimators
    #[serde(default)]
    pub density: DensityOptions,

    /// Design cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Linear inversion settings
    #[serde(default)]
    pub linear: LinearConfig,

    /// Weighted least-squares settings
    #[serde(default)]
    pub wls: WlsConfig,

    /// RρR settings
    #[serde(default)]
    pub rhor: RhoRConfig,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                config = serde_yaml::from_str(&content)?;
            }
        } else {
            for path in &["tomography.yaml", "tomography.yml"] {
                let path = Path::new(path);
                if path.exists() {
                    let content = std::fs::read_to_string(path)?;
                    config = serde_yaml::from_str(&content)?;
                    break;
                }
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply `QTOMO_*` overrides from `lookup`. Unparsable values are ignored.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("QTOMO_TOLERANCE") {
            if let Ok(tol) = val.parse() {
                self.density.tolerance = tol;
            }
        }
        if let Some(val) = lookup("QTOMO_ENFORCE") {
            if let Ok(mode) = val.parse::<EnforceMode>() {
                self.density.enforce = mode;
            }
        }
        if let Some(val) = lookup("QTOMO_STRICT") {
            self.density.strict = parse_flag(&val);
        }
        if let Some(val) = lookup("QTOMO_WARN") {
            self.density.warn = parse_flag(&val);
        }
        if let Some(val) = lookup("QTOMO_CACHE_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                self.cache.capacity = capacity;
            }
        }
        if let Some(val) = lookup("QTOMO_RHOR_MAX_ITERATIONS") {
            if let Ok(n) = val.parse() {
                self.rhor.max_iterations = n;
            }
        }
        if let Some(val) = lookup("QTOMO_WLS_MAX_ITERATIONS") {
            if let Ok(n) = val.parse() {
                self.wls.max_iterations = n;
            }
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.density.validate()?;
        if self.cache.capacity == 0 {
            return Err(ConfigurationError::invalid("cache.capacity", "must be > 0").into());
        }
        self.linear_config().validate()?;
        self.wls_config().validate()?;
        self.rhor_config().validate()
    }

    /// Linear estimator settings with the shared density options.
    pub fn linear_config(&self) -> LinearConfig {
        LinearConfig {
            density: self.density,
            ..self.linear
        }
    }

    /// WLS estimator settings with the shared density options.
    pub fn wls_config(&self) -> WlsConfig {
        WlsConfig {
            density: self.density,
            ..self.wls
        }
    }

    /// RρR estimator settings with the shared density options.
    pub fn rhor_config(&self) -> RhoRConfig {
        RhoRConfig {
            density: self.density,
            ..self.rhor
        }
    }

    /// Design cache sized per the `cache` section.
    pub fn design_cache(&self) -> Result<DesignCache> {
        DesignCache::new(self.cache.capacity)
    }
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

/// Design cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached designs
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_capacity() -> usize {
    DEFAULT_CAPACITY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wls::ProbabilityNormalization;
    use std::collections::HashMap;
    use std::io::Write as _;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.density.tolerance, 1e-10);
        assert_eq!(config.density.enforce, EnforceMode::WithinTol);
        assert!(!config.density.strict);
        assert!(config.density.warn);
        assert_eq!(config.cache.capacity, 32);
        assert_eq!(config.linear.regularization, None);
        assert_eq!(config.wls.max_iterations, 2000);
        assert_eq!(config.rhor.max_iterations, 5000);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let mut bad_config = Config::default();
        bad_config.cache.capacity = 0;
        assert!(bad_config.validate().is_err());

        let mut bad_config = Config::default();
        bad_config.rhor.dilution = Some(2.0);
        let msg = format!("{}", bad_config.validate().unwrap_err());
        assert!(msg.contains("rhor.dilution"));
    }

    #[test]
    fn test_config_load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
density:
  tolerance: 1.0e-8
  enforce: project
cache:
  capacity: 4
wls:
  regularization: 0.01
  normalization: per_group
rhor:
  max_iterations: 250
  dilution: 0.5
"#
        )
        .unwrap();

        let config = Config::load(Some(f.path())).unwrap();
        assert_eq!(config.density.tolerance, 1e-8);
        assert_eq!(config.density.enforce, EnforceMode::Project);
        assert!(config.density.warn);
        assert_eq!(config.cache.capacity, 4);
        assert_eq!(config.wls.regularization, Some(0.01));
        assert_eq!(config.wls.normalization, ProbabilityNormalization::PerGroup);
        assert_eq!(config.wls.ftol, 1e-12);
        assert_eq!(config.rhor.max_iterations, 250);
        assert_eq!(config.rhor.dilution, Some(0.5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_estimator_configs_share_density_options() {
        let mut config = Config::default();
        config.density.enforce = EnforceMode::Project;
        config.density.tolerance = 1e-7;
        assert_eq!(config.linear_config().density.enforce, EnforceMode::Project);
        assert_eq!(config.wls_config().density.tolerance, 1e-7);
        assert_eq!(config.rhor_config().density, config.density);
    }

    #[test]
    fn test_design_cache_uses_capacity() {
        let mut config = Config::default();
        config.cache.capacity = 3;
        assert_eq!(config.design_cache().unwrap().capacity(), 3);
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        // When a path is provided but doesn't exist, load returns defaults
        let path = std::path::Path::new("/tmp/does_not_exist_qtomo_test.yaml");
        let config = Config::load(Some(path)).unwrap();
        assert_eq!(config.cache.capacity, 32);
    }

    #[test]
    fn test_config_load_invalid_yaml() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "{{{{not: valid: yaml::::").unwrap();

        let result = Config::load(Some(f.path()));
        assert!(result.is_err());
    }

    fn overrides(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).cloned());
        config
    }

    #[test]
    fn test_override_tolerance() {
        let config = overrides(&[("QTOMO_TOLERANCE", "1e-6")]);
        assert_eq!(config.density.tolerance, 1e-6);
    }

    #[test]
    fn test_override_enforce() {
        let config = overrides(&[("QTOMO_ENFORCE", "none")]);
        assert_eq!(config.density.enforce, EnforceMode::None);
    }

    #[test]
    fn test_override_strict_and_warn() {
        let config = overrides(&[("QTOMO_STRICT", "1"), ("QTOMO_WARN", "false")]);
        assert!(config.density.strict);
        assert!(!config.density.warn);

        let config = overrides(&[("QTOMO_STRICT", "TRUE")]);
        assert!(config.density.strict);
    }

    #[test]
    fn test_override_iteration_limits() {
        let config = overrides(&[
            ("QTOMO_RHOR_MAX_ITERATIONS", "123"),
            ("QTOMO_WLS_MAX_ITERATIONS", "45"),
            ("QTOMO_CACHE_CAPACITY", "7"),
        ]);
        assert_eq!(config.rhor.max_iterations, 123);
        assert_eq!(config.wls.max_iterations, 45);
        assert_eq!(config.cache.capacity, 7);
    }

    #[test]
    fn test_override_ignores_garbage() {
        let config = overrides(&[
            ("QTOMO_WLS_MAX_ITERATIONS", "many"),
            ("QTOMO_ENFORCE", "sometimes"),
        ]);
        assert_eq!(config.wls.max_iterations, 2000);
        assert_eq!(config.density.enforce, EnforceMode::WithinTol);
    }

    #[test]
    fn test_env_override_reads_process_environment() {
        let mut config = Config::default();
        std::env::set_var("QTOMO_WLS_MAX_ITERATIONS", "77");
        config.apply_env_overrides();
        assert_eq!(config.wls.max_iterations, 77);
        std::env::remove_var("QTOMO_WLS_MAX_ITERATIONS");
    }
}
