//! Run configuration.
//!
//! A [`TestConfig`] is supplied once per run and never changes while the run
//! is in flight. It can be built in code, loaded from a YAML file, and
//! overridden from `BIBLIO_*` environment variables.

use crate::models::duration_serde;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default base URL of a locally served API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default route prefix the API is mounted under.
pub const DEFAULT_API_PREFIX: &str = "/api";

/// Default grade ceiling.
pub const DEFAULT_GRADE_CEILING: f64 = 2.0;

/// Identifier assumed to never exist on the API under test.
pub const DEFAULT_MISSING_ID: u64 = 99_999;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for this schema.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a grading run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Scheme, host and port of the API (no trailing slash, no `/api`).
    pub base_url: String,

    /// Prefix every contract path is mounted under.
    pub api_prefix: String,

    /// Per-request timeout.
    #[serde(with = "duration_serde")]
    pub timeout: Duration,

    /// Skip the remaining suites once a suite produced a failure.
    pub stop_on_first_error: bool,

    /// Upper bound of the final grade.
    pub grade_ceiling: f64,

    /// Reserved identifier used by the not-found probes.
    pub missing_id: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            timeout: Duration::from_secs(10),
            stop_on_first_error: false,
            grade_ceiling: DEFAULT_GRADE_CEILING,
            missing_id: DEFAULT_MISSING_ID,
        }
    }
}

impl TestConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a YAML file. Missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parses a configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: TestConfig = serde_yaml::from_str(content)?;
        Ok(config.normalized())
    }

    /// Applies `BIBLIO_*` environment overrides on top of this configuration.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BIBLIO_BASE_URL") {
            self.base_url = url;
        }
        if let Some(prefix) = lookup("BIBLIO_API_PREFIX") {
            self.api_prefix = prefix;
        }
        if let Some(secs) = lookup("BIBLIO_TIMEOUT_SECS") {
            let secs: f64 = secs.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("BIBLIO_TIMEOUT_SECS is not a number: {secs}"))
            })?;
            self.timeout = Duration::try_from_secs_f64(secs).map_err(|e| {
                ConfigError::Invalid(format!("BIBLIO_TIMEOUT_SECS out of range: {e}"))
            })?;
        }
        if let Some(ceiling) = lookup("BIBLIO_GRADE_CEILING") {
            self.grade_ceiling = ceiling.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("BIBLIO_GRADE_CEILING is not a number: {ceiling}"))
            })?;
        }
        Ok(self.normalized())
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.normalized()
    }

    /// Sets the API prefix.
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self.normalized()
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets whether to skip remaining suites after a failing suite.
    pub fn stop_on_first_error(mut self, stop: bool) -> Self {
        self.stop_on_first_error = stop;
        self
    }

    /// Sets the grade ceiling.
    pub fn with_grade_ceiling(mut self, ceiling: f64) -> Self {
        self.grade_ceiling = ceiling;
        self
    }

    /// Sets the reserved missing identifier.
    pub fn with_missing_id(mut self, id: u64) -> Self {
        self.missing_id = id;
        self
    }

    /// Full URL prefix every contract path is appended to.
    pub fn api_root(&self) -> String {
        format!("{}{}", self.base_url, self.api_prefix)
    }

    /// Checks the configuration for values a run cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base URL `{}`: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "base URL must use http or https, got `{}`",
                url.scheme()
            )));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be positive".to_string()));
        }
        if !self.grade_ceiling.is_finite() || self.grade_ceiling <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "grade ceiling must be a positive number, got {}",
                self.grade_ceiling
            )));
        }
        Ok(())
    }

    /// Trims a trailing slash from the base URL and gives the prefix exactly
    /// one leading slash and no trailing slash (an empty prefix stays empty).
    fn normalized(mut self) -> Self {
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        let prefix = self.api_prefix.trim().trim_matches('/');
        self.api_prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("/{prefix}")
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TestConfig::new();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(!config.stop_on_first_error);
        assert!((config.grade_ceiling - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.missing_id, 99_999);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_normalizes_slashes() {
        let config = TestConfig::new()
            .with_base_url("http://localhost:8000/")
            .with_api_prefix("api/");
        assert_eq!(config.api_root(), "http://localhost:8000/api");

        let config = TestConfig::new().with_api_prefix("/");
        assert_eq!(config.api_prefix, "");
        assert_eq!(config.api_root(), "http://localhost:8000");
    }

    #[test]
    fn test_from_yaml_with_partial_keys() {
        let config = TestConfig::from_yaml(
            "base_url: http://127.0.0.1:9000/\ntimeout: 2.5\nstop_on_first_error: true\n",
        )
        .unwrap();

        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert!(config.stop_on_first_error);
        // Untouched keys keep defaults
        assert_eq!(config.api_prefix, "/api");
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grader.yml");
        std::fs::write(&path, "grade_ceiling: 10.0\nmissing_id: 424242\n").unwrap();

        let config = TestConfig::load(&path).unwrap();
        assert!((config.grade_ceiling - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.missing_id, 424_242);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = TestConfig::load(Path::new("/nonexistent/grader.yml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let result = TestConfig::from_yaml("timeout: [not, a, number]");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("BIBLIO_BASE_URL", "http://api.test:8080/"),
            ("BIBLIO_API_PREFIX", "v1"),
            ("BIBLIO_TIMEOUT_SECS", "3"),
            ("BIBLIO_GRADE_CEILING", "5"),
        ]);

        let config = TestConfig::new()
            .with_overrides_from(|k| vars.get(k).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.api_root(), "http://api.test:8080/v1");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert!((config.grade_ceiling - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let result = TestConfig::new().with_overrides_from(|k| {
            (k == "BIBLIO_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(TestConfig::new().with_base_url("not a url").validate().is_err());
        assert!(
            TestConfig::new()
                .with_base_url("ftp://localhost")
                .validate()
                .is_err()
        );
        assert!(
            TestConfig::new()
                .with_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            TestConfig::new()
                .with_grade_ceiling(0.0)
                .validate()
                .is_err()
        );
        assert!(
            TestConfig::new()
                .with_grade_ceiling(f64::NAN)
                .validate()
                .is_err()
        );
    }
}
