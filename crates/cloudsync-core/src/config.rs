//! Configuration module for CloudSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::{SubscriptionId, ZoneId, DEFAULT_OWNER_NAME};
use crate::domain::operation::MAX_RECOMMENDED_RECORDS_PER_OPERATION;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for a sync session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub retry: RetryConfig,
    pub batching: BatchingConfig,
    pub throttle: ThrottleConfig,
    pub dispatch: DispatchConfig,
    pub conflicts: ConflictsConfig,
    pub logging: LoggingConfig,
}

/// Which zone and subscription the session synchronizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub zone_name: String,
    pub owner_name: String,
    pub subscription_id: String,
}

/// Per-item retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries allowed for one work item before the session halts.
    pub max_retry_count: u32,
}

/// Modify batch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Records plus deletions accepted in one modify before splitting.
    pub max_records_per_operation: usize,
}

/// Adaptive throttle bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Lower bound of the delay between connector calls (seconds).
    pub min_seconds: f64,
    /// Upper bound of the delay between connector calls (seconds).
    pub max_seconds: f64,
}

/// Event dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Milliseconds to wait before handing new current work to the connector.
    pub work_debounce_ms: u64,
    /// Maximum nesting of events dispatched from middleware.
    pub max_dispatch_depth: usize,
}

/// A conflict rule: record types matching `pattern` resolve with `strategy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRule {
    /// Glob pattern matched against the record type (e.g. `"Draft*"`)
    pub pattern: String,
    /// `keep_local`, `keep_remote` or `manual`
    pub strategy: String,
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// Default conflict strategy: `manual`, `keep_local`, or `keep_remote`.
    pub default_strategy: String,
    /// Rules evaluated in order; the first match wins.
    pub rules: Vec<ConflictRule>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/cloudsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("cloudsync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Typed accessors
// ---------------------------------------------------------------------------

impl SessionConfig {
    /// Returns the configured zone id.
    pub fn zone_id(&self) -> anyhow::Result<ZoneId> {
        Ok(ZoneId::new(&self.zone_name, &self.owner_name)?)
    }

    /// Returns the configured subscription id.
    pub fn subscription_id(&self) -> anyhow::Result<SubscriptionId> {
        Ok(SubscriptionId::new(self.subscription_id.clone())?)
    }
}

impl ThrottleConfig {
    /// Lower bound; values `validate` rejects fall back to zero
    pub fn min(&self) -> Duration {
        Duration::try_from_secs_f64(self.min_seconds.max(0.0)).unwrap_or(Duration::ZERO)
    }

    /// Upper bound; values `validate` rejects fall back to zero
    pub fn max(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_seconds.max(0.0)).unwrap_or(Duration::ZERO)
    }
}

impl DispatchConfig {
    pub fn work_debounce(&self) -> Duration {
        Duration::from_millis(self.work_debounce_ms)
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            zone_name: "CloudSync".to_string(),
            owner_name: DEFAULT_OWNER_NAME.to_string(),
            subscription_id: "cloudsync-zone-changes".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retry_count: 5 }
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_records_per_operation: MAX_RECOMMENDED_RECORDS_PER_OPERATION,
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_seconds: 0.0,
            max_seconds: 600.0,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            work_debounce_ms: 60,
            max_dispatch_depth: 32,
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            default_strategy: "manual".to_string(),
            rules: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"retry.max_retry_count"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for conflict strategies.
const VALID_CONFLICT_STRATEGIES: &[&str] = &["manual", "keep_local", "keep_remote"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- session ---
        if let Err(e) = self.session.zone_id() {
            errors.push(ValidationError {
                field: "session.zone_name".into(),
                message: e.to_string(),
            });
        }
        if let Err(e) = self.session.subscription_id() {
            errors.push(ValidationError {
                field: "session.subscription_id".into(),
                message: e.to_string(),
            });
        }

        // --- batching ---
        if self.batching.max_records_per_operation == 0 {
            errors.push(ValidationError {
                field: "batching.max_records_per_operation".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- throttle ---
        if !self.throttle.min_seconds.is_finite() || self.throttle.min_seconds < 0.0 {
            errors.push(ValidationError {
                field: "throttle.min_seconds".into(),
                message: "must be a non-negative number".into(),
            });
        }
        if !self.throttle.max_seconds.is_finite() || self.throttle.max_seconds < 0.0 {
            errors.push(ValidationError {
                field: "throttle.max_seconds".into(),
                message: "must be a non-negative number".into(),
            });
        } else if self.throttle.min_seconds > self.throttle.max_seconds {
            errors.push(ValidationError {
                field: "throttle.min_seconds".into(),
                message: format!(
                    "min_seconds ({}) must not exceed max_seconds ({})",
                    self.throttle.min_seconds, self.throttle.max_seconds
                ),
            });
        }

        // --- dispatch ---
        if self.dispatch.max_dispatch_depth == 0 {
            errors.push(ValidationError {
                field: "dispatch.max_dispatch_depth".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- conflicts ---
        if !VALID_CONFLICT_STRATEGIES.contains(&self.conflicts.default_strategy.as_str()) {
            errors.push(ValidationError {
                field: "conflicts.default_strategy".into(),
                message: format!(
                    "invalid strategy '{}'; valid options: {}",
                    self.conflicts.default_strategy,
                    VALID_CONFLICT_STRATEGIES.join(", ")
                ),
            });
        }
        for (i, rule) in self.conflicts.rules.iter().enumerate() {
            if !VALID_CONFLICT_STRATEGIES.contains(&rule.strategy.as_str()) {
                errors.push(ValidationError {
                    field: format!("conflicts.rules[{i}].strategy"),
                    message: format!("invalid strategy '{}'", rule.strategy),
                });
            }
            if rule.pattern.is_empty() {
                errors.push(ValidationError {
                    field: format!("conflicts.rules[{i}].pattern"),
                    message: "must not be empty".into(),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use cloudsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .zone_name("Notes")
///     .max_retry_count(3)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- session ---

    pub fn zone_name(mut self, zone_name: impl Into<String>) -> Self {
        self.config.session.zone_name = zone_name.into();
        self
    }

    pub fn owner_name(mut self, owner_name: impl Into<String>) -> Self {
        self.config.session.owner_name = owner_name.into();
        self
    }

    pub fn subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.config.session.subscription_id = subscription_id.into();
        self
    }

    // --- retry ---

    pub fn max_retry_count(mut self, n: u32) -> Self {
        self.config.retry.max_retry_count = n;
        self
    }

    // --- batching ---

    pub fn max_records_per_operation(mut self, n: usize) -> Self {
        self.config.batching.max_records_per_operation = n;
        self
    }

    // --- throttle ---

    pub fn throttle_bounds(mut self, min_seconds: f64, max_seconds: f64) -> Self {
        self.config.throttle.min_seconds = min_seconds;
        self.config.throttle.max_seconds = max_seconds;
        self
    }

    // --- dispatch ---

    pub fn work_debounce_ms(mut self, ms: u64) -> Self {
        self.config.dispatch.work_debounce_ms = ms;
        self
    }

    pub fn max_dispatch_depth(mut self, depth: usize) -> Self {
        self.config.dispatch.max_dispatch_depth = depth;
        self
    }

    // --- conflicts ---

    pub fn conflicts_default_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.config.conflicts.default_strategy = strategy.into();
        self
    }

    pub fn conflict_rule(mut self, pattern: impl Into<String>, strategy: impl Into<String>) -> Self {
        self.config.conflicts.rules.push(ConflictRule {
            pattern: pattern.into(),
            strategy: strategy.into(),
        });
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.session.owner_name, DEFAULT_OWNER_NAME);
        assert_eq!(cfg.retry.max_retry_count, 5);
        assert_eq!(cfg.batching.max_records_per_operation, 400);
        assert_eq!(cfg.throttle.min(), Duration::ZERO);
        assert_eq!(cfg.throttle.max(), Duration::from_secs(600));
        assert_eq!(cfg.dispatch.work_debounce(), Duration::from_millis(60));
        assert_eq!(cfg.dispatch.max_dispatch_depth, 32);
        assert_eq!(cfg.conflicts.default_strategy, "manual");
        assert!(cfg.conflicts.rules.is_empty());
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
session:
  zone_name: Notes
  owner_name: __defaultOwner__
  subscription_id: notes-changes
retry:
  max_retry_count: 3
batching:
  max_records_per_operation: 100
throttle:
  min_seconds: 0.5
  max_seconds: 120
dispatch:
  work_debounce_ms: 10
  max_dispatch_depth: 8
conflicts:
  default_strategy: keep_remote
  rules:
    - pattern: "Draft*"
      strategy: keep_local
logging:
  level: debug
  json: true
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.session.zone_id().unwrap().zone_name(), "Notes");
        assert_eq!(cfg.session.subscription_id().unwrap().as_str(), "notes-changes");
        assert_eq!(cfg.retry.max_retry_count, 3);
        assert_eq!(cfg.batching.max_records_per_operation, 100);
        assert_eq!(cfg.throttle.min(), Duration::from_millis(500));
        assert_eq!(cfg.throttle.max(), Duration::from_secs(120));
        assert_eq!(cfg.dispatch.work_debounce_ms, 10);
        assert_eq!(cfg.dispatch.max_dispatch_depth, 8);
        assert_eq!(cfg.conflicts.default_strategy, "keep_remote");
        assert_eq!(
            cfg.conflicts.rules,
            vec![ConflictRule {
                pattern: "Draft*".into(),
                strategy: "keep_local".into()
            }]
        );
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"retry:\n  max_retry_count: 1\n").unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.retry.max_retry_count, 1);
        assert_eq!(cfg.batching.max_records_per_operation, 400);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.retry.max_retry_count, 5);
    }

    #[test]
    fn load_invalid_yaml_returns_error() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"retry: [not, a, map").unwrap();
        tmp.flush().unwrap();
        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn default_path_ends_with_cloudsync_config() {
        let path = Config::default_path();
        assert!(path.ends_with("cloudsync/config.yaml"));
    }

    // -- Validation --

    #[test]
    fn validate_reports_every_bad_field() {
        let cfg = ConfigBuilder::new()
            .zone_name("")
            .max_records_per_operation(0)
            .throttle_bounds(10.0, 1.0)
            .max_dispatch_depth(0)
            .conflicts_default_strategy("keep_both")
            .conflict_rule("Draft*", "overwrite")
            .logging_level("verbose")
            .build();

        let fields: Vec<_> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "session.zone_name",
                "batching.max_records_per_operation",
                "throttle.min_seconds",
                "dispatch.max_dispatch_depth",
                "conflicts.default_strategy",
                "conflicts.rules[0].strategy",
                "logging.level",
            ]
        );
    }

    #[test]
    fn build_validated_rejects_negative_throttle() {
        let result = ConfigBuilder::new().throttle_bounds(-1.0, 5.0).build_validated();
        let errors = result.unwrap_err();
        assert_eq!(errors[0].field, "throttle.min_seconds");
    }

    #[test]
    fn builder_overrides_defaults() {
        let cfg = ConfigBuilder::new()
            .zone_name("Notes")
            .subscription_id("notes")
            .max_retry_count(2)
            .work_debounce_ms(0)
            .logging_json(true)
            .build_validated()
            .expect("valid config");
        assert_eq!(cfg.session.zone_name, "Notes");
        assert_eq!(cfg.retry.max_retry_count, 2);
        assert_eq!(cfg.dispatch.work_debounce(), Duration::ZERO);
        assert!(cfg.logging.json);
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "retry.max_retry_count".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(err.to_string(), "retry.max_retry_count: must be greater than 0");
    }
}
