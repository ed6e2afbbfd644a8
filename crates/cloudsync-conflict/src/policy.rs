//! Policy engine for automatic conflict resolution
//!
//! Evaluates conflict rules from configuration to determine automatic resolution
//! strategies. Rules match record types with glob patterns in first-match-wins
//! order.

use glob::Pattern;
use tracing::{debug, trace, warn};

use cloudsync_core::config::{ConflictRule, ConflictsConfig};
use cloudsync_core::domain::Record;
use cloudsync_core::ports::ConflictResolver;

use crate::error::ConflictError;
use crate::strategy::{resolve_record, Resolution};

/// Validates a rule's glob pattern and strategy
pub fn validate_rule(rule: &ConflictRule) -> Result<(), ConflictError> {
    Pattern::new(&rule.pattern).map_err(|e| ConflictError::InvalidPattern {
        pattern: rule.pattern.clone(),
        reason: e.to_string(),
    })?;
    rule.strategy.parse::<Resolution>()?;
    Ok(())
}

/// Engine that evaluates conflict resolution rules
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    rules: Vec<(Pattern, Resolution)>,
    default_strategy: Resolution,
}

impl PolicyEngine {
    /// Creates a PolicyEngine from the default strategy string and a list of rules
    ///
    /// Invalid rules are logged and skipped; an invalid default falls back to
    /// [`Resolution::Manual`].
    pub fn new(default_strategy: &str, rules: &[ConflictRule]) -> Self {
        let default = default_strategy.parse().unwrap_or_else(|e| {
            warn!(error = %e, "Invalid default conflict strategy, using manual");
            Resolution::Manual
        });

        let compiled_rules: Vec<(Pattern, Resolution)> = rules
            .iter()
            .filter_map(|rule| {
                let pattern = match Pattern::new(&rule.pattern) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(
                            pattern = %rule.pattern,
                            error = %e,
                            "Skipping invalid conflict rule pattern"
                        );
                        return None;
                    }
                };
                match rule.strategy.parse::<Resolution>() {
                    Ok(resolution) => Some((pattern, resolution)),
                    Err(_) => {
                        warn!(
                            strategy = %rule.strategy,
                            "Skipping invalid conflict rule strategy"
                        );
                        None
                    }
                }
            })
            .collect();

        debug!(
            rules_count = compiled_rules.len(),
            default = %default,
            "PolicyEngine initialized"
        );

        Self {
            rules: compiled_rules,
            default_strategy: default,
        }
    }

    /// Creates a PolicyEngine from the `conflicts` configuration section
    pub fn from_config(config: &ConflictsConfig) -> Self {
        Self::new(&config.default_strategy, &config.rules)
    }

    /// Evaluates the policy for a record type
    ///
    /// Uses first-match-wins: the first rule whose glob matches the type
    /// determines the resolution. If no rule matches, returns the default strategy.
    pub fn evaluate(&self, record_type: &str) -> Resolution {
        for (pattern, resolution) in &self.rules {
            if pattern.matches(record_type) {
                trace!(
                    record_type,
                    pattern = %pattern,
                    resolution = %resolution,
                    "Conflict rule matched"
                );
                return *resolution;
            }
        }

        trace!(
            record_type,
            default = %self.default_strategy,
            "No conflict rule matched, using default"
        );
        self.default_strategy
    }

    /// Resolves an index-aligned batch, each record with its own strategy
    pub fn resolve(&self, local: &[Record], server: &[Record]) -> Result<Vec<Record>, ConflictError> {
        if local.len() != server.len() {
            return Err(ConflictError::BatchMismatch {
                local: local.len(),
                server: server.len(),
            });
        }

        local
            .iter()
            .zip(server)
            .map(|(local, server)| resolve_record(self.evaluate(local.record_type()), local, server))
            .collect()
    }

    /// Returns the default resolution strategy
    pub fn default_strategy(&self) -> Resolution {
        self.default_strategy
    }

    /// Returns the number of compiled rules
    pub fn rules_count(&self) -> usize {
        self.rules.len()
    }
}

impl ConflictResolver for PolicyEngine {
    fn resolve_conflict(&self, local: &[Record], server: &[Record]) -> Option<Vec<Record>> {
        match self.resolve(local, server) {
            Ok(resolved) => {
                debug!(records = resolved.len(), "Conflicts resolved by policy");
                Some(resolved)
            }
            Err(e) => {
                debug!(error = %e, "Policy declined to resolve conflicts");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rule(pattern: &str, strategy: &str) -> ConflictRule {
        ConflictRule {
            pattern: pattern.to_string(),
            strategy: strategy.to_string(),
        }
    }

    fn record(id: &str, record_type: &str, tag: &str, title: &str) -> Record {
        Record::new(id.parse().unwrap(), record_type)
            .with_change_tag(tag)
            .with_field("title", title)
    }

    #[test]
    fn test_policy_engine_no_rules() {
        let engine = PolicyEngine::new("manual", &[]);
        assert_eq!(engine.evaluate("Note"), Resolution::Manual);
        assert_eq!(engine.rules_count(), 0);
    }

    #[test]
    fn test_policy_engine_default_strategy() {
        let engine = PolicyEngine::new("keep_local", &[]);
        assert_eq!(engine.evaluate("Note"), Resolution::KeepLocal);
        assert_eq!(engine.default_strategy(), Resolution::KeepLocal);
    }

    #[test]
    fn test_policy_engine_first_match_wins() {
        let rules = vec![rule("Draft*", "keep_local"), rule("*", "keep_remote")];
        let engine = PolicyEngine::new("manual", &rules);

        assert_eq!(engine.evaluate("DraftNote"), Resolution::KeepLocal);
        assert_eq!(engine.evaluate("Note"), Resolution::KeepRemote);
    }

    #[test]
    fn test_policy_engine_skips_invalid_rules() {
        let rules = vec![
            rule("[unclosed", "keep_local"),
            rule("Note", "keep_both"),
            rule("Note", "keep_remote"),
        ];
        let engine = PolicyEngine::new("bogus", &rules);

        assert_eq!(engine.rules_count(), 1);
        assert_eq!(engine.default_strategy(), Resolution::Manual);
        assert_eq!(engine.evaluate("Note"), Resolution::KeepRemote);
    }

    #[test]
    fn test_validate_rule() {
        assert!(validate_rule(&rule("Draft*", "keep_local")).is_ok());
        assert!(matches!(
            validate_rule(&rule("[", "keep_local")),
            Err(ConflictError::InvalidPattern { .. })
        ));
        assert_eq!(
            validate_rule(&rule("*", "keep_both")),
            Err(ConflictError::InvalidStrategy("keep_both".into()))
        );
    }

    #[test]
    fn test_resolve_mixed_batch() {
        let engine = PolicyEngine::new("keep_remote", &[rule("Draft", "keep_local")]);
        let local = vec![
            record("d1", "Draft", "t1", "my draft"),
            record("n1", "Note", "t1", "my note"),
        ];
        let server = vec![
            record("d1", "Draft", "t5", "their draft"),
            record("n1", "Note", "t6", "their note"),
        ];

        let resolved = engine.resolve_conflict(&local, &server).unwrap();
        assert_eq!(resolved[0].change_tag(), Some("t5"));
        assert_eq!(resolved[0].field("title"), Some(&json!("my draft")));
        assert_eq!(resolved[1], server[1]);
    }

    #[test]
    fn test_batch_declined_when_any_record_is_manual() {
        let engine = PolicyEngine::new("keep_remote", &[rule("Secret*", "manual")]);
        let local = vec![
            record("n1", "Note", "t1", "a"),
            record("s1", "SecretNote", "t1", "b"),
        ];
        let server = vec![
            record("n1", "Note", "t2", "a2"),
            record("s1", "SecretNote", "t2", "b2"),
        ];
        assert!(engine.resolve_conflict(&local, &server).is_none());
    }

    #[test]
    fn test_batch_declined_when_server_version_missing() {
        let engine = PolicyEngine::new("keep_local", &[]);
        let local = vec![record("n1", "Note", "t1", "a")];
        assert!(engine.resolve_conflict(&local, &[]).is_none());
    }

    #[test]
    fn test_from_yaml_config() {
        let yaml = r#"
default_strategy: keep_local
rules:
  - pattern: "Log*"
    strategy: keep_remote
"#;
        let config: ConflictsConfig = serde_yaml::from_str(yaml).unwrap();
        let engine = PolicyEngine::from_config(&config);
        assert_eq!(engine.evaluate("LogEntry"), Resolution::KeepRemote);
        assert_eq!(engine.evaluate("Note"), Resolution::KeepLocal);
    }
}
