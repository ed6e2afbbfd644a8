//! Tracing subscriber setup
//!
//! `RUST_LOG` always wins over the configured level, so a deployed session can
//! be made more verbose without editing its config file.

use tracing_subscriber::EnvFilter;

use cloudsync_core::config::LoggingConfig;

/// Builds the filter: `RUST_LOG` if set and valid, else the configured level
pub fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs the global tracing subscriber
///
/// Fails if a global subscriber has already been set.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = build_env_filter(config);

    let result = if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
    };

    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_uses_config_level_without_env() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            level: "debug".to_string(),
            json: false,
        };
        let filter = build_env_filter(&config);
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig::default();
        let first = init_tracing(&config);
        let second = init_tracing(&config);
        // Another test in this binary may have won the race for the first init
        assert!(first.is_err() || second.is_err());
        assert!(second.is_err());
    }
}
