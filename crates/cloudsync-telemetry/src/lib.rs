//! CloudSync Telemetry - Observability
//!
//! Provides:
//! - `SessionMetrics`: Prometheus counters and gauges for a sync session
//! - `init_tracing`: tracing-subscriber setup driven by the logging config

pub mod logging;
pub mod metrics;

pub use logging::{build_env_filter, init_tracing};
pub use metrics::SessionMetrics;
