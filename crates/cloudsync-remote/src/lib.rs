//! CloudSync Remote - Connector-side policies
//!
//! Everything that sits between the session and the remote store:
//! - Adaptive throttling of connector calls
//! - `Retry-After` header parsing
//! - An in-memory backend implementing the connector port
//!
//! ## Modules
//!
//! - [`throttle`] - [`AdaptiveThrottle`] and [`parse_retry_after`]
//! - [`throttled`] - [`ThrottledConnector`], a throttle applied to any connector
//! - [`memory`] - [`MemoryConnector`], an in-process backend for tests and local runs

pub mod memory;
pub mod throttle;
pub mod throttled;

pub use memory::MemoryConnector;
pub use throttle::{parse_retry_after, AdaptiveThrottle};
pub use throttled::ThrottledConnector;
