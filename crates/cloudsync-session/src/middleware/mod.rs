//! The stages of the session chain
//!
//! Order matters; [`crate::session::SessionBuilder::build`] assembles them as
//! logger → error → retry → splitting → zone → work → subject.

mod error;
mod logger;
mod retry;
mod splitting;
mod subject;
mod work;
mod zone;

pub use error::ErrorMiddleware;
pub use logger::LoggerMiddleware;
pub use retry::{backoff_delay, RetryMiddleware};
pub use splitting::SplittingMiddleware;
pub use subject::{HaltReport, SubjectMiddleware, Subjects};
pub use work::WorkMiddleware;
pub use zone::ZoneMiddleware;
