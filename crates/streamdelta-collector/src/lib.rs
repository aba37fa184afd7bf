//! Concurrent playlist collection.
//!
//! [`dispatcher::collect`] fans units out over a bounded pool of executors;
//! [`sequential::collect_with_fallback`] wraps it with the one-at-a-time
//! fallback. [`ProcessBackend`] is the production executor source and
//! [`CollectCommand`] starts a whole collect run as a child process.

pub mod backend;
pub mod dispatcher;
pub mod error;
pub mod launch;
pub mod normalize;
pub mod process;
pub mod sequential;

pub use backend::{CollectorBackend, UnitExecutor};
pub use dispatcher::{collect, PoolConfig};
pub use error::{CollectError, PoolFailure};
pub use launch::{CollectCommand, CollectTrigger, LaunchError};
pub use normalize::parse_scraper_output;
pub use process::{ProcessBackend, ProcessConfig};
pub use sequential::{collect_sequential, collect_with_fallback, RoundMode, RoundOutcome};
