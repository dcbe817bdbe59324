//! Interceptd — request-interception rule daemon
//!
//! Persists user-authored interception rules in sqlite, keeps the
//! declarative provider's installed ruleset synchronized with them, and
//! serves state queries and toggle commands to external UI processes.

pub mod commands;
pub mod controller;
pub mod logging;
pub mod store;

/// Daemon error types
pub mod error;

pub use commands::{CommandClient, CommandHandler, CommandRequest, CommandResponse};
pub use controller::SyncController;
pub use error::InterceptdError;
pub use logging::{init_logging, LoggingConfig};
pub use store::{RulePatch, RuleStore, StoreChange};

/// Result type alias for daemon operations
pub type Result<T> = std::result::Result<T, InterceptdError>;
