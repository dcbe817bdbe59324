//! Intercept Core Library
//!
//! This library provides the rule engine for declarative request
//! interception: the user-authored rule model, translation of URL patterns
//! into the matching engine's filter syntax, compilation of enabled rules
//! into provider-ready declarative rules, and the provider abstraction the
//! synchronization layer reconciles against.

pub mod compiler;
pub mod filter;
pub mod provider;
pub mod rule;

/// Error types for rule engine operations
pub mod error;

pub use compiler::{compile, CompiledAction, CompiledRule, ResourceType, RuleCondition};
pub use error::CoreError;
pub use filter::translate_pattern;
pub use provider::{DeclarativeProvider, MatchEvent, RuleUpdate, SessionProvider};
pub use rule::{HeaderDirective, HeaderOp, RedirectSpec, Rule, RuleAction, RuleKind, RuleSnapshot};

/// Result type alias for rule engine operations
pub type Result<T> = std::result::Result<T, CoreError>;
