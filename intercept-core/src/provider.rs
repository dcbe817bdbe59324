//! Declarative provider abstraction
//!
//! The provider is the engine that actually matches network requests
//! against installed declarative rules. The synchronization layer only
//! ever talks to it through [`DeclarativeProvider`]: query what is
//! installed, then apply a combined remove+add update that the provider
//! commits all-or-nothing.
//!
//! [`SessionProvider`] is the in-process implementation: an ordered
//! session ruleset with the same atomicity contract, plus a diagnostic
//! match-event feed for observability.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::compiler::CompiledRule;
use crate::error::CoreError;
use crate::Result;

/// A combined update applied atomically: remove then add, as one commit
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub remove_ids: Vec<u32>,
    pub add_rules: Vec<CompiledRule>,
}

/// Diagnostic event emitted when an installed rule matches a URL
#[derive(Debug, Clone)]
pub struct MatchEvent {
    pub rule_id: u32,
    pub matched_url: String,
}

/// The external request-matching engine, as seen by the controller
#[async_trait]
pub trait DeclarativeProvider: Send + Sync {
    /// Ordered snapshot of the currently installed ruleset
    async fn installed_rules(&self) -> Result<Vec<CompiledRule>>;

    /// Apply a combined remove+add update.
    ///
    /// All-or-nothing: on error the installed ruleset is unchanged.
    async fn update_rules(&self, update: RuleUpdate) -> Result<()>;
}

/// In-process session ruleset with match diagnostics
#[derive(Debug)]
pub struct SessionProvider {
    rules: Arc<RwLock<Vec<CompiledRule>>>,
    match_tx: broadcast::Sender<MatchEvent>,
}

impl Default for SessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionProvider {
    pub fn new() -> Self {
        let (match_tx, _) = broadcast::channel(64);
        Self {
            rules: Arc::new(RwLock::new(Vec::new())),
            match_tx,
        }
    }

    /// Subscribe to the diagnostic feed of rule-match events
    pub fn subscribe_matches(&self) -> broadcast::Receiver<MatchEvent> {
        self.match_tx.subscribe()
    }

    /// Evaluate a URL against the installed ruleset.
    ///
    /// Highest priority wins; ties break toward the lowest rule id. A
    /// match is reported on the diagnostic feed as well as returned.
    pub async fn match_url(&self, url: &str) -> Option<MatchEvent> {
        let rules = self.rules.read().await;
        let winner = rules
            .iter()
            .filter(|rule| filter_matches(&rule.condition.url_filter, url))
            // min_by_key keeps the first among equals, so invert priority
            // and keep id ascending
            .min_by_key(|rule| (std::cmp::Reverse(rule.priority), rule.id))?;

        let event = MatchEvent {
            rule_id: winner.id,
            matched_url: url.to_string(),
        };
        // No receivers is fine, the feed is observability only
        let _ = self.match_tx.send(event.clone());
        Some(event)
    }
}

/// Filter semantics: `|`-prefixed filters anchor the start of the URL,
/// anything else matches as a substring. Empty filters match nothing.
fn filter_matches(filter: &str, url: &str) -> bool {
    if filter.is_empty() {
        return false;
    }
    match filter.strip_prefix('|') {
        Some(anchored) => url.starts_with(anchored),
        None => url.contains(filter),
    }
}

#[async_trait]
impl DeclarativeProvider for SessionProvider {
    async fn installed_rules(&self) -> Result<Vec<CompiledRule>> {
        Ok(self.rules.read().await.clone())
    }

    async fn update_rules(&self, update: RuleUpdate) -> Result<()> {
        let mut rules = self.rules.write().await;

        let remove: HashSet<u32> = update.remove_ids.iter().copied().collect();
        let mut next: Vec<CompiledRule> = rules
            .iter()
            .filter(|rule| !remove.contains(&rule.id))
            .cloned()
            .collect();
        next.extend(update.add_rules);

        // Validate before committing so a rejected update leaves the
        // installed ruleset untouched
        let mut seen = HashSet::new();
        for rule in &next {
            if !seen.insert(rule.id) {
                return Err(CoreError::DuplicateRuleId(rule.id));
            }
        }

        debug!(
            removed = update.remove_ids.len(),
            installed = next.len(),
            "session ruleset updated"
        );
        *rules = next;
        Ok(())
    }
}
