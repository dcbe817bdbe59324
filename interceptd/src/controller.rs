//! Synchronization controller
//!
//! Owns the cached `{rules, enabled}` snapshot and keeps the provider's
//! installed ruleset converged with it. Every trigger (startup, store
//! change, toggle) runs a full pass: reload, compile, then one combined
//! remove+add update. Passes are not mutually exclusive; because each
//! pass replaces the entire installed set, the last writer converges to
//! its own desired state.

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

use intercept_core::{compile, DeclarativeProvider, RuleSnapshot, RuleUpdate};

use crate::error::Result;
use crate::store::{RuleStore, StoreChange};

pub struct SyncController {
    store: RuleStore,
    provider: Arc<dyn DeclarativeProvider>,
    /// Mutated only by the controller; read by the command handler
    snapshot: RwLock<RuleSnapshot>,
}

impl SyncController {
    pub fn new(store: RuleStore, provider: Arc<dyn DeclarativeProvider>) -> Arc<Self> {
        Arc::new(Self {
            store,
            provider,
            snapshot: RwLock::new(RuleSnapshot::default()),
        })
    }

    /// Load persisted state, run the first reconciliation, and start
    /// following store change notifications.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        // Subscribe before the initial load so a mutation committed while
        // we are still reloading is buffered in the receiver instead of
        // broadcast into the void
        let mut changes = self.store.subscribe();

        self.reload().await?;
        if let Err(e) = self.reconcile().await {
            // Not fatal: the next trigger re-attempts from scratch
            error!("initial reconciliation failed: {}", e);
        }

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => controller.apply_change(change).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Missed notifications carry stale state anyway;
                        // re-read the store and reconcile once
                        warn!("change listener lagged by {} events, reloading", missed);
                        if let Err(e) = controller.reload().await {
                            error!("reload after lag failed: {}", e);
                            continue;
                        }
                        if let Err(e) = controller.reconcile().await {
                            error!("reconciliation after lag failed: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(())
    }

    /// Current cached state; never touches the store
    pub async fn snapshot(&self) -> RuleSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Flip the global enabled flag.
    ///
    /// Persists first; the cached snapshot only advances once persistence
    /// succeeded. Reconciliation runs in the background, so the returned
    /// flag does not imply the provider has converged yet.
    pub async fn toggle(self: &Arc<Self>) -> Result<bool> {
        let enabled = !self.snapshot.read().await.enabled;
        self.store.set_enabled(enabled).await?;

        {
            let mut snapshot = self.snapshot.write().await;
            let rules = snapshot.rules.clone();
            *snapshot = RuleSnapshot { rules, enabled };
        }

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = controller.reconcile().await {
                error!("reconciliation after toggle failed: {}", e);
            }
        });

        Ok(enabled)
    }

    /// Replace the cached snapshot with the store's current state
    pub async fn reload(&self) -> Result<()> {
        let rules = self.store.get_rules().await?;
        let enabled = self.store.is_enabled().await?;
        *self.snapshot.write().await = RuleSnapshot { rules, enabled };
        Ok(())
    }

    async fn apply_change(&self, change: StoreChange) {
        *self.snapshot.write().await = RuleSnapshot {
            rules: change.rules,
            enabled: change.enabled,
        };
        if let Err(e) = self.reconcile().await {
            error!("reconciliation after store change failed: {}", e);
        }
    }

    /// Make the installed ruleset match the compiled snapshot.
    ///
    /// Removal of the previous entries and addition of the new ones go
    /// out as a single combined update, so an observer never sees old and
    /// new rules active at the same time. On provider rejection the live
    /// ruleset stays as it was; no retry until the next trigger.
    pub async fn reconcile(&self) -> Result<()> {
        let snapshot = self.snapshot().await;
        let desired = if snapshot.enabled {
            compile(&snapshot.rules)
        } else {
            Vec::new()
        };

        let installed = self.provider.installed_rules().await?;
        let remove_ids: Vec<u32> = installed.iter().map(|rule| rule.id).collect();

        if desired.is_empty() {
            if remove_ids.is_empty() {
                return Ok(());
            }
            self.provider
                .update_rules(RuleUpdate {
                    remove_ids,
                    add_rules: Vec::new(),
                })
                .await?;
            info!("cleared installed ruleset");
            return Ok(());
        }

        let count = desired.len();
        self.provider
            .update_rules(RuleUpdate {
                remove_ids,
                add_rules: desired,
            })
            .await?;
        info!("installed {} declarative rules", count);
        Ok(())
    }
}
