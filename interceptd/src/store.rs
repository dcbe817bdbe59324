//! Sqlite-backed rule store
//!
//! Single source of truth for the rule list and the global enabled flag.
//! Any number of callers (UI surfaces, the command handler) may mutate it;
//! every successful mutation broadcasts a [`StoreChange`] carrying the
//! freshly-read state so subscribers never have to re-query.

use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use tokio::sync::broadcast;
use tracing::{info, warn};

use intercept_core::{Rule, RuleAction, RuleKind};

use crate::error::{InterceptdError, Result};

const ENABLED_KEY: &str = "enabled";

/// Partial update for a stored rule; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct RulePatch {
    pub kind: Option<RuleKind>,
    pub url_pattern: Option<String>,
    pub priority: Option<u32>,
    pub enabled: Option<bool>,
    pub action: Option<RuleAction>,
}

/// Change notification payload: the full state after the mutation
#[derive(Debug, Clone)]
pub struct StoreChange {
    pub rules: Vec<Rule>,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RuleStore {
    pool: Pool<Sqlite>,
    change_tx: broadcast::Sender<StoreChange>,
}

impl RuleStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        use sqlx::sqlite::SqliteConnectOptions;
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(InterceptdError::Database)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        // Run migrations (path is relative to interceptd crate root)
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Rule store initialized and migrated at {}", database_url);

        let (change_tx, _) = broadcast::channel(64);
        Ok(Self { pool, change_tx })
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.change_tx.subscribe()
    }

    /// Fetch all rules in insertion order
    pub async fn get_rules(&self) -> Result<Vec<Rule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, url_pattern, priority, enabled, action, created_at, updated_at
            FROM rules
            ORDER BY position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let action_json: String = row.get("action");
            // Fail open on undecodable rows: skip them rather than
            // refusing to serve the rest of the set
            let action = match serde_json::from_str(&action_json) {
                Ok(action) => action,
                Err(e) => {
                    warn!(rule_id = %id, "skipping rule with undecodable action: {}", e);
                    continue;
                }
            };
            let kind: String = row.get("kind");
            rules.push(Rule {
                id,
                kind: RuleKind::parse(&kind),
                url_pattern: row.get("url_pattern"),
                priority: row.get::<i64, _>("priority").max(1) as u32,
                enabled: row.get("enabled"),
                action,
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            });
        }
        Ok(rules)
    }

    /// Replace the entire rule list transactionally
    pub async fn save_rules(&self, rules: &[Rule]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM rules").execute(&mut *tx).await?;
        for (position, rule) in rules.iter().enumerate() {
            insert_rule(&mut tx, rule, position as i64).await?;
        }
        tx.commit().await?;

        self.notify().await;
        Ok(())
    }

    /// Append a rule to the end of the list
    pub async fn add_rule(&self, rule: Rule) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let position: i64 = sqlx::query("SELECT COALESCE(MAX(position) + 1, 0) AS next FROM rules")
            .fetch_one(&mut *tx)
            .await?
            .get("next");
        insert_rule(&mut tx, &rule, position).await?;
        tx.commit().await?;

        self.notify().await;
        Ok(())
    }

    /// Merge a partial update into a rule, bumping its mutation timestamp
    pub async fn update_rule(&self, id: &str, patch: RulePatch) -> Result<()> {
        let mut rules = self.get_rules().await?;
        let rule = match rules.iter_mut().find(|r| r.id == id) {
            Some(rule) => rule,
            None => return Err(InterceptdError::RuleNotFound(id.to_string())),
        };

        if let Some(kind) = patch.kind {
            rule.kind = kind;
        }
        if let Some(url_pattern) = patch.url_pattern {
            rule.url_pattern = url_pattern;
        }
        if let Some(priority) = patch.priority {
            rule.priority = priority;
        }
        if let Some(enabled) = patch.enabled {
            rule.enabled = enabled;
        }
        if let Some(action) = patch.action {
            rule.action = action;
        }
        rule.touch();
        let action_json = serde_json::to_string(&rule.action)?;
        let result = sqlx::query(
            r#"
            UPDATE rules SET
                kind = ?,
                url_pattern = ?,
                priority = ?,
                enabled = ?,
                action = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(rule.kind.as_str())
        .bind(&rule.url_pattern)
        .bind(rule.priority as i64)
        .bind(rule.enabled)
        .bind(action_json)
        .bind(rule.updated_at)
        .bind(&rule.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(InterceptdError::RuleNotFound(id.to_string()));
        }

        self.notify().await;
        Ok(())
    }

    /// Remove a rule by id
    pub async fn delete_rule(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM rules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(InterceptdError::RuleNotFound(id.to_string()));
        }

        self.notify().await;
        Ok(())
    }

    /// Flip a rule's enabled flag, bumping its mutation timestamp
    pub async fn toggle_rule(&self, id: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let result = sqlx::query(
            r#"
            UPDATE rules SET
                enabled = NOT enabled,
                updated_at = MAX(updated_at, ?)
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(InterceptdError::RuleNotFound(id.to_string()));
        }

        self.notify().await;
        Ok(())
    }

    /// Global enabled flag; defaults to true when unset
    pub async fn is_enabled(&self) -> Result<bool> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(ENABLED_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map_or(true, |r| r.get::<String, _>("value") != "false"))
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(ENABLED_KEY)
        .bind(if enabled { "true" } else { "false" })
        .execute(&self.pool)
        .await?;

        self.notify().await;
        Ok(())
    }

    /// Broadcast the post-mutation state to subscribers.
    ///
    /// Only called after a successful write; failed writes never produce
    /// a change event.
    async fn notify(&self) {
        let rules = match self.get_rules().await {
            Ok(rules) => rules,
            Err(e) => {
                warn!("failed to read rules for change notification: {}", e);
                return;
            }
        };
        let enabled = match self.is_enabled().await {
            Ok(enabled) => enabled,
            Err(e) => {
                warn!("failed to read enabled flag for change notification: {}", e);
                return;
            }
        };
        // No receivers is fine
        let _ = self.change_tx.send(StoreChange { rules, enabled });
    }
}

async fn insert_rule(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    rule: &Rule,
    position: i64,
) -> Result<()> {
    let action_json = serde_json::to_string(&rule.action)?;
    sqlx::query(
        r#"
        INSERT INTO rules (id, position, kind, url_pattern, priority, enabled, action, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&rule.id)
    .bind(position)
    .bind(rule.kind.as_str())
    .bind(&rule.url_pattern)
    .bind(rule.priority as i64)
    .bind(rule.enabled)
    .bind(action_json)
    .bind(rule.created_at)
    .bind(rule.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
