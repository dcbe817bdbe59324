//! User-authored interception rule model
//!
//! These structures are what the UI surfaces create and the rule store
//! persists. The serde representation matches the storage wire format
//! (camelCase keys, internally tagged actions), so stored records survive
//! round-trips through JSON unchanged.

use serde::{Deserialize, Serialize};

/// Discriminates the required action shape of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    Redirect,
    Block,
    ModifyHeaders,
    /// Unrecognized future rule types deserialize here instead of failing,
    /// and the compiler drops them.
    #[serde(other)]
    Unknown,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Redirect => "redirect",
            RuleKind::Block => "block",
            RuleKind::ModifyHeaders => "modifyHeaders",
            RuleKind::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "redirect" => RuleKind::Redirect,
            "block" => RuleKind::Block,
            "modifyHeaders" => RuleKind::ModifyHeaders,
            _ => RuleKind::Unknown,
        }
    }
}

/// Redirect target as authored by the user (may be schemeless)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectSpec {
    pub url: String,
}

/// Header modification operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderOp {
    Set,
    Remove,
    Append,
}

/// A single header modification directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderDirective {
    pub header: String,
    pub operation: HeaderOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Type-specific action payload of a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleAction {
    Redirect {
        redirect: RedirectSpec,
    },
    ModifyHeaders {
        #[serde(rename = "modifyHeaders", default)]
        headers: Vec<HeaderDirective>,
    },
    Block,
}

/// User-authored interception rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Opaque identity, unique within the store
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub url_pattern: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
    pub enabled: bool,
    pub action: RuleAction,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Epoch milliseconds, bumped on every mutation
    pub updated_at: i64,
}

fn default_priority() -> u32 {
    1
}

impl Rule {
    /// Create a rule with a fresh identity and current timestamps
    pub fn new(kind: RuleKind, url_pattern: impl Into<String>, action: RuleAction) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            url_pattern: url_pattern.into(),
            priority: 1,
            enabled: true,
            action,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump the mutation timestamp, keeping it monotonically non-decreasing
    pub fn touch(&mut self) {
        let now = chrono::Utc::now().timestamp_millis();
        self.updated_at = self.updated_at.max(now);
    }
}

/// The synchronization controller's cached view of the store
///
/// Always replaced wholesale, never field-by-field, so readers observe
/// either the previous state or the next one and nothing in between.
#[derive(Debug, Clone, Serialize)]
pub struct RuleSnapshot {
    pub rules: Vec<Rule>,
    pub enabled: bool,
}

impl Default for RuleSnapshot {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            // Matches the store default: enabled unless explicitly turned off
            enabled: true,
        }
    }
}
