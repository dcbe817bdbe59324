//! Compilation of user rules into provider-ready declarative rules
//!
//! Compilation is fail-open: a malformed or unrecognized rule is dropped
//! and the rest of the set still compiles. One bad rule must never block
//! the others from taking effect.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::filter::translate_pattern;
use crate::rule::{HeaderDirective, RedirectSpec, Rule, RuleAction, RuleKind};

/// Request resource classes a declarative rule can match on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    #[serde(rename = "xmlhttprequest")]
    XmlHttpRequest,
    Ping,
    Media,
    Websocket,
}

/// Everything a page might load; used for redirect rules
const BROAD_RESOURCE_TYPES: [ResourceType; 11] = [
    ResourceType::MainFrame,
    ResourceType::SubFrame,
    ResourceType::Stylesheet,
    ResourceType::Script,
    ResourceType::Image,
    ResourceType::Font,
    ResourceType::Object,
    ResourceType::XmlHttpRequest,
    ResourceType::Ping,
    ResourceType::Media,
    ResourceType::Websocket,
];

/// Document frames and XHR only; used for block and header rules
const FRAME_RESOURCE_TYPES: [ResourceType; 3] = [
    ResourceType::MainFrame,
    ResourceType::SubFrame,
    ResourceType::XmlHttpRequest,
];

/// Match condition of a compiled rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub url_filter: String,
    pub resource_types: Vec<ResourceType>,
}

/// Provider-ready action payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CompiledAction {
    Redirect {
        redirect: RedirectSpec,
    },
    ModifyHeaders {
        #[serde(rename = "responseHeaders")]
        response_headers: Vec<HeaderDirective>,
    },
    Block,
}

/// Provider-ready translation of an enabled rule
///
/// Ephemeral: regenerated on every compilation pass, never persisted.
/// The id is positional within the pass, so it is not stable across
/// compiles that change the enabled subset or its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledRule {
    pub id: u32,
    pub priority: u32,
    pub condition: RuleCondition,
    pub action: CompiledAction,
}

/// Compile the enabled subset of a rule list into declarative rules.
///
/// Output preserves the enabled rules' order and assigns ids 1..n by
/// position. Priority is carried through untouched; ordering by priority
/// is the matching engine's job, not ours.
pub fn compile(rules: &[Rule]) -> Vec<CompiledRule> {
    rules
        .iter()
        .filter(|rule| rule.enabled)
        .enumerate()
        .filter_map(|(index, rule)| compile_one(rule, index as u32 + 1))
        .collect()
}

fn compile_one(rule: &Rule, id: u32) -> Option<CompiledRule> {
    let url_filter = translate_pattern(&rule.url_pattern);

    let (action, resource_types) = match (rule.kind, &rule.action) {
        (RuleKind::Redirect, RuleAction::Redirect { redirect }) => {
            let url = normalize_redirect_url(&redirect.url)?;
            (
                CompiledAction::Redirect {
                    redirect: RedirectSpec { url },
                },
                BROAD_RESOURCE_TYPES.to_vec(),
            )
        }
        (RuleKind::ModifyHeaders, RuleAction::ModifyHeaders { headers }) => (
            // An empty directive list is legal: a no-op rule, not an error
            CompiledAction::ModifyHeaders {
                response_headers: headers.clone(),
            },
            FRAME_RESOURCE_TYPES.to_vec(),
        ),
        (RuleKind::Block, RuleAction::Block) => {
            (CompiledAction::Block, FRAME_RESOURCE_TYPES.to_vec())
        }
        _ => {
            debug!(
                rule_id = %rule.id,
                kind = rule.kind.as_str(),
                "dropping rule with unsupported kind or mismatched action"
            );
            return None;
        }
    };

    Some(CompiledRule {
        id,
        priority: rule.priority.max(1),
        condition: RuleCondition {
            url_filter,
            resource_types,
        },
        action,
    })
}

/// Normalize a user-authored redirect target, prepending `https://` when
/// the scheme was omitted. Empty targets yield `None` and drop the rule.
fn normalize_redirect_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        Some(url.to_string())
    } else {
        Some(format!("https://{}", url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::HeaderOp;
    use proptest::prelude::*;

    fn redirect_rule(pattern: &str, target: &str, enabled: bool) -> Rule {
        let mut rule = Rule::new(
            RuleKind::Redirect,
            pattern,
            RuleAction::Redirect {
                redirect: RedirectSpec {
                    url: target.to_string(),
                },
            },
        );
        rule.enabled = enabled;
        rule
    }

    fn block_rule(pattern: &str, enabled: bool) -> Rule {
        let mut rule = Rule::new(RuleKind::Block, pattern, RuleAction::Block);
        rule.enabled = enabled;
        rule
    }

    #[test]
    fn test_redirect_scheme_auto_added() {
        let compiled = compile(&[redirect_rule("old.com", "new.com", true)]);
        assert_eq!(compiled.len(), 1);
        match &compiled[0].action {
            CompiledAction::Redirect { redirect } => {
                assert_eq!(redirect.url, "https://new.com");
            }
            other => panic!("expected redirect action, got {:?}", other),
        }
    }

    #[test]
    fn test_redirect_with_scheme_untouched() {
        let compiled = compile(&[redirect_rule("old.com", "http://new.com/x", true)]);
        match &compiled[0].action {
            CompiledAction::Redirect { redirect } => {
                assert_eq!(redirect.url, "http://new.com/x");
            }
            other => panic!("expected redirect action, got {:?}", other),
        }
    }

    #[test]
    fn test_redirect_empty_target_dropped() {
        let compiled = compile(&[
            redirect_rule("old.com", "  ", true),
            block_rule("ads.com", true),
        ]);
        // The malformed redirect is dropped; the block rule still compiles
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].action, CompiledAction::Block);
        assert_eq!(compiled[0].id, 2);
    }

    #[test]
    fn test_disabled_rules_excluded() {
        let compiled = compile(&[
            block_rule("a.com", false),
            block_rule("b.com", true),
            block_rule("c.com", false),
        ]);
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].condition.url_filter, "b.com");
    }

    #[test]
    fn test_ids_positional_within_enabled_subset() {
        let compiled = compile(&[
            block_rule("a.com", true),
            block_rule("b.com", false),
            block_rule("c.com", true),
        ]);
        let ids: Vec<u32> = compiled.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_empty_header_list_kept() {
        let mut rule = Rule::new(
            RuleKind::ModifyHeaders,
            "example.com",
            RuleAction::ModifyHeaders {
                headers: Vec::new(),
            },
        );
        rule.enabled = true;
        let compiled = compile(&[rule]);
        assert_eq!(compiled.len(), 1);
        match &compiled[0].action {
            CompiledAction::ModifyHeaders { response_headers } => {
                assert!(response_headers.is_empty());
            }
            other => panic!("expected modifyHeaders action, got {:?}", other),
        }
    }

    #[test]
    fn test_header_directives_copied_verbatim() {
        let directives = vec![
            HeaderDirective {
                header: "X-Frame-Options".to_string(),
                operation: HeaderOp::Remove,
                value: None,
            },
            HeaderDirective {
                header: "X-Debug".to_string(),
                operation: HeaderOp::Append,
                value: Some("on".to_string()),
            },
        ];
        let mut rule = Rule::new(
            RuleKind::ModifyHeaders,
            "example.com",
            RuleAction::ModifyHeaders {
                headers: directives.clone(),
            },
        );
        rule.enabled = true;
        let compiled = compile(&[rule]);
        match &compiled[0].action {
            CompiledAction::ModifyHeaders { response_headers } => {
                assert_eq!(*response_headers, directives);
            }
            other => panic!("expected modifyHeaders action, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_dropped_silently() {
        let mut rule = block_rule("a.com", true);
        rule.kind = RuleKind::Unknown;
        assert!(compile(&[rule]).is_empty());
    }

    #[test]
    fn test_mismatched_action_dropped() {
        let mut rule = block_rule("a.com", true);
        rule.kind = RuleKind::Redirect; // action is still Block
        assert!(compile(&[rule]).is_empty());
    }

    #[test]
    fn test_resource_type_breadth() {
        let compiled = compile(&[
            redirect_rule("old.com", "new.com", true),
            block_rule("ads.com", true),
        ]);
        assert_eq!(compiled[0].condition.resource_types.len(), 11);
        assert_eq!(
            compiled[1].condition.resource_types,
            vec![
                ResourceType::MainFrame,
                ResourceType::SubFrame,
                ResourceType::XmlHttpRequest
            ]
        );
    }

    fn arb_rule() -> impl Strategy<Value = Rule> {
        (
            any::<bool>(),
            0..4u8,
            "[a-z]{1,8}\\.com",
            proptest::option::of("[a-z]{0,8}"),
            1..100u32,
        )
            .prop_map(|(enabled, kind, pattern, target, priority)| {
                let (kind, action) = match kind {
                    0 => (
                        RuleKind::Redirect,
                        RuleAction::Redirect {
                            redirect: RedirectSpec {
                                url: target.unwrap_or_default(),
                            },
                        },
                    ),
                    1 => (
                        RuleKind::ModifyHeaders,
                        RuleAction::ModifyHeaders {
                            headers: Vec::new(),
                        },
                    ),
                    2 => (RuleKind::Block, RuleAction::Block),
                    _ => (RuleKind::Unknown, RuleAction::Block),
                };
                let mut rule = Rule::new(kind, pattern, action);
                rule.enabled = enabled;
                rule.priority = priority;
                rule
            })
    }

    proptest! {
        #[test]
        fn prop_compiled_ids_unique(rules in proptest::collection::vec(arb_rule(), 0..32)) {
            let compiled = compile(&rules);
            let mut ids: Vec<u32> = compiled.iter().map(|r| r.id).collect();
            ids.sort_unstable();
            ids.dedup();
            prop_assert_eq!(ids.len(), compiled.len());
        }

        #[test]
        fn prop_disabled_never_compiled(rules in proptest::collection::vec(arb_rule(), 0..32)) {
            let enabled_count = rules.iter().filter(|r| r.enabled).count();
            prop_assert!(compile(&rules).len() <= enabled_count);
        }

        #[test]
        fn prop_output_order_positional(rules in proptest::collection::vec(arb_rule(), 0..32)) {
            let compiled = compile(&rules);
            for window in compiled.windows(2) {
                prop_assert!(window[0].id < window[1].id);
            }
        }
    }
}
