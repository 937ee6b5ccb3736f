//! Resource state and reconciliation.
//!
//! ## Overview
//!
//! - [`ResourceState`] is what netfw knows about one remote rule group after
//!   the last read.
//! - [`AttributeMap`] flattens a state (or a declared spec) into dotted paths
//!   used for comparison and path queries.
//! - [`plan`] compares prior state with a declared spec and decides between
//!   create, replace, in-place update, and no-op.
//! - [`StateFile`] persists resource states between runs as JSON.

pub mod attributes;
pub mod persistence;
pub mod plan;

use serde::{Deserialize, Serialize};

use crate::api::mapping;
use crate::api::DescribeRuleGroupResponse;
use crate::error::{Error, Result};
use crate::model::{RuleGroupArn, RuleGroupBody, RuleGroupSpec, RuleGroupType, Tags};

pub use attributes::AttributeMap;
pub use persistence::{resource_address, StateFile, RESOURCE_TYPE};
pub use plan::{diff_attributes, plan, verify_import, AttributeChange, ChangeKind, Plan, PlanAction};

/// Observed state of one rule group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Same as `arn`
    pub id: String,
    pub arn: String,
    pub name: String,
    #[serde(rename = "type")]
    pub rule_group_type: RuleGroupType,
    pub capacity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Rules text as last declared. The service never echoes it back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_group: Option<RuleGroupBody>,
    #[serde(default)]
    pub tags: Tags,
    pub update_token: String,
}

impl ResourceState {
    /// Builds state from a describe response. `rules` is carried over from the
    /// prior state or the declaration, since the service doesn't return it.
    pub fn from_describe(response: &DescribeRuleGroupResponse, rules: Option<String>) -> Result<Self> {
        let meta = &response.rule_group_response;
        let rule_group_type = match meta.rule_group_type {
            Some(t) => t,
            None => meta.rule_group_arn.parse::<RuleGroupArn>()?.rule_group_type,
        };
        let capacity = meta.capacity.ok_or_else(|| {
            Error::Internal(format!(
                "DescribeRuleGroup returned no capacity for {}",
                meta.rule_group_arn
            ))
        })?;

        Ok(Self {
            id: meta.rule_group_arn.clone(),
            arn: meta.rule_group_arn.clone(),
            name: meta.rule_group_name.clone(),
            rule_group_type,
            capacity,
            description: meta.description.clone().filter(|d| !d.is_empty()),
            rules,
            rule_group: response.rule_group.as_ref().map(mapping::flatten_rule_group),
            tags: mapping::flatten_tags(&meta.tags),
            update_token: response.update_token.clone(),
        })
    }

    pub fn attributes(&self) -> Result<AttributeMap> {
        AttributeMap::from_resource(self)
    }
}

/// A declared spec in the same shape as [`ResourceState`], for comparison.
///
/// The body is normalized the way the service would return it, and
/// `rule_group` is left out when only `rules` text is declared.
#[derive(Debug, Clone, Serialize)]
pub struct DesiredState<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub rule_group_type: RuleGroupType,
    pub capacity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_group: Option<RuleGroupBody>,
    pub tags: &'a Tags,
}

impl<'a> DesiredState<'a> {
    pub fn from_spec(spec: &'a RuleGroupSpec) -> Self {
        Self {
            name: &spec.name,
            rule_group_type: spec.rule_group_type,
            capacity: spec.capacity,
            description: spec.description.as_deref().filter(|d| !d.is_empty()),
            rules: spec.rules.as_deref(),
            rule_group: spec.rule_group.as_ref().map(mapping::normalize_rule_group),
            tags: &spec.tags,
        }
    }

    pub fn attributes(&self) -> Result<AttributeMap> {
        AttributeMap::from_resource(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::wire;

    fn describe_response() -> DescribeRuleGroupResponse {
        DescribeRuleGroupResponse {
            update_token: "token-1".into(),
            rule_group: Some(wire::RuleGroup {
                rule_variables: None,
                rules_source: wire::RulesSource {
                    rules_string: Some("pass ip any any -> any any (sid:1;)".into()),
                    ..Default::default()
                },
            }),
            rule_group_response: wire::RuleGroupResponse {
                rule_group_arn: "arn:aws:network-firewall:us-east-1:123456789012:stateful-rulegroup/web".into(),
                rule_group_name: "web".into(),
                rule_group_id: "id-1".into(),
                description: None,
                rule_group_type: None,
                capacity: Some(100),
                rule_group_status: None,
                tags: vec![wire::Tag::new("Name", "web")],
                consumed_capacity: None,
                number_of_associations: None,
            },
        }
    }

    #[test]
    fn test_from_describe_reads_type_from_arn() {
        let state = ResourceState::from_describe(&describe_response(), Some("rules".into())).unwrap();
        assert_eq!(state.rule_group_type, RuleGroupType::Stateful);
        assert_eq!(state.id, state.arn);
        assert_eq!(state.rules.as_deref(), Some("rules"));

        let attrs = state.attributes().unwrap();
        assert_eq!(
            attrs.get("rule_group.0.rules_source.0.rules_string"),
            Some("pass ip any any -> any any (sid:1;)")
        );
        assert_eq!(attrs.get("tags.Name"), Some("web"));
        assert_eq!(attrs.get("update_token"), Some("token-1"));
    }

    #[test]
    fn test_desired_state_omits_rule_group_for_rules_text() {
        let spec = RuleGroupSpec::new("web", RuleGroupType::Stateful, 100).with_rules("x");
        let attrs = DesiredState::from_spec(&spec).attributes().unwrap();
        assert_eq!(attrs.get("rules"), Some("x"));
        assert_eq!(attrs.get("rule_group.#"), Some("0"));
        assert_eq!(attrs.get("tags.%"), Some("0"));
    }
}
