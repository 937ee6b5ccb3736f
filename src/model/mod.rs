//! Declarative rule group model.
//!
//! These types describe a rule group the way a manifest declares it. Field
//! names follow the attribute tree used for state and plan output, so a
//! nested block such as `rule_group.rules_source.stateful_rule` maps
//! directly onto the dotted paths in [`crate::state::AttributeMap`].

pub mod arn;
pub mod rules;
pub mod variables;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use arn::RuleGroupArn;
pub use rules::*;
pub use variables::*;

/// Resource tags, kept sorted for stable output.
pub type Tags = BTreeMap<String, String>;

/// Whether the group inspects connections or individual packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleGroupType {
    Stateful,
    Stateless,
}

impl RuleGroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleGroupType::Stateful => "STATEFUL",
            RuleGroupType::Stateless => "STATELESS",
        }
    }

    /// Resource kind used in the ARN.
    pub fn arn_resource_kind(&self) -> &'static str {
        match self {
            RuleGroupType::Stateful => "stateful-rulegroup",
            RuleGroupType::Stateless => "stateless-rulegroup",
        }
    }
}

impl fmt::Display for RuleGroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule group as declared in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleGroupSpec {
    /// Unique name within the account and region
    pub name: String,

    #[serde(rename = "type")]
    pub rule_group_type: RuleGroupType,

    /// Maximum operating resources the group may consume
    pub capacity: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Suricata rules text, as an alternative to `rule_group`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_group: Option<RuleGroupBody>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
}

impl RuleGroupSpec {
    /// Creates a spec with no rules, description, or tags.
    pub fn new(name: impl Into<String>, rule_group_type: RuleGroupType, capacity: u32) -> Self {
        Self {
            name: name.into(),
            rule_group_type,
            capacity,
            description: None,
            rules: None,
            rule_group: None,
            tags: Tags::new(),
        }
    }

    pub fn with_rules(mut self, rules: impl Into<String>) -> Self {
        self.rules = Some(rules.into());
        self
    }

    pub fn with_rule_group(mut self, body: RuleGroupBody) -> Self {
        self.rule_group = Some(body);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// The rule group body: rules plus the variables they reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleGroupBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_variables: Option<RuleVariables>,
    pub rules_source: RulesSource,
}

impl RuleGroupBody {
    pub fn new(rules_source: RulesSource) -> Self {
        Self {
            rule_variables: None,
            rules_source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_from_yaml() {
        let spec: RuleGroupSpec = serde_yaml::from_str(
            r#"
name: example
type: STATEFUL
capacity: 100
rule_group:
  rules_source:
    rules_source_list:
      generated_rules_type: ALLOWLIST
      target_types: [HTTP_HOST]
      targets: [test.example.com]
tags:
  Name: example
"#,
        )
        .unwrap();

        assert_eq!(spec.rule_group_type, RuleGroupType::Stateful);
        assert_eq!(spec.capacity, 100);
        let list = spec
            .rule_group
            .unwrap()
            .rules_source
            .rules_source_list
            .unwrap();
        assert_eq!(list.generated_rules_type, GeneratedRulesType::Allowlist);
        assert_eq!(list.targets, vec!["test.example.com".to_string()]);
        assert_eq!(spec.tags.get("Name").map(String::as_str), Some("example"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<RuleGroupSpec, _> = serde_yaml::from_str(
            "name: x\ntype: STATELESS\ncapacity: 1\ncapcity: 2\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_type_display_and_arn_kind() {
        assert_eq!(RuleGroupType::Stateless.to_string(), "STATELESS");
        assert_eq!(RuleGroupType::Stateful.arn_resource_kind(), "stateful-rulegroup");
    }
}
