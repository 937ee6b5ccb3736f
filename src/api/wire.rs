//! Request and response shapes of the firewall service's JSON protocol.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{
    Direction, GeneratedRulesType, RuleGroupType, StatefulAction, StatefulProtocol, TargetType,
    TcpFlag,
};

// ============================================================================
// Rule group body
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_variables: Option<RuleVariables>,
    pub rules_source: RulesSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleVariables {
    #[serde(rename = "IPSets", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ip_sets: BTreeMap<String, IpSet>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub port_sets: BTreeMap<String, PortSet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpSet {
    pub definition: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortSet {
    pub definition: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RulesSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_source_list: Option<RulesSourceList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stateful_rules: Option<Vec<StatefulRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stateless_rules_and_custom_actions: Option<StatelessRulesAndCustomActions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RulesSourceList {
    pub targets: Vec<String>,
    pub target_types: Vec<TargetType>,
    pub generated_rules_type: GeneratedRulesType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatefulRule {
    pub action: StatefulAction,
    pub header: Header,
    #[serde(default)]
    pub rule_options: Vec<RuleOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Header {
    pub protocol: StatefulProtocol,
    pub source: String,
    pub source_port: String,
    pub direction: Direction,
    pub destination: String,
    pub destination_port: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleOption {
    pub keyword: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub settings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatelessRulesAndCustomActions {
    pub stateless_rules: Vec<StatelessRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_actions: Vec<CustomAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatelessRule {
    pub rule_definition: RuleDefinition,
    pub priority: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleDefinition {
    pub match_attributes: MatchAttributes,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MatchAttributes {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Address>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<Address>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_ports: Vec<PortRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination_ports: Vec<PortRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<u16>,
    #[serde(rename = "TCPFlags", default, skip_serializing_if = "Vec::is_empty")]
    pub tcp_flags: Vec<TcpFlagField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Address {
    pub address_definition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortRange {
    pub from_port: u32,
    pub to_port: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TcpFlagField {
    pub flags: Vec<TcpFlag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub masks: Vec<TcpFlag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomAction {
    pub action_name: String,
    pub action_definition: ActionDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionDefinition {
    pub publish_metric_action: PublishMetricAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublishMetricAction {
    pub dimensions: Vec<Dimension>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    pub value: String,
}

// ============================================================================
// Metadata
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Lifecycle status reported for a rule group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleGroupStatus {
    Active,
    Deleting,
}

/// Metadata describing a rule group, returned by every mutating call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleGroupResponse {
    pub rule_group_arn: String,
    pub rule_group_name: String,
    pub rule_group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub rule_group_type: Option<RuleGroupType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_group_status: Option<RuleGroupStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_associations: Option<u32>,
}

// ============================================================================
// Operations
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRuleGroupRequest {
    pub rule_group_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_group: Option<RuleGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,
    #[serde(rename = "Type")]
    pub rule_group_type: RuleGroupType,
    pub capacity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRuleGroupResponse {
    pub update_token: String,
    pub rule_group_response: RuleGroupResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeRuleGroupRequest {
    pub rule_group_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeRuleGroupResponse {
    pub update_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_group: Option<RuleGroup>,
    pub rule_group_response: RuleGroupResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateRuleGroupRequest {
    pub update_token: String,
    pub rule_group_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_group: Option<RuleGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub rule_group_type: Option<RuleGroupType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateRuleGroupResponse {
    pub update_token: String,
    pub rule_group_response: RuleGroupResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteRuleGroupRequest {
    pub rule_group_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteRuleGroupResponse {
    pub rule_group_response: RuleGroupResponse,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListRuleGroupsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleGroupMetadata {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListRuleGroupsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(default)]
    pub rule_groups: Vec<RuleGroupMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagResourceRequest {
    pub resource_arn: String,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UntagResourceRequest {
    pub resource_arn: String,
    pub tag_keys: Vec<String>,
}

/// Error body of a failed call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "__type", default)]
    pub error_type: Option<String>,
    #[serde(alias = "Message", default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// The bare error code from `__type`, falling back to `header` (the
    /// `x-amzn-ErrorType` response header).
    pub fn code<'a>(&'a self, header: Option<&'a str>) -> Option<&'a str> {
        self.error_type
            .as_deref()
            .or(header)
            .map(bare_error_code)
            .filter(|code| !code.is_empty())
    }
}

/// Strips a `namespace#` prefix and any `:detail` suffix from an error code.
pub fn bare_error_code(raw: &str) -> &str {
    let code = raw.split(':').next().unwrap_or(raw);
    code.rsplit('#').next().unwrap_or(code).trim()
}
