//! Rule sources: the four ways a rule group can carry its rules.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The rules carried by a rule group. Exactly one member must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesSource {
    /// Suricata-compatible rules text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_string: Option<String>,

    /// Domain allow/deny list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_source_list: Option<RulesSourceList>,

    /// Stateful 5-tuple rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stateful_rule: Vec<StatefulRule>,

    /// Stateless rules plus the custom actions they may reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stateless_rules_and_custom_actions: Option<StatelessRulesAndCustomActions>,
}

impl RulesSource {
    /// Number of rule source members that are set.
    pub fn populated_members(&self) -> usize {
        usize::from(self.rules_string.is_some())
            + usize::from(self.rules_source_list.is_some())
            + usize::from(!self.stateful_rule.is_empty())
            + usize::from(self.stateless_rules_and_custom_actions.is_some())
    }

    /// Builds a source carrying only rules text.
    pub fn from_rules_string(rules: impl Into<String>) -> Self {
        Self {
            rules_string: Some(rules.into()),
            ..Self::default()
        }
    }
}

/// Whether a domain list allows or denies its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeneratedRulesType {
    Allowlist,
    Denylist,
}

/// Which part of the traffic a domain list inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetType {
    TlsSni,
    HttpHost,
}

/// Stateful domain list inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesSourceList {
    pub generated_rules_type: GeneratedRulesType,
    pub target_types: Vec<TargetType>,
    pub targets: Vec<String>,
}

/// Action taken when a stateful rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatefulAction {
    Pass,
    Drop,
    Alert,
}

impl StatefulAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatefulAction::Pass => "PASS",
            StatefulAction::Drop => "DROP",
            StatefulAction::Alert => "ALERT",
        }
    }
}

impl fmt::Display for StatefulAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic direction a stateful rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Forward,
    Any,
}

/// Protocols understood by the stateful engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatefulProtocol {
    Ip,
    Tcp,
    Udp,
    Icmp,
    Http,
    Ftp,
    Tls,
    Smb,
    Dns,
    Dcerpc,
    Ssh,
    Smtp,
    Imap,
    Msn,
    Krb5,
    Ikev2,
    Tftp,
    Ntp,
    Dhcp,
}

/// The 5-tuple (plus direction) a stateful rule matches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Header {
    /// CIDR or `ANY`
    pub destination: String,
    /// Port, `from:to` range, or `ANY`
    #[serde(deserialize_with = "string_or_number")]
    pub destination_port: String,
    pub direction: Direction,
    pub protocol: StatefulProtocol,
    /// CIDR or `ANY`
    pub source: String,
    /// Port, `from:to` range, or `ANY`
    #[serde(deserialize_with = "string_or_number")]
    pub source_port: String,
}

/// Signature-engine option such as `sid:1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleOption {
    pub keyword: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub settings: Vec<String>,
}

/// A connection-aware rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatefulRule {
    pub action: StatefulAction,
    pub header: Header,
    pub rule_option: Vec<RuleOption>,
}

/// Stateless rules and the custom actions they may use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatelessRulesAndCustomActions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_action: Vec<CustomAction>,
    pub stateless_rule: Vec<StatelessRule>,
}

/// A priority-ordered packet match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatelessRule {
    pub priority: u32,
    pub rule_definition: RuleDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDefinition {
    /// Built-in (`aws:pass`, `aws:drop`, `aws:forward_to_sfe`) or custom action names
    pub actions: Vec<String>,
    pub match_attributes: MatchAttributes,
}

/// Packet attributes a stateless rule inspects. Empty collections match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchAttributes {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination: Vec<AddressDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination_port: Vec<PortRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<AddressDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_port: Vec<PortRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tcp_flag: Vec<TcpFlagMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressDefinition {
    pub address_definition: String,
}

impl AddressDefinition {
    pub fn new(cidr: impl Into<String>) -> Self {
        Self {
            address_definition: cidr.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortRange {
    pub from_port: u32,
    pub to_port: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TcpFlag {
    Fin,
    Syn,
    Rst,
    Psh,
    Ack,
    Urg,
    Ece,
    Cwr,
}

/// TCP flag match: `flags` must be set among the bits selected by `masks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TcpFlagMatch {
    pub flags: Vec<TcpFlag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub masks: Vec<TcpFlag>,
}

/// A named action usable from stateless rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomAction {
    pub action_name: String,
    pub action_definition: ActionDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionDefinition {
    pub publish_metric_action: PublishMetricAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishMetricAction {
    pub dimension: Vec<Dimension>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dimension {
    pub value: String,
}

/// Accepts `53` as well as `"53"` or `"ANY"` for port fields.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}
