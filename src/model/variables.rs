//! Rule variables: named IP and port sets referenced from rule definitions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleVariables {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_sets: Vec<IpSetVariable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_sets: Vec<PortSetVariable>,
}

impl RuleVariables {
    pub fn is_empty(&self) -> bool {
        self.ip_sets.is_empty() && self.port_sets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IpSetVariable {
    pub key: String,
    pub ip_set: Definition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortSetVariable {
    pub key: String,
    pub port_set: Definition,
}

/// The members of an IP set (CIDRs) or port set (ports or ranges).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Definition {
    pub definition: Vec<String>,
}

impl Definition {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            definition: members.into_iter().map(Into::into).collect(),
        }
    }
}
