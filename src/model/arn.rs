//! Rule group ARNs.
//!
//! Format: `arn:<partition>:network-firewall:<region>:<account>:<kind>-rulegroup/<name>`
//! where `<kind>` is `stateful` or `stateless`.

use std::fmt;
use std::str::FromStr;

use super::RuleGroupType;
use crate::error::{Error, Result};

const SERVICE: &str = "network-firewall";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleGroupArn {
    pub partition: String,
    pub region: String,
    pub account_id: String,
    pub rule_group_type: RuleGroupType,
    pub name: String,
}

impl RuleGroupArn {
    pub fn new(
        partition: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
        rule_group_type: RuleGroupType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            region: region.into(),
            account_id: account_id.into(),
            rule_group_type,
            name: name.into(),
        }
    }

    /// The `<kind>-rulegroup/<name>` resource segment.
    pub fn resource(&self) -> String {
        format!("{}/{}", self.rule_group_type.arn_resource_kind(), self.name)
    }
}

impl fmt::Display for RuleGroupArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition,
            SERVICE,
            self.region,
            self.account_id,
            self.resource()
        )
    }
}

impl FromStr for RuleGroupArn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidArn(s.to_string());

        let parts: Vec<&str> = s.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" || parts[2] != SERVICE {
            return Err(invalid());
        }

        let (kind, name) = parts[5].split_once('/').ok_or_else(invalid)?;
        let rule_group_type = match kind {
            "stateful-rulegroup" => RuleGroupType::Stateful,
            "stateless-rulegroup" => RuleGroupType::Stateless,
            _ => return Err(invalid()),
        };
        if name.is_empty() || parts[1].is_empty() || parts[3].is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            partition: parts[1].to_string(),
            region: parts[3].to_string(),
            account_id: parts[4].to_string(),
            rule_group_type,
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_stateful_arn() {
        let arn = RuleGroupArn::new("aws", "us-west-2", "123456789012", RuleGroupType::Stateful, "web");
        assert_eq!(
            arn.to_string(),
            "arn:aws:network-firewall:us-west-2:123456789012:stateful-rulegroup/web"
        );
    }

    #[test]
    fn test_parse_stateless_arn() {
        let arn: RuleGroupArn = "arn:aws-us-gov:network-firewall:us-gov-west-1:111122223333:stateless-rulegroup/edge"
            .parse()
            .unwrap();
        assert_eq!(arn.partition, "aws-us-gov");
        assert_eq!(arn.rule_group_type, RuleGroupType::Stateless);
        assert_eq!(arn.name, "edge");
    }

    #[test]
    fn test_reject_foreign_arns() {
        assert!("arn:aws:s3:::bucket".parse::<RuleGroupArn>().is_err());
        assert!("arn:aws:network-firewall:us-east-1:1:firewall/fw"
            .parse::<RuleGroupArn>()
            .is_err());
        assert!("not-an-arn".parse::<RuleGroupArn>().is_err());
    }
}
