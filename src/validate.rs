//! Rule group validation.
//!
//! Every constraint a rule group must satisfy before it is sent to the
//! firewall service. Validation collects all violations instead of stopping
//! at the first one, so a manifest author sees every problem in one pass.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;

use crate::error::{Error, Result};
use crate::model::{
    PortRange, RuleGroupBody, RuleGroupSpec, RuleGroupType, RuleVariables, RulesSource,
    StatelessRulesAndCustomActions,
};

/// Rule group names: letters, digits, and hyphens.
static NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9-]{1,128}$").expect("Invalid name regex"));

/// Rule variable keys.
static VARIABLE_KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("Invalid variable key regex"));

/// Custom action names.
static ACTION_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("Invalid action name regex"));

/// Actions every stateless rule may use without declaring them.
pub const BUILTIN_STATELESS_ACTIONS: &[&str] = &["aws:pass", "aws:drop", "aws:forward_to_sfe"];

pub const MAX_CAPACITY: u32 = 30_000;
pub const MAX_DESCRIPTION_LEN: usize = 512;
pub const MAX_TAGS: usize = 50;
const MAX_PRIORITY: u32 = 65_535;
const MAX_PORT: u32 = 65_535;

/// A single constraint violation, addressed by attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Returns every violation in `spec`. An empty result means the spec is valid.
pub fn validate(spec: &RuleGroupSpec) -> Vec<ValidationIssue> {
    let mut v = Validator::default();
    v.check_spec(spec);
    v.issues
}

/// Validates `spec`, failing with [`Error::Validation`] when anything is wrong.
pub fn ensure_valid(label: &str, spec: &RuleGroupSpec) -> Result<()> {
    let issues = validate(spec);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation {
            resource: label.to_string(),
            issues,
        })
    }
}

#[derive(Default)]
struct Validator {
    issues: Vec<ValidationIssue>,
}

impl Validator {
    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::new(path, message));
    }

    fn check_spec(&mut self, spec: &RuleGroupSpec) {
        if !NAME_REGEX.is_match(&spec.name) {
            self.push(
                "name",
                "must be 1 to 128 characters of letters, digits, and hyphens",
            );
        }

        if spec.capacity == 0 || spec.capacity > MAX_CAPACITY {
            self.push("capacity", format!("must be between 1 and {MAX_CAPACITY}"));
        }

        if let Some(description) = &spec.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                self.push(
                    "description",
                    format!("must be at most {MAX_DESCRIPTION_LEN} characters"),
                );
            }
        }

        if spec.tags.len() > MAX_TAGS {
            self.push("tags", format!("at most {MAX_TAGS} tags are allowed"));
        }
        for (key, value) in &spec.tags {
            if key.is_empty() || key.chars().count() > 128 {
                self.push(format!("tags.{key}"), "tag keys must be 1 to 128 characters");
            }
            if value.chars().count() > 256 {
                self.push(format!("tags.{key}"), "tag values must be at most 256 characters");
            }
        }

        match (&spec.rules, &spec.rule_group) {
            (Some(_), Some(_)) => self.push("rules", "conflicts with rule_group"),
            (None, None) => self.push("rule_group", "one of rules or rule_group is required"),
            (Some(rules), None) => {
                if spec.rule_group_type != RuleGroupType::Stateful {
                    self.push("rules", "rules text is only supported by STATEFUL rule groups");
                }
                if rules.trim().is_empty() {
                    self.push("rules", "must not be empty");
                }
            }
            (None, Some(body)) => self.check_body(spec.rule_group_type, body),
        }
    }

    fn check_body(&mut self, rule_group_type: RuleGroupType, body: &RuleGroupBody) {
        if let Some(variables) = &body.rule_variables {
            if rule_group_type == RuleGroupType::Stateless && !variables.is_empty() {
                self.push(
                    "rule_group.0.rule_variables",
                    "rule variables are only supported by STATEFUL rule groups",
                );
            }
            self.check_variables(variables);
        }
        self.check_source(rule_group_type, &body.rules_source);
    }

    fn check_variables(&mut self, variables: &RuleVariables) {
        let base = "rule_group.0.rule_variables.0";

        let mut seen = HashSet::new();
        for (i, ip_set) in variables.ip_sets.iter().enumerate() {
            let path = format!("{base}.ip_sets.{i}");
            self.check_variable_key(&path, &ip_set.key, &mut seen);
            if ip_set.ip_set.definition.is_empty() {
                self.push(format!("{path}.ip_set.0.definition"), "must not be empty");
            }
            for cidr in &ip_set.ip_set.definition {
                if !is_cidr(cidr) {
                    self.push(
                        format!("{path}.ip_set.0.definition"),
                        format!("'{cidr}' is not a valid CIDR block"),
                    );
                }
            }
        }

        let mut seen = HashSet::new();
        for (i, port_set) in variables.port_sets.iter().enumerate() {
            let path = format!("{base}.port_sets.{i}");
            self.check_variable_key(&path, &port_set.key, &mut seen);
            if port_set.port_set.definition.is_empty() {
                self.push(format!("{path}.port_set.0.definition"), "must not be empty");
            }
            for port in &port_set.port_set.definition {
                if !is_port_expression(port) {
                    self.push(
                        format!("{path}.port_set.0.definition"),
                        format!("'{port}' is not a valid port or port range"),
                    );
                }
            }
        }
    }

    fn check_variable_key<'a>(&mut self, path: &str, key: &'a str, seen: &mut HashSet<&'a str>) {
        if !VARIABLE_KEY_REGEX.is_match(key) {
            self.push(
                format!("{path}.key"),
                "must start with a letter and contain only letters, digits, and underscores",
            );
        }
        if !seen.insert(key) {
            self.push(format!("{path}.key"), format!("duplicate variable '{key}'"));
        }
    }

    fn check_source(&mut self, rule_group_type: RuleGroupType, source: &RulesSource) {
        let base = "rule_group.0.rules_source.0";

        match source.populated_members() {
            0 => {
                self.push(base, "exactly one rules source must be set");
                return;
            }
            1 => {}
            _ => self.push(base, "only one rules source may be set"),
        }

        let stateful_only = source.rules_string.is_some()
            || source.rules_source_list.is_some()
            || !source.stateful_rule.is_empty();
        if stateful_only && rule_group_type != RuleGroupType::Stateful {
            self.push(
                base,
                "rules_string, rules_source_list, and stateful_rule require a STATEFUL rule group",
            );
        }
        if source.stateless_rules_and_custom_actions.is_some()
            && rule_group_type != RuleGroupType::Stateless
        {
            self.push(
                format!("{base}.stateless_rules_and_custom_actions"),
                "requires a STATELESS rule group",
            );
        }

        if let Some(list) = &source.rules_source_list {
            let path = format!("{base}.rules_source_list.0");
            if list.targets.is_empty() {
                self.push(format!("{path}.targets"), "must not be empty");
            }
            if list.target_types.is_empty() {
                self.push(format!("{path}.target_types"), "must not be empty");
            }
        }

        for (i, rule) in source.stateful_rule.iter().enumerate() {
            let path = format!("{base}.stateful_rule.{i}");
            let header = &rule.header;
            for (field, value) in [("destination", &header.destination), ("source", &header.source)] {
                if !is_address_expression(value) {
                    self.push(
                        format!("{path}.header.0.{field}"),
                        format!("'{value}' is not ANY, a CIDR block, or a variable"),
                    );
                }
            }
            for (field, value) in [
                ("destination_port", &header.destination_port),
                ("source_port", &header.source_port),
            ] {
                if !is_port_expression(value) {
                    self.push(
                        format!("{path}.header.0.{field}"),
                        format!("'{value}' is not ANY, a port, a port range, or a variable"),
                    );
                }
            }
            for (j, option) in rule.rule_option.iter().enumerate() {
                if option.keyword.trim().is_empty() {
                    self.push(format!("{path}.rule_option.{j}.keyword"), "must not be empty");
                }
            }
        }

        if let Some(stateless) = &source.stateless_rules_and_custom_actions {
            self.check_stateless(&format!("{base}.stateless_rules_and_custom_actions.0"), stateless);
        }
    }

    fn check_stateless(&mut self, base: &str, stateless: &StatelessRulesAndCustomActions) {
        let mut custom = HashSet::new();
        for (i, action) in stateless.custom_action.iter().enumerate() {
            let path = format!("{base}.custom_action.{i}");
            if !ACTION_NAME_REGEX.is_match(&action.action_name) {
                self.push(
                    format!("{path}.action_name"),
                    "must contain only letters and digits",
                );
            }
            if !custom.insert(action.action_name.as_str()) {
                self.push(
                    format!("{path}.action_name"),
                    format!("duplicate custom action '{}'", action.action_name),
                );
            }
            if action.action_definition.publish_metric_action.dimension.is_empty() {
                self.push(
                    format!("{path}.action_definition.0.publish_metric_action.0.dimension"),
                    "must not be empty",
                );
            }
        }

        if stateless.stateless_rule.is_empty() {
            self.push(format!("{base}.stateless_rule"), "at least one stateless rule is required");
        }

        let mut priorities = HashSet::new();
        for (i, rule) in stateless.stateless_rule.iter().enumerate() {
            let path = format!("{base}.stateless_rule.{i}");
            if rule.priority == 0 || rule.priority > MAX_PRIORITY {
                self.push(
                    format!("{path}.priority"),
                    format!("must be between 1 and {MAX_PRIORITY}"),
                );
            }
            if !priorities.insert(rule.priority) {
                self.push(
                    format!("{path}.priority"),
                    format!("priority {} is used by more than one rule", rule.priority),
                );
            }

            let definition = &rule.rule_definition;
            let def_path = format!("{path}.rule_definition.0");
            if definition.actions.is_empty() {
                self.push(format!("{def_path}.actions"), "must not be empty");
            }
            for action in &definition.actions {
                if !BUILTIN_STATELESS_ACTIONS.contains(&action.as_str())
                    && !custom.contains(action.as_str())
                {
                    self.push(
                        format!("{def_path}.actions"),
                        format!("'{action}' is neither a built-in action nor a declared custom action"),
                    );
                }
            }

            let attrs = &definition.match_attributes;
            let attr_path = format!("{def_path}.match_attributes.0");
            for (field, addresses) in [("destination", &attrs.destination), ("source", &attrs.source)] {
                for address in addresses {
                    if !is_cidr(&address.address_definition) {
                        self.push(
                            format!("{attr_path}.{field}"),
                            format!("'{}' is not a valid CIDR block", address.address_definition),
                        );
                    }
                }
            }
            for (field, ranges) in [
                ("destination_port", &attrs.destination_port),
                ("source_port", &attrs.source_port),
            ] {
                for range in ranges {
                    if let Some(message) = port_range_problem(range) {
                        self.push(format!("{attr_path}.{field}"), message);
                    }
                }
            }
            for protocol in &attrs.protocols {
                if *protocol > 255 {
                    self.push(
                        format!("{attr_path}.protocols"),
                        format!("protocol {protocol} must be between 0 and 255"),
                    );
                }
            }
            for (j, flag) in attrs.tcp_flag.iter().enumerate() {
                if flag.flags.is_empty() {
                    self.push(format!("{attr_path}.tcp_flag.{j}.flags"), "must not be empty");
                }
            }
        }
    }
}

fn port_range_problem(range: &PortRange) -> Option<String> {
    if range.from_port > MAX_PORT || range.to_port > MAX_PORT {
        Some(format!("ports must be between 0 and {MAX_PORT}"))
    } else if range.from_port > range.to_port {
        Some(format!(
            "from_port {} is greater than to_port {}",
            range.from_port, range.to_port
        ))
    } else {
        None
    }
}

fn is_cidr(value: &str) -> bool {
    let Some((addr, prefix)) = value.split_once('/') else {
        return false;
    };
    let Ok(addr) = addr.parse::<IpAddr>() else {
        return false;
    };
    let max = if addr.is_ipv4() { 32 } else { 128 };
    matches!(prefix.parse::<u8>(), Ok(p) if p <= max)
}

fn is_variable_reference(value: &str) -> bool {
    value
        .strip_prefix('$')
        .map(|name| VARIABLE_KEY_REGEX.is_match(name))
        .unwrap_or(false)
}

fn is_address_expression(value: &str) -> bool {
    value.eq_ignore_ascii_case("ANY") || is_cidr(value) || is_variable_reference(value)
}

fn is_port(value: &str) -> bool {
    matches!(value.parse::<u32>(), Ok(p) if p <= MAX_PORT)
}

fn is_port_expression(value: &str) -> bool {
    if value.eq_ignore_ascii_case("ANY") || is_port(value) || is_variable_reference(value) {
        return true;
    }
    match value.split_once(':') {
        Some((from, to)) if is_port(from) && is_port(to) => {
            from.parse::<u32>().ok() <= to.parse::<u32>().ok()
        }
        _ => false,
    }
}
