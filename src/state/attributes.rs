//! Flat attribute view of a rule group.
//!
//! A resource is flattened into dotted paths so states can be compared key by
//! key and checked with simple path queries:
//!
//! - `path.#` holds the element count of a block or set
//! - `path.%` holds the entry count of a map, entries live at `path.<key>`
//! - elements live at `path.<index>`; single blocks always use index `0`
//!
//! Collections are unordered: elements are sorted by their canonical JSON
//! form before indices are assigned, so reordering rules in a manifest or in
//! a service response never shows up as a change.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

/// How an attribute is represented in the flat view.
#[derive(Debug, Clone, Copy)]
enum Kind {
    Scalar,
    Block(&'static [Attr]),
    Set(Elem),
    Map,
}

#[derive(Debug, Clone, Copy)]
enum Elem {
    Scalar,
    Object(&'static [Attr]),
}

#[derive(Debug, Clone, Copy)]
struct Attr {
    name: &'static str,
    kind: Kind,
}

const fn scalar(name: &'static str) -> Attr {
    Attr {
        name,
        kind: Kind::Scalar,
    }
}

const fn block(name: &'static str, attrs: &'static [Attr]) -> Attr {
    Attr {
        name,
        kind: Kind::Block(attrs),
    }
}

const fn scalar_set(name: &'static str) -> Attr {
    Attr {
        name,
        kind: Kind::Set(Elem::Scalar),
    }
}

const fn object_set(name: &'static str, attrs: &'static [Attr]) -> Attr {
    Attr {
        name,
        kind: Kind::Set(Elem::Object(attrs)),
    }
}

// ============================================================================
// Schema
// ============================================================================

const DEFINITION: &[Attr] = &[scalar_set("definition")];

const IP_SET_VARIABLE: &[Attr] = &[scalar("key"), block("ip_set", DEFINITION)];

const PORT_SET_VARIABLE: &[Attr] = &[scalar("key"), block("port_set", DEFINITION)];

const RULE_VARIABLES: &[Attr] = &[
    object_set("ip_sets", IP_SET_VARIABLE),
    object_set("port_sets", PORT_SET_VARIABLE),
];

const RULES_SOURCE_LIST: &[Attr] = &[
    scalar("generated_rules_type"),
    scalar_set("target_types"),
    scalar_set("targets"),
];

const HEADER: &[Attr] = &[
    scalar("destination"),
    scalar("destination_port"),
    scalar("direction"),
    scalar("protocol"),
    scalar("source"),
    scalar("source_port"),
];

const RULE_OPTION: &[Attr] = &[scalar("keyword"), scalar_set("settings")];

const STATEFUL_RULE: &[Attr] = &[
    scalar("action"),
    block("header", HEADER),
    object_set("rule_option", RULE_OPTION),
];

const ADDRESS: &[Attr] = &[scalar("address_definition")];

const PORT_RANGE: &[Attr] = &[scalar("from_port"), scalar("to_port")];

const TCP_FLAG: &[Attr] = &[scalar_set("flags"), scalar_set("masks")];

const MATCH_ATTRIBUTES: &[Attr] = &[
    object_set("destination", ADDRESS),
    object_set("destination_port", PORT_RANGE),
    scalar_set("protocols"),
    object_set("source", ADDRESS),
    object_set("source_port", PORT_RANGE),
    object_set("tcp_flag", TCP_FLAG),
];

const RULE_DEFINITION: &[Attr] = &[
    scalar_set("actions"),
    block("match_attributes", MATCH_ATTRIBUTES),
];

const STATELESS_RULE: &[Attr] = &[scalar("priority"), block("rule_definition", RULE_DEFINITION)];

const DIMENSION: &[Attr] = &[scalar("value")];

const PUBLISH_METRIC_ACTION: &[Attr] = &[object_set("dimension", DIMENSION)];

const ACTION_DEFINITION: &[Attr] = &[block("publish_metric_action", PUBLISH_METRIC_ACTION)];

const CUSTOM_ACTION: &[Attr] = &[
    scalar("action_name"),
    block("action_definition", ACTION_DEFINITION),
];

const STATELESS_RULES_AND_CUSTOM_ACTIONS: &[Attr] = &[
    object_set("custom_action", CUSTOM_ACTION),
    object_set("stateless_rule", STATELESS_RULE),
];

const RULES_SOURCE: &[Attr] = &[
    scalar("rules_string"),
    block("rules_source_list", RULES_SOURCE_LIST),
    object_set("stateful_rule", STATEFUL_RULE),
    block(
        "stateless_rules_and_custom_actions",
        STATELESS_RULES_AND_CUSTOM_ACTIONS,
    ),
];

const RULE_GROUP: &[Attr] = &[
    block("rule_variables", RULE_VARIABLES),
    block("rules_source", RULES_SOURCE),
];

const RESOURCE: &[Attr] = &[
    scalar("id"),
    scalar("arn"),
    scalar("name"),
    scalar("type"),
    scalar("capacity"),
    scalar("description"),
    scalar("rules"),
    block("rule_group", RULE_GROUP),
    Attr {
        name: "tags",
        kind: Kind::Map,
    },
    scalar("update_token"),
];

// ============================================================================
// AttributeMap
// ============================================================================

/// Flat `path -> value` view of a rule group resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttributeMap(BTreeMap<String, String>);

impl AttributeMap {
    /// Flattens any value serializing with the rule group resource's field names.
    pub fn from_resource<T: Serialize>(resource: &T) -> Result<Self> {
        let value = serde_json::to_value(resource)?;
        let mut map = BTreeMap::new();
        flatten_object(&mut map, "", RESOURCE, &value);
        Ok(Self(map))
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keeps only the attributes for which `keep` returns true.
    pub fn filtered(&self, keep: impl Fn(&str) -> bool) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| keep(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// True if some attribute matching `pattern` equals `value`.
    ///
    /// `*` in the pattern matches any element index and may appear several
    /// times, e.g. `rule_group.0.rules_source.0.stateless_rules_and_custom_actions.0.stateless_rule.*.rule_definition.0.actions.*`.
    pub fn has_set_elem(&self, pattern: &str, value: &str) -> bool {
        let pattern: Vec<&str> = pattern.split('.').collect();
        self.0
            .iter()
            .any(|(k, v)| v == value && segments_match(&pattern, &k.split('.').collect::<Vec<_>>()))
    }

    /// True if some element matching `pattern` has every `(sub_path, value)` pair.
    ///
    /// `pattern` addresses the elements themselves and normally ends with `*`.
    pub fn has_set_elem_nested(&self, pattern: &str, expected: &[(&str, &str)]) -> bool {
        self.matching_elements(pattern).iter().any(|prefix| {
            expected
                .iter()
                .all(|(sub, value)| self.get(&format!("{prefix}.{sub}")) == Some(*value))
        })
    }

    /// Concrete element paths matching `pattern`, in sorted order.
    pub fn matching_elements(&self, pattern: &str) -> Vec<String> {
        let pattern: Vec<&str> = pattern.split('.').collect();
        let mut prefixes: Vec<String> = self
            .0
            .keys()
            .filter_map(|k| {
                let segments: Vec<&str> = k.split('.').collect();
                if segments.len() > pattern.len()
                    && segments_match(&pattern, &segments[..pattern.len()])
                {
                    Some(segments[..pattern.len()].join("."))
                } else {
                    None
                }
            })
            .collect();
        prefixes.sort();
        prefixes.dedup();
        prefixes
    }
}

impl fmt::Display for AttributeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.0 {
            writeln!(f, "{k} = {v}")?;
        }
        Ok(())
    }
}

fn segments_match(pattern: &[&str], segments: &[&str]) -> bool {
    pattern.len() == segments.len()
        && pattern.iter().zip(segments).all(|(p, s)| {
            if *p == "*" {
                s.parse::<usize>().is_ok()
            } else {
                p == s
            }
        })
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn flatten_object(out: &mut BTreeMap<String, String>, prefix: &str, attrs: &[Attr], value: &Value) {
    for attr in attrs {
        let path = join(prefix, attr.name);
        let child = value.get(attr.name).unwrap_or(&Value::Null);

        match attr.kind {
            Kind::Scalar => {
                if let Some(s) = scalar_string(child) {
                    out.insert(path, s);
                }
            }
            Kind::Block(inner) => {
                if child.is_object() {
                    out.insert(format!("{path}.#"), "1".to_string());
                    flatten_object(out, &format!("{path}.0"), inner, child);
                } else {
                    out.insert(format!("{path}.#"), "0".to_string());
                }
            }
            Kind::Set(elem) => {
                let items = canonical_elements(child, elem);
                out.insert(format!("{path}.#"), items.len().to_string());
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{path}.{i}");
                    match elem {
                        Elem::Scalar => {
                            if let Some(s) = scalar_string(item) {
                                out.insert(item_path, s);
                            }
                        }
                        Elem::Object(inner) => flatten_object(out, &item_path, inner, item),
                    }
                }
            }
            Kind::Map => {
                let entries = child.as_object();
                out.insert(
                    format!("{path}.%"),
                    entries.map_or(0, |m| m.len()).to_string(),
                );
                for (key, v) in entries.into_iter().flatten() {
                    if let Some(s) = scalar_string(v) {
                        out.insert(format!("{path}.{key}"), s);
                    }
                }
            }
        }
    }
}

/// Sorts set elements by their canonical form. Nested sets are sorted first
/// so equal elements always serialize identically.
fn canonical_elements(value: &Value, elem: Elem) -> Vec<Value> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    let mut keyed: Vec<(String, Value)> = items
        .iter()
        .map(|item| {
            let canonical = match elem {
                Elem::Scalar => item.clone(),
                Elem::Object(inner) => canonical_object(item, inner),
            };
            let key = match &canonical {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key, canonical)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.dedup_by(|a, b| a.0 == b.0);
    keyed.into_iter().map(|(_, v)| v).collect()
}

fn canonical_object(value: &Value, attrs: &[Attr]) -> Value {
    let Some(object) = value.as_object() else {
        return value.clone();
    };

    let mut out = serde_json::Map::new();
    for attr in attrs {
        let Some(child) = object.get(attr.name) else {
            continue;
        };
        let canonical = match attr.kind {
            Kind::Scalar | Kind::Map => child.clone(),
            Kind::Block(inner) => canonical_object(child, inner),
            Kind::Set(elem) => Value::Array(canonical_elements(child, elem)),
        };
        out.insert(attr.name.to_string(), canonical);
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stateful(rules: Value) -> AttributeMap {
        AttributeMap::from_resource(&json!({
            "name": "test",
            "type": "STATEFUL",
            "capacity": 100,
            "rule_group": {"rules_source": {"stateful_rule": rules}},
            "tags": {"Name": "test"}
        }))
        .unwrap()
    }

    fn rule(action: &str, sid: &str) -> Value {
        json!({
            "action": action,
            "header": {
                "destination": "ANY", "destination_port": "ANY", "direction": "ANY",
                "protocol": "IP", "source": "ANY", "source_port": "ANY"
            },
            "rule_option": [{"keyword": sid}]
        })
    }

    #[test]
    fn test_counts_for_blocks_sets_and_maps() {
        let attrs = stateful(json!([rule("PASS", "sid:1")]));
        assert_eq!(attrs.get("rule_group.#"), Some("1"));
        assert_eq!(attrs.get("rule_group.0.rules_source.#"), Some("1"));
        assert_eq!(attrs.get("rule_group.0.rule_variables.#"), Some("0"));
        assert_eq!(attrs.get("rule_group.0.rules_source.0.stateful_rule.#"), Some("1"));
        assert_eq!(
            attrs.get("rule_group.0.rules_source.0.stateless_rules_and_custom_actions.#"),
            Some("0")
        );
        assert_eq!(attrs.get("tags.%"), Some("1"));
        assert_eq!(attrs.get("tags.Name"), Some("test"));
        assert_eq!(attrs.get("capacity"), Some("100"));
        assert!(!attrs.contains("description"));
    }

    #[test]
    fn test_set_order_is_irrelevant() {
        let a = stateful(json!([rule("PASS", "sid:1"), rule("ALERT", "sid:2")]));
        let b = stateful(json!([rule("ALERT", "sid:2"), rule("PASS", "sid:1")]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_set_elem_queries() {
        let attrs = stateful(json!([rule("PASS", "sid:1"), rule("ALERT", "sid:2")]));
        assert!(attrs.has_set_elem_nested(
            "rule_group.0.rules_source.0.stateful_rule.*",
            &[("action", "ALERT"), ("rule_option.#", "1"), ("header.0.protocol", "IP")],
        ));
        assert!(!attrs.has_set_elem_nested(
            "rule_group.0.rules_source.0.stateful_rule.*",
            &[("action", "DROP")],
        ));
        assert!(attrs.has_set_elem(
            "rule_group.0.rules_source.0.stateful_rule.*.rule_option.*.keyword",
            "sid:2",
        ));
        assert_eq!(
            attrs
                .matching_elements("rule_group.0.rules_source.0.stateful_rule.*")
                .len(),
            2
        );
    }

    #[test]
    fn test_nested_wildcards() {
        let attrs = AttributeMap::from_resource(&json!({
            "rule_group": {"rules_source": {"stateless_rules_and_custom_actions": {
                "stateless_rule": [{
                    "priority": 10,
                    "rule_definition": {
                        "actions": ["aws:pass"],
                        "match_attributes": {"tcp_flag": [{"flags": ["SYN"], "masks": ["SYN", "ACK"]}]}
                    }
                }]
            }}}
        }))
        .unwrap();

        let base = "rule_group.0.rules_source.0.stateless_rules_and_custom_actions.0.stateless_rule.*";
        assert!(attrs.has_set_elem(
            &format!("{base}.rule_definition.0.match_attributes.0.tcp_flag.*.masks.*"),
            "ACK"
        ));
        assert!(attrs.has_set_elem(
            &format!("{base}.rule_definition.0.match_attributes.0.tcp_flag.*.flags.*"),
            "SYN"
        ));
        assert!(!attrs.has_set_elem(
            &format!("{base}.rule_definition.0.match_attributes.0.tcp_flag.*.flags.*"),
            "ACK"
        ));
    }
}
