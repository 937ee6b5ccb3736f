//! Conversion between the declarative model and the service's wire shapes.
//!
//! `expand_*` builds requests from a [`RuleGroupSpec`]; `flatten_*` turns a
//! described rule group back into the model so it can be compared with what
//! the manifest declares.

use crate::model::{self, RuleGroupBody, RuleGroupSpec, Tags};

use super::wire;

// ============================================================================
// Expand: model -> wire
// ============================================================================

/// Builds the create request. `rules` text, when set, replaces the body.
pub fn expand_create_request(spec: &RuleGroupSpec) -> wire::CreateRuleGroupRequest {
    wire::CreateRuleGroupRequest {
        rule_group_name: spec.name.clone(),
        rule_group: spec.rule_group.as_ref().map(expand_rule_group),
        rules: spec.rules.clone(),
        rule_group_type: spec.rule_group_type,
        capacity: spec.capacity,
        description: spec.description.clone(),
        tags: expand_tags(&spec.tags),
    }
}

/// Builds a full-replacement update request for `arn`.
pub fn expand_update_request(
    spec: &RuleGroupSpec,
    arn: &str,
    update_token: &str,
) -> wire::UpdateRuleGroupRequest {
    wire::UpdateRuleGroupRequest {
        update_token: update_token.to_string(),
        rule_group_arn: arn.to_string(),
        rule_group: spec.rule_group.as_ref().map(expand_rule_group),
        rules: spec.rules.clone(),
        rule_group_type: Some(spec.rule_group_type),
        // An omitted description leaves the current one in place.
        description: Some(spec.description.clone().unwrap_or_default()),
    }
}

pub fn expand_tags(tags: &Tags) -> Vec<wire::Tag> {
    tags.iter().map(|(k, v)| wire::Tag::new(k, v)).collect()
}

pub fn expand_rule_group(body: &RuleGroupBody) -> wire::RuleGroup {
    wire::RuleGroup {
        rule_variables: body
            .rule_variables
            .as_ref()
            .filter(|vars| !vars.is_empty())
            .map(expand_rule_variables),
        rules_source: expand_rules_source(&body.rules_source),
    }
}

fn expand_rule_variables(vars: &model::RuleVariables) -> wire::RuleVariables {
    wire::RuleVariables {
        ip_sets: vars
            .ip_sets
            .iter()
            .map(|v| {
                (
                    v.key.clone(),
                    wire::IpSet {
                        definition: v.ip_set.definition.clone(),
                    },
                )
            })
            .collect(),
        port_sets: vars
            .port_sets
            .iter()
            .map(|v| {
                (
                    v.key.clone(),
                    wire::PortSet {
                        definition: v.port_set.definition.clone(),
                    },
                )
            })
            .collect(),
    }
}

fn expand_rules_source(source: &model::RulesSource) -> wire::RulesSource {
    wire::RulesSource {
        rules_string: source.rules_string.clone(),
        rules_source_list: source
            .rules_source_list
            .as_ref()
            .map(|list| wire::RulesSourceList {
                targets: list.targets.clone(),
                target_types: list.target_types.clone(),
                generated_rules_type: list.generated_rules_type,
            }),
        stateful_rules: if source.stateful_rule.is_empty() {
            None
        } else {
            Some(source.stateful_rule.iter().map(expand_stateful_rule).collect())
        },
        stateless_rules_and_custom_actions: source
            .stateless_rules_and_custom_actions
            .as_ref()
            .map(expand_stateless),
    }
}

fn expand_stateful_rule(rule: &model::StatefulRule) -> wire::StatefulRule {
    let h = &rule.header;
    wire::StatefulRule {
        action: rule.action,
        header: wire::Header {
            protocol: h.protocol,
            source: h.source.clone(),
            source_port: h.source_port.clone(),
            direction: h.direction,
            destination: h.destination.clone(),
            destination_port: h.destination_port.clone(),
        },
        rule_options: rule
            .rule_option
            .iter()
            .map(|o| wire::RuleOption {
                keyword: o.keyword.clone(),
                settings: o.settings.clone(),
            })
            .collect(),
    }
}

fn expand_stateless(
    stateless: &model::StatelessRulesAndCustomActions,
) -> wire::StatelessRulesAndCustomActions {
    wire::StatelessRulesAndCustomActions {
        stateless_rules: stateless
            .stateless_rule
            .iter()
            .map(|rule| wire::StatelessRule {
                priority: rule.priority,
                rule_definition: wire::RuleDefinition {
                    actions: rule.rule_definition.actions.clone(),
                    match_attributes: expand_match_attributes(
                        &rule.rule_definition.match_attributes,
                    ),
                },
            })
            .collect(),
        custom_actions: stateless
            .custom_action
            .iter()
            .map(|action| wire::CustomAction {
                action_name: action.action_name.clone(),
                action_definition: wire::ActionDefinition {
                    publish_metric_action: wire::PublishMetricAction {
                        dimensions: action
                            .action_definition
                            .publish_metric_action
                            .dimension
                            .iter()
                            .map(|d| wire::Dimension {
                                value: d.value.clone(),
                            })
                            .collect(),
                    },
                },
            })
            .collect(),
    }
}

fn expand_match_attributes(attrs: &model::MatchAttributes) -> wire::MatchAttributes {
    let addresses = |list: &[model::AddressDefinition]| {
        list.iter()
            .map(|a| wire::Address {
                address_definition: a.address_definition.clone(),
            })
            .collect()
    };
    let ports = |list: &[model::PortRange]| {
        list.iter()
            .map(|p| wire::PortRange {
                from_port: p.from_port,
                to_port: p.to_port,
            })
            .collect()
    };

    wire::MatchAttributes {
        sources: addresses(&attrs.source),
        destinations: addresses(&attrs.destination),
        source_ports: ports(&attrs.source_port),
        destination_ports: ports(&attrs.destination_port),
        protocols: attrs.protocols.clone(),
        tcp_flags: attrs
            .tcp_flag
            .iter()
            .map(|f| wire::TcpFlagField {
                flags: f.flags.clone(),
                masks: f.masks.clone(),
            })
            .collect(),
    }
}

// ============================================================================
// Flatten: wire -> model
// ============================================================================

pub fn flatten_tags(tags: &[wire::Tag]) -> Tags {
    tags.iter()
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect()
}

pub fn flatten_rule_group(group: &wire::RuleGroup) -> RuleGroupBody {
    RuleGroupBody {
        rule_variables: group
            .rule_variables
            .as_ref()
            .map(flatten_rule_variables)
            .filter(|vars| !vars.is_empty()),
        rules_source: flatten_rules_source(&group.rules_source),
    }
}

fn flatten_rule_variables(vars: &wire::RuleVariables) -> model::RuleVariables {
    model::RuleVariables {
        ip_sets: vars
            .ip_sets
            .iter()
            .map(|(key, set)| model::IpSetVariable {
                key: key.clone(),
                ip_set: model::Definition::new(set.definition.iter().cloned()),
            })
            .collect(),
        port_sets: vars
            .port_sets
            .iter()
            .map(|(key, set)| model::PortSetVariable {
                key: key.clone(),
                port_set: model::Definition::new(set.definition.iter().cloned()),
            })
            .collect(),
    }
}

fn flatten_rules_source(source: &wire::RulesSource) -> model::RulesSource {
    model::RulesSource {
        rules_string: source.rules_string.clone(),
        rules_source_list: source
            .rules_source_list
            .as_ref()
            .map(|list| model::RulesSourceList {
                generated_rules_type: list.generated_rules_type,
                target_types: list.target_types.clone(),
                targets: list.targets.clone(),
            }),
        stateful_rule: source
            .stateful_rules
            .iter()
            .flatten()
            .map(flatten_stateful_rule)
            .collect(),
        stateless_rules_and_custom_actions: source
            .stateless_rules_and_custom_actions
            .as_ref()
            .map(flatten_stateless),
    }
}

fn flatten_stateful_rule(rule: &wire::StatefulRule) -> model::StatefulRule {
    let h = &rule.header;
    model::StatefulRule {
        action: rule.action,
        header: model::Header {
            destination: h.destination.clone(),
            destination_port: h.destination_port.clone(),
            direction: h.direction,
            protocol: h.protocol,
            source: h.source.clone(),
            source_port: h.source_port.clone(),
        },
        rule_option: rule
            .rule_options
            .iter()
            .map(|o| model::RuleOption {
                keyword: o.keyword.clone(),
                settings: o.settings.clone(),
            })
            .collect(),
    }
}

fn flatten_stateless(
    stateless: &wire::StatelessRulesAndCustomActions,
) -> model::StatelessRulesAndCustomActions {
    model::StatelessRulesAndCustomActions {
        custom_action: stateless
            .custom_actions
            .iter()
            .map(|action| model::CustomAction {
                action_name: action.action_name.clone(),
                action_definition: model::ActionDefinition {
                    publish_metric_action: model::PublishMetricAction {
                        dimension: action
                            .action_definition
                            .publish_metric_action
                            .dimensions
                            .iter()
                            .map(|d| model::Dimension {
                                value: d.value.clone(),
                            })
                            .collect(),
                    },
                },
            })
            .collect(),
        stateless_rule: stateless
            .stateless_rules
            .iter()
            .map(|rule| model::StatelessRule {
                priority: rule.priority,
                rule_definition: model::RuleDefinition {
                    actions: rule.rule_definition.actions.clone(),
                    match_attributes: flatten_match_attributes(
                        &rule.rule_definition.match_attributes,
                    ),
                },
            })
            .collect(),
    }
}

fn flatten_match_attributes(attrs: &wire::MatchAttributes) -> model::MatchAttributes {
    let addresses = |list: &[wire::Address]| {
        list.iter()
            .map(|a| model::AddressDefinition::new(a.address_definition.clone()))
            .collect()
    };
    let ports = |list: &[wire::PortRange]| {
        list.iter()
            .map(|p| model::PortRange {
                from_port: p.from_port,
                to_port: p.to_port,
            })
            .collect()
    };

    model::MatchAttributes {
        destination: addresses(&attrs.destinations),
        destination_port: ports(&attrs.destination_ports),
        protocols: attrs.protocols.clone(),
        source: addresses(&attrs.sources),
        source_port: ports(&attrs.source_ports),
        tcp_flag: attrs
            .tcp_flags
            .iter()
            .map(|f| model::TcpFlagMatch {
                flags: f.flags.clone(),
                masks: f.masks.clone(),
            })
            .collect(),
    }
}

/// Puts a declared body into the shape the service would return for it.
pub fn normalize_rule_group(body: &RuleGroupBody) -> RuleGroupBody {
    flatten_rule_group(&expand_rule_group(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    fn custom_action_spec() -> RuleGroupSpec {
        RuleGroupSpec::new("custom", RuleGroupType::Stateless, 100).with_rule_group(RuleGroupBody::new(
            RulesSource {
                stateless_rules_and_custom_actions: Some(StatelessRulesAndCustomActions {
                    custom_action: vec![CustomAction {
                        action_name: "example".into(),
                        action_definition: ActionDefinition {
                            publish_metric_action: PublishMetricAction {
                                dimension: vec![Dimension { value: "2".into() }],
                            },
                        },
                    }],
                    stateless_rule: vec![StatelessRule {
                        priority: 1,
                        rule_definition: RuleDefinition {
                            actions: vec!["aws:pass".into(), "example".into()],
                            match_attributes: MatchAttributes {
                                source: vec![AddressDefinition::new("1.2.3.4/32")],
                                source_port: vec![PortRange {
                                    from_port: 443,
                                    to_port: 443,
                                }],
                                destination: vec![AddressDefinition::new("124.1.1.5/32")],
                                destination_port: vec![PortRange {
                                    from_port: 443,
                                    to_port: 443,
                                }],
                                protocols: vec![6],
                                tcp_flag: vec![TcpFlagMatch {
                                    flags: vec![TcpFlag::Syn],
                                    masks: vec![TcpFlag::Syn, TcpFlag::Ack],
                                }],
                            },
                        },
                    }],
                }),
                ..Default::default()
            },
        ))
    }

    #[test]
    fn test_rules_text_goes_to_rules_field() {
        let spec = RuleGroupSpec::new("text", RuleGroupType::Stateful, 100)
            .with_rules("pass ip any any -> any any (sid:1;)")
            .with_tag("Name", "text");
        let req = expand_create_request(&spec);
        assert!(req.rule_group.is_none());
        assert_eq!(req.rules.as_deref(), Some("pass ip any any -> any any (sid:1;)"));
        assert_eq!(req.tags, vec![wire::Tag::new("Name", "text")]);
    }

    #[test]
    fn test_custom_action_wire_shape() {
        let req = expand_create_request(&custom_action_spec());
        let json = serde_json::to_value(&req).unwrap();
        let source = &json["RuleGroup"]["RulesSource"]["StatelessRulesAndCustomActions"];
        assert_eq!(
            source["CustomActions"][0]["ActionDefinition"]["PublishMetricAction"]["Dimensions"][0]["Value"],
            "2"
        );
        assert_eq!(source["StatelessRules"][0]["Priority"], 1);
        assert_eq!(
            source["StatelessRules"][0]["RuleDefinition"]["MatchAttributes"]["TCPFlags"][0]["Flags"][0],
            "SYN"
        );
        assert_eq!(json["Type"], "STATELESS");
    }

    #[test]
    fn test_flatten_restores_declared_body() {
        let spec = custom_action_spec();
        let body = spec.rule_group.as_ref().unwrap();
        assert_eq!(&normalize_rule_group(body), body);
    }

    #[test]
    fn test_empty_variables_normalize_away() {
        let body = RuleGroupBody {
            rule_variables: Some(RuleVariables::default()),
            rules_source: RulesSource::from_rules_string("pass ip any any -> any any (sid:1;)"),
        };
        assert!(normalize_rule_group(&body).rule_variables.is_none());
    }

    #[test]
    fn test_update_clears_description_explicitly() {
        let spec = RuleGroupSpec::new("web", RuleGroupType::Stateful, 100)
            .with_rules("pass ip any any -> any any (sid:1;)");
        let request = expand_update_request(&spec, "arn", "token");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["Description"], "");

        let described = expand_update_request(&spec.with_description("web"), "arn", "token");
        assert_eq!(described.description.as_deref(), Some("web"));
    }
}
