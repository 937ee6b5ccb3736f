//! Manifest loading.
//!
//! A manifest is YAML rendered through minijinja first, so values can come
//! from `-e key=value` variables:
//!
//! ```yaml
//! rule_groups:
//!   web:
//!     name: "{{ prefix }}-web"
//!     type: STATEFUL
//!     capacity: 100
//!     rules: |
//!       pass tcp any any -> any 443 (sid:1;)
//! ```

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use minijinja::{Environment, UndefinedBehavior, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::RuleGroupSpec;
use crate::validate::{validate, ValidationIssue};

/// Template variables, in the order they were given.
pub type Vars = IndexMap<String, serde_yaml::Value>;

/// Rule groups declared by a manifest, keyed by label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub rule_groups: IndexMap<String, RuleGroupSpec>,
}

impl Manifest {
    pub fn get(&self, label: &str) -> Option<&RuleGroupSpec> {
        self.rule_groups.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rule_groups.keys().map(String::as_str)
    }

    /// Validates every declaration, reporting all problems of the first
    /// invalid one. Two labels declaring the same name and type also fail.
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashMap<(String, &'static str), &str> = HashMap::new();

        for (label, spec) in &self.rule_groups {
            let mut issues = validate(spec);

            let key = (spec.name.clone(), spec.rule_group_type.as_str());
            if let Some(other) = seen.insert(key, label) {
                issues.push(ValidationIssue::new(
                    "name",
                    format!("'{}' is also declared by '{}'", spec.name, other),
                ));
            }

            if !issues.is_empty() {
                return Err(Error::Validation {
                    resource: label.clone(),
                    issues,
                });
            }
        }
        Ok(())
    }
}

/// Renders and parses manifests.
#[derive(Debug)]
pub struct ManifestLoader {
    env: Environment<'static>,
}

impl Default for ManifestLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestLoader {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }

    /// Renders `source` with `vars`.
    pub fn render(&self, name: &str, source: &str, vars: &Vars) -> Result<String> {
        if !has_template(source) {
            return Ok(source.to_string());
        }
        self.env
            .render_str(source, Value::from_serialize(vars))
            .map_err(|e| Error::template_render(name, e.to_string()))
    }

    /// Renders and parses manifest text. `name` is used in error messages.
    pub fn load_str(&self, name: &str, source: &str, vars: &Vars) -> Result<Manifest> {
        let rendered = self.render(name, source, vars)?;
        let manifest: Manifest = serde_yaml::from_str(&rendered)
            .map_err(|e| Error::manifest_parse(name, e.to_string(), Some(Box::new(e))))?;
        debug!(manifest = name, rule_groups = manifest.rule_groups.len(), "Loaded manifest");
        Ok(manifest)
    }

    pub fn load_file(&self, path: &Path, vars: &Vars) -> Result<Manifest> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::manifest_parse(path, e.to_string(), Some(Box::new(e))))?;
        self.load_str(&path.display().to_string(), &source, vars)
    }
}

fn has_template(s: &str) -> bool {
    s.contains("{{") || s.contains("{%") || s.contains("{#")
}

/// Parses a `key=value` variable. The value is read as a YAML scalar, so
/// `count=3` yields a number and `name=web` a string.
pub fn parse_var(s: &str) -> Result<(String, serde_yaml::Value)> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| Error::Config(format!("expected key=value, got '{s}'")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::Config(format!("empty variable name in '{s}'")));
    }

    let value = match serde_yaml::from_str::<serde_yaml::Value>(raw) {
        Ok(v @ (serde_yaml::Value::Bool(_) | serde_yaml::Value::Number(_))) => v,
        _ => serde_yaml::Value::String(raw.to_string()),
    };
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RuleGroupType;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[&str]) -> Vars {
        pairs.iter().map(|p| parse_var(p).unwrap()).collect()
    }

    const MANIFEST: &str = r#"
rule_groups:
  web:
    name: "{{ prefix }}-web"
    type: STATEFUL
    capacity: {{ capacity }}
    rules: |
      pass tcp any any -> any 443 (sid:1;)
    tags:
      Name: "{{ prefix }}-web"
  ping:
    name: "{{ prefix }}-ping"
    type: STATELESS
    capacity: 10
    rule_group:
      rules_source:
        stateless_rules_and_custom_actions:
          stateless_rule:
            - priority: 1
              rule_definition:
                actions: ["aws:pass"]
                match_attributes:
                  protocols: [1]
"#;

    #[test]
    fn test_load_renders_and_keeps_order() {
        let manifest = ManifestLoader::new()
            .load_str("test", MANIFEST, &vars(&["prefix=tf-acc", "capacity=100"]))
            .unwrap();

        assert_eq!(manifest.labels().collect::<Vec<_>>(), vec!["web", "ping"]);
        let web = manifest.get("web").unwrap();
        assert_eq!(web.name, "tf-acc-web");
        assert_eq!(web.capacity, 100);
        assert_eq!(web.tags.get("Name").map(String::as_str), Some("tf-acc-web"));
        assert_eq!(
            manifest.get("ping").unwrap().rule_group_type,
            RuleGroupType::Stateless
        );
        manifest.validate().unwrap();
    }

    #[test]
    fn test_undefined_variable_fails() {
        let err = ManifestLoader::new()
            .load_str("test", MANIFEST, &vars(&["capacity=100"]))
            .unwrap_err();
        assert!(matches!(err, Error::TemplateRender { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let source = "rule_groups:\n  a:\n    name: a\n    type: STATEFUL\n    capacity: 1\n    rulez: x\n";
        let err = ManifestLoader::new().load_str("test", source, &Vars::new()).unwrap_err();
        assert!(matches!(err, Error::ManifestParse { .. }));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let source = r#"
rule_groups:
  a: { name: same, type: STATEFUL, capacity: 10, rules: "pass ip any any -> any any (sid:1;)" }
  b: { name: same, type: STATEFUL, capacity: 10, rules: "pass ip any any -> any any (sid:1;)" }
"#;
        let manifest = ManifestLoader::new().load_str("test", source, &Vars::new()).unwrap();
        match manifest.validate().unwrap_err() {
            Error::Validation { resource, issues } => {
                assert_eq!(resource, "b");
                assert!(issues[0].message.contains("also declared by 'a'"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_var_types() {
        assert_eq!(parse_var("n=3").unwrap().1, serde_yaml::Value::from(3));
        assert_eq!(parse_var("b=true").unwrap().1, serde_yaml::Value::Bool(true));
        assert_eq!(
            parse_var("s=a=b").unwrap(),
            ("s".to_string(), serde_yaml::Value::String("a=b".into()))
        );
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }
}
