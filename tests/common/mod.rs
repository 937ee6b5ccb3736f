//! Shared test utilities for the netfw test suite.
//!
//! This module provides a step-driven harness that plays a sequence of
//! manifests against the in-memory firewall service, the way a resource
//! lifecycle is exercised end to end:
//!
//! - config steps apply a manifest, run checks, then require an empty plan
//!   (or a non-empty one when the step expects drift)
//! - import steps import the resource by ARN into fresh state and compare
//!   it with the managed state, minus an ignore list
//! - after the last step everything is destroyed and every rule group the
//!   case created must be gone from the service
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use netfw::api::{MemoryRuleGroupApi, RuleGroupApi};
use netfw::engine::Engine;
use netfw::manifest::{ManifestLoader, Vars};
use netfw::resource::{ManagerOptions, RuleGroupManager};
use netfw::state::{verify_import, AttributeMap, StateFile};

/// Prefix of every rule group name created by tests; the sweeper targets it
pub const RESOURCE_PREFIX: &str = "tf-acc-test";

/// Label every single-resource manifest uses
pub const LABEL: &str = "test";

/// Account, region, and partition of the in-memory service
pub const ACCOUNT_ID: &str = "123456789012";
pub const REGION: &str = "us-east-1";
pub const PARTITION: &str = "aws";

pub type TestApi = Arc<MemoryRuleGroupApi>;

// ============================================================================
// Helper Functions
// ============================================================================

/// Random rule group name under [`RESOURCE_PREFIX`]
pub fn random_name() -> String {
    let suffix: u64 = rand::thread_rng().gen_range(100_000_000..1_000_000_000);
    format!("{}-{}", RESOURCE_PREFIX, suffix)
}

/// Manager options with delete polling fast enough for tests
pub fn fast_options() -> ManagerOptions {
    ManagerOptions {
        delete_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(5),
    }
}

pub fn memory_api() -> TestApi {
    Arc::new(MemoryRuleGroupApi::with_identity(PARTITION, REGION, ACCOUNT_ID))
}

pub fn engine(api: &TestApi) -> Engine<TestApi> {
    Engine::new(RuleGroupManager::with_options(api.clone(), fast_options()))
}

/// Expected ARN of a rule group in the in-memory service
pub fn regional_arn(resource: &str) -> String {
    format!(
        "arn:{}:network-firewall:{}:{}:{}",
        PARTITION, REGION, ACCOUNT_ID, resource
    )
}

/// Variables with `name` bound, as every test manifest expects
pub fn name_vars(name: &str) -> Vars {
    let mut vars = Vars::new();
    vars.insert("name".to_string(), serde_yaml::Value::from(name));
    vars
}

// ============================================================================
// Checks
// ============================================================================

/// One assertion made after a config step is applied.
#[derive(Debug, Clone)]
pub enum Check {
    /// The managed rule group exists in the service
    Exists,
    /// An attribute has exactly this value
    Attr(String, String),
    /// Some element matching the pattern has this value
    SetElem(String, String),
    /// Some element matching the pattern has all of these attributes
    SetElemNested(String, Vec<(String, String)>),
    /// The ARN is the regional ARN for this resource
    RegionalArn(String),
    /// Delete the rule group behind the harness's back
    Disappears,
}

pub fn exists() -> Check {
    Check::Exists
}

pub fn attr(path: &str, value: impl Into<String>) -> Check {
    Check::Attr(path.to_string(), value.into())
}

pub fn set_elem(pattern: &str, value: impl Into<String>) -> Check {
    Check::SetElem(pattern.to_string(), value.into())
}

pub fn set_elem_nested(pattern: &str, expected: &[(&str, &str)]) -> Check {
    Check::SetElemNested(
        pattern.to_string(),
        expected
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

pub fn regional_arn_check(resource: impl Into<String>) -> Check {
    Check::RegionalArn(resource.into())
}

pub fn disappears() -> Check {
    Check::Disappears
}

// ============================================================================
// Steps
// ============================================================================

/// A step of a test case.
#[derive(Debug, Clone)]
pub enum TestStep {
    Config {
        manifest: String,
        checks: Vec<Check>,
        expect_non_empty_plan: bool,
    },
    Import {
        ignore: Vec<String>,
    },
}

impl TestStep {
    pub fn config(manifest: impl Into<String>, checks: Vec<Check>) -> Self {
        TestStep::Config {
            manifest: manifest.into(),
            checks,
            expect_non_empty_plan: false,
        }
    }

    /// A config step after which the plan must still have changes
    pub fn config_with_drift(manifest: impl Into<String>, checks: Vec<Check>) -> Self {
        TestStep::Config {
            manifest: manifest.into(),
            checks,
            expect_non_empty_plan: true,
        }
    }

    pub fn import() -> Self {
        TestStep::Import { ignore: Vec::new() }
    }

    pub fn import_ignoring(ignore: &[&str]) -> Self {
        TestStep::Import {
            ignore: ignore.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A resource lifecycle played against a fresh in-memory service.
pub struct TestCase {
    pub name: String,
    pub steps: Vec<TestStep>,
    pub api: TestApi,
}

impl TestCase {
    pub fn new(name: impl Into<String>, steps: Vec<TestStep>) -> Self {
        Self {
            name: name.into(),
            steps,
            api: memory_api(),
        }
    }

    /// Runs every step, destroys, and checks the service is clean.
    pub async fn run(self) {
        let engine = engine(&self.api);
        let mut state = StateFile::new();
        let mut created: Vec<String> = Vec::new();
        let vars = name_vars(&self.name);

        for (i, step) in self.steps.iter().enumerate() {
            let step_no = i + 1;
            match step {
                TestStep::Config {
                    manifest,
                    checks,
                    expect_non_empty_plan,
                } => {
                    let manifest = ManifestLoader::new()
                        .load_str(&format!("step-{step_no}"), manifest, &vars)
                        .unwrap_or_else(|e| panic!("step {step_no}: bad manifest: {e}"));

                    engine
                        .refresh(&mut state)
                        .await
                        .unwrap_or_else(|e| panic!("step {step_no}: refresh failed: {e}"));
                    engine
                        .apply(&manifest, &mut state)
                        .await
                        .unwrap_or_else(|e| panic!("step {step_no}: apply failed: {e}"));

                    if let Some(resource) = state.get(LABEL) {
                        if !created.contains(&resource.arn) {
                            created.push(resource.arn.clone());
                        }
                    }

                    for check in checks {
                        self.run_check(step_no, check, &state).await;
                    }

                    engine
                        .refresh(&mut state)
                        .await
                        .unwrap_or_else(|e| panic!("step {step_no}: refresh failed: {e}"));
                    let plan = engine
                        .plan(&manifest, &state)
                        .unwrap_or_else(|e| panic!("step {step_no}: plan failed: {e}"));

                    if *expect_non_empty_plan {
                        assert!(
                            plan.has_changes(),
                            "step {step_no}: expected a non-empty plan after apply"
                        );
                    } else {
                        let pending: Vec<String> = plan
                            .changes
                            .iter()
                            .filter(|c| !c.plan.is_no_op())
                            .flat_map(|c| c.plan.changes.iter().map(|a| a.to_string()))
                            .collect();
                        assert!(
                            !plan.has_changes(),
                            "step {step_no}: plan not empty after apply:\n{}",
                            pending.join("\n")
                        );
                    }
                }
                TestStep::Import { ignore } => {
                    let expected = state
                        .get(LABEL)
                        .unwrap_or_else(|| panic!("step {step_no}: nothing to import"))
                        .clone();

                    let mut fresh = StateFile::new();
                    let imported = engine
                        .import(LABEL, &expected.arn, &mut fresh)
                        .await
                        .unwrap_or_else(|e| panic!("step {step_no}: import failed: {e}"));

                    let ignore: Vec<&str> = ignore.iter().map(String::as_str).collect();
                    let diff = verify_import(&imported, &expected, &ignore).unwrap();
                    let lines: Vec<String> = diff.iter().map(|c| c.to_string()).collect();
                    assert!(
                        diff.is_empty(),
                        "step {step_no}: imported state differs:\n{}",
                        lines.join("\n")
                    );
                }
            }
        }

        engine
            .destroy(&mut state)
            .await
            .unwrap_or_else(|e| panic!("destroy failed: {e}"));
        assert!(state.is_empty());
        check_destroyed(&self.api, &created).await;
    }

    async fn run_check(&self, step_no: usize, check: &Check, state: &StateFile) {
        let resource = state
            .get(LABEL)
            .unwrap_or_else(|| panic!("step {step_no}: {LABEL} not in state"));
        let attrs: AttributeMap = resource.attributes().unwrap();

        match check {
            Check::Exists => {
                assert!(!resource.id.is_empty(), "step {step_no}: no ID is set");
                self.api
                    .describe_rule_group(&resource.arn)
                    .await
                    .unwrap_or_else(|e| panic!("step {step_no}: rule group not found: {e}"));
            }
            Check::Attr(path, value) => {
                assert_eq!(
                    attrs.get(path),
                    Some(value.as_str()),
                    "step {step_no}: attribute {path}\n{attrs}"
                );
            }
            Check::SetElem(pattern, value) => {
                assert!(
                    attrs.has_set_elem(pattern, value),
                    "step {step_no}: no {pattern} equal to {value:?}\n{attrs}"
                );
            }
            Check::SetElemNested(pattern, expected) => {
                let expected: Vec<(&str, &str)> = expected
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                assert!(
                    attrs.has_set_elem_nested(pattern, &expected),
                    "step {step_no}: no {pattern} element with {expected:?}\n{attrs}"
                );
            }
            Check::RegionalArn(suffix) => {
                assert_eq!(
                    attrs.get("arn"),
                    Some(regional_arn(suffix).as_str()),
                    "step {step_no}: arn"
                );
            }
            Check::Disappears => {
                RuleGroupManager::with_options(self.api.clone(), fast_options())
                    .delete(&resource.arn)
                    .await
                    .unwrap_or_else(|e| panic!("step {step_no}: delete failed: {e}"));
            }
        }
    }
}

/// Every ARN must now describe as not-found.
pub async fn check_destroyed(api: &TestApi, arns: &[String]) {
    for arn in arns {
        match api.describe_rule_group(arn).await {
            Err(e) if e.is_not_found() => {}
            Err(e) => panic!("describing {arn} after destroy: {e}"),
            Ok(_) => panic!("rule group still exists: {arn}"),
        }
    }
}
