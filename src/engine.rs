//! Runs a manifest against the state file.
//!
//! The engine pairs every declared label with its state entry and decides
//! what to do per label. Labels left in state but no longer declared are
//! planned for deletion. In check mode nothing remote or in state changes.

use serde::Serialize;
use std::fmt;
use tracing::{info, instrument};

use crate::api::RuleGroupApi;
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::model::RuleGroupSpec;
use crate::resource::RuleGroupManager;
use crate::state::{plan, resource_address, Plan, PlanAction, ResourceState, StateFile};

/// Planned change for one resource address.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedChange {
    pub label: String,
    pub address: String,
    pub plan: Plan,
}

/// Plans for every label, in manifest order followed by removals.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnginePlan {
    pub changes: Vec<PlannedChange>,
}

impl EnginePlan {
    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|c| !c.plan.is_no_op())
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for change in &self.changes {
            match change.plan.action {
                PlanAction::Create => summary.add += 1,
                PlanAction::Replace { .. } => {
                    summary.add += 1;
                    summary.destroy += 1;
                }
                PlanAction::Update => summary.change += 1,
                PlanAction::Delete => summary.destroy += 1,
                PlanAction::NoOp => {}
            }
        }
        summary
    }
}

/// Counts of planned changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub add: usize,
    pub change: usize,
    pub destroy: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to add, {} to change, {} to destroy",
            self.add, self.change, self.destroy
        )
    }
}

/// What `refresh` found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    /// Labels whose rule group no longer exists
    pub removed: Vec<String>,
}

/// Result of `apply`.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub plan: EnginePlan,
    /// Labels actually changed; empty in check mode
    pub applied: Vec<String>,
    pub check_mode: bool,
}

/// Executes manifests and keeps the state file current.
#[derive(Debug)]
pub struct Engine<A> {
    manager: RuleGroupManager<A>,
    check_mode: bool,
}

impl<A: RuleGroupApi> Engine<A> {
    pub fn new(manager: RuleGroupManager<A>) -> Self {
        Self {
            manager,
            check_mode: false,
        }
    }

    /// In check mode `apply`, `import`, and `destroy` report without acting.
    pub fn check_mode(mut self, enabled: bool) -> Self {
        self.check_mode = enabled;
        self
    }

    pub fn manager(&self) -> &RuleGroupManager<A> {
        &self.manager
    }

    /// Plans `manifest` against `state` without calling the service.
    pub fn plan(&self, manifest: &Manifest, state: &StateFile) -> Result<EnginePlan> {
        manifest.validate()?;

        let mut changes = Vec::new();
        for (label, spec) in &manifest.rule_groups {
            changes.push(PlannedChange {
                label: label.clone(),
                address: resource_address(label),
                plan: plan(state.get(label), spec)?,
            });
        }

        for label in state.labels() {
            if manifest.get(&label).is_some() {
                continue;
            }
            if let Some(prior) = state.get(&label) {
                changes.push(PlannedChange {
                    address: resource_address(&label),
                    plan: Plan::delete(prior)?,
                    label,
                });
            }
        }

        Ok(EnginePlan { changes })
    }

    /// Re-reads every resource in state. Rule groups that disappeared are
    /// dropped, so the next plan creates them again.
    #[instrument(skip_all)]
    pub async fn refresh(&self, state: &mut StateFile) -> Result<RefreshReport> {
        let mut report = RefreshReport::default();

        for label in state.labels() {
            let Some(prior) = state.get(&label).cloned() else {
                continue;
            };
            match self.manager.refresh(&prior).await? {
                Some(current) => {
                    state.insert(&label, current);
                    report.refreshed.push(label);
                }
                None => {
                    state.remove(&label);
                    report.removed.push(label);
                }
            }
        }

        info!(
            refreshed = report.refreshed.len(),
            removed = report.removed.len(),
            "Refreshed state"
        );
        Ok(report)
    }

    /// Plans and executes `manifest`, recording every success in `state`.
    ///
    /// Removals run before anything else. Stops at the first failure; changes
    /// made before it stay recorded.
    #[instrument(skip_all, fields(check_mode = self.check_mode))]
    pub async fn apply(&self, manifest: &Manifest, state: &mut StateFile) -> Result<ApplyReport> {
        let plan = self.plan(manifest, state)?;
        let mut applied = Vec::new();

        if self.check_mode {
            return Ok(ApplyReport {
                plan,
                applied,
                check_mode: true,
            });
        }

        // Removals run first; a renamed label may reuse the name they free.
        let (deletes, others): (Vec<_>, Vec<_>) = plan
            .changes
            .iter()
            .filter(|c| !c.plan.is_no_op())
            .partition(|c| c.plan.action == PlanAction::Delete);

        for change in deletes.into_iter().chain(others) {
            let label = change.label.as_str();
            match &change.plan.action {
                PlanAction::NoOp => continue,
                PlanAction::Delete => self.remove(label, state).await?,
                PlanAction::Replace { reasons } => {
                    let spec = self.declaration(manifest, label)?;
                    info!(address = %change.address, reasons = ?reasons, "Replacing");
                    // Once the old group is gone it must leave state, even if
                    // the create below fails.
                    self.remove(label, state).await?;
                    let created = self.manager.create(label, spec).await?;
                    state.insert(label, created);
                }
                PlanAction::Create | PlanAction::Update => {
                    let spec = self.declaration(manifest, label)?;
                    let prior = state.get(label).cloned();
                    let outcome = self.manager.apply(label, prior.as_ref(), spec).await?;
                    state.insert(label, outcome.state);
                }
            }
            info!(address = %change.address, action = %change.plan.action, "Applied");
            applied.push(change.label.clone());
        }

        Ok(ApplyReport {
            plan,
            applied,
            check_mode: false,
        })
    }

    fn declaration<'m>(&self, manifest: &'m Manifest, label: &str) -> Result<&'m RuleGroupSpec> {
        manifest
            .get(label)
            .ok_or_else(|| Error::Internal(format!("no declaration for '{label}'")))
    }

    /// Deletes the rule group behind `label` and drops it from state.
    async fn remove(&self, label: &str, state: &mut StateFile) -> Result<()> {
        if let Some(prior) = state.get(label) {
            let arn = prior.arn.clone();
            self.manager.delete(&arn).await?;
        }
        state.remove(label);
        Ok(())
    }

    /// Brings an existing rule group under management as `label`.
    #[instrument(skip(self, state))]
    pub async fn import(
        &self,
        label: &str,
        arn: &str,
        state: &mut StateFile,
    ) -> Result<ResourceState> {
        if state.contains(label) {
            return Err(Error::AlreadyInState(resource_address(label)));
        }

        let imported = self.manager.import(arn).await?;
        if !self.check_mode {
            state.insert(label, imported.clone());
        }
        Ok(imported)
    }

    /// Deletes every managed rule group, newest first. Returns the labels
    /// destroyed (or that would be, in check mode).
    #[instrument(skip_all, fields(check_mode = self.check_mode))]
    pub async fn destroy(&self, state: &mut StateFile) -> Result<Vec<String>> {
        let mut labels = state.labels();
        labels.reverse();

        if self.check_mode {
            return Ok(labels);
        }

        for label in &labels {
            self.remove(label, state).await?;
        }
        Ok(labels)
    }

    /// Destroys a single label.
    pub async fn destroy_one(&self, label: &str, state: &mut StateFile) -> Result<()> {
        let prior = state
            .get(label)
            .ok_or_else(|| Error::NotInState(resource_address(label)))?;
        if self.check_mode {
            return Ok(());
        }
        let arn = prior.arn.clone();
        self.manager.delete(&arn).await?;
        state.remove(label);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryRuleGroupApi;
    use crate::manifest::{ManifestLoader, Vars};
    use crate::resource::ManagerOptions;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine(api: Arc<MemoryRuleGroupApi>) -> Engine<Arc<MemoryRuleGroupApi>> {
        Engine::new(RuleGroupManager::with_options(
            api,
            ManagerOptions {
                delete_timeout: Duration::from_millis(50),
                poll_interval: Duration::from_millis(5),
            },
        ))
    }

    fn manifest(source: &str) -> Manifest {
        ManifestLoader::new().load_str("test", source, &Vars::new()).unwrap()
    }

    const TWO_GROUPS: &str = r#"
rule_groups:
  web:
    name: web
    type: STATEFUL
    capacity: 100
    rules: "pass tcp any any -> any 443 (sid:1;)"
  dns:
    name: dns
    type: STATEFUL
    capacity: 50
    rules: "pass udp any any -> any 53 (sid:2;)"
"#;

    #[tokio::test]
    async fn test_apply_then_plan_is_empty() {
        let api = Arc::new(MemoryRuleGroupApi::new());
        let engine = engine(api.clone());
        let manifest = manifest(TWO_GROUPS);
        let mut state = StateFile::new();

        let report = engine.apply(&manifest, &mut state).await.unwrap();
        assert_eq!(report.applied, vec!["web", "dns"]);
        assert_eq!(report.plan.summary(), PlanSummary { add: 2, change: 0, destroy: 0 });
        assert_eq!(api.len(), 2);

        let again = engine.plan(&manifest, &state).unwrap();
        assert!(!again.has_changes());
    }

    #[tokio::test]
    async fn test_check_mode_changes_nothing() {
        let api = Arc::new(MemoryRuleGroupApi::new());
        let engine = engine(api.clone()).check_mode(true);
        let mut state = StateFile::new();

        let report = engine.apply(&manifest(TWO_GROUPS), &mut state).await.unwrap();
        assert!(report.check_mode);
        assert!(report.applied.is_empty());
        assert!(report.plan.has_changes());
        assert!(api.is_empty());
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_undeclared_label_is_deleted() {
        let api = Arc::new(MemoryRuleGroupApi::new());
        let engine = engine(api.clone());
        let mut state = StateFile::new();
        engine.apply(&manifest(TWO_GROUPS), &mut state).await.unwrap();

        let only_web = manifest(
            "rule_groups:\n  web:\n    name: web\n    type: STATEFUL\n    capacity: 100\n    rules: \"pass tcp any any -> any 443 (sid:1;)\"\n",
        );
        let plan = engine.plan(&only_web, &state).unwrap();
        assert_eq!(plan.summary(), PlanSummary { add: 0, change: 0, destroy: 1 });

        engine.apply(&only_web, &mut state).await.unwrap();
        assert_eq!(state.labels(), vec!["web"]);
        assert_eq!(api.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_drops_disappeared() {
        let api = Arc::new(MemoryRuleGroupApi::new());
        let engine = engine(api.clone());
        let manifest = manifest(TWO_GROUPS);
        let mut state = StateFile::new();
        engine.apply(&manifest, &mut state).await.unwrap();

        let arn = state.get("dns").unwrap().arn.clone();
        api.delete_rule_group(&arn).await.unwrap();

        let report = engine.refresh(&mut state).await.unwrap();
        assert_eq!(report.removed, vec!["dns"]);
        assert!(engine.plan(&manifest, &state).unwrap().has_changes());
    }

    #[tokio::test]
    async fn test_import_rejects_managed_label() {
        let api = Arc::new(MemoryRuleGroupApi::new());
        let engine = engine(api.clone());
        let mut state = StateFile::new();
        engine.apply(&manifest(TWO_GROUPS), &mut state).await.unwrap();

        let arn = state.get("web").unwrap().arn.clone();
        let err = engine.import("web", &arn, &mut state).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyInState(_)));

        let imported = engine.import("web2", &arn, &mut state).await.unwrap();
        assert_eq!(imported.name, "web");
        assert!(state.contains("web2"));
    }

    #[tokio::test]
    async fn test_destroy_removes_everything() {
        let api = Arc::new(MemoryRuleGroupApi::new());
        let engine = engine(api.clone());
        let mut state = StateFile::new();
        engine.apply(&manifest(TWO_GROUPS), &mut state).await.unwrap();

        let destroyed = engine.destroy(&mut state).await.unwrap();
        assert_eq!(destroyed, vec!["dns", "web"]);
        assert!(state.is_empty());
        assert!(api.is_empty());
    }

    #[tokio::test]
    async fn test_renamed_label_reuses_name() {
        let api = Arc::new(MemoryRuleGroupApi::new());
        let engine = engine(api.clone());
        let mut state = StateFile::new();
        engine.apply(&manifest(TWO_GROUPS), &mut state).await.unwrap();

        let renamed = manifest(&TWO_GROUPS.replacen("  web:", "  web2:", 1));
        let report = engine.apply(&renamed, &mut state).await.unwrap();

        assert_eq!(report.applied, vec!["web", "web2"]);
        assert!(!state.contains("web"));
        assert_eq!(state.get("web2").unwrap().name, "web");
        assert_eq!(api.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_replacement_forgets_deleted_group() {
        let api = Arc::new(MemoryRuleGroupApi::new());
        let engine = engine(api.clone());
        let mut state = StateFile::new();
        engine.apply(&manifest(TWO_GROUPS), &mut state).await.unwrap();

        // The new name is already taken by a group nobody manages.
        let outside = RuleGroupSpec::new("web-v2", crate::model::RuleGroupType::Stateful, 10)
            .with_rules("pass ip any any -> any any (sid:9;)");
        engine.manager().create("outside", &outside).await.unwrap();

        let renamed = manifest(&TWO_GROUPS.replacen("name: web", "name: web-v2", 1));
        let err = engine.apply(&renamed, &mut state).await.unwrap_err();
        assert!(err.to_string().contains("already exists"), "{err}");

        assert!(!state.contains("web"));
        assert!(state.contains("dns"));
        let plan = engine.plan(&renamed, &state).unwrap();
        assert_eq!(plan.summary(), PlanSummary { add: 1, change: 0, destroy: 0 });
    }
}
