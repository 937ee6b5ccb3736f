//! Rule group lifecycle against a [`RuleGroupApi`].
//!
//! [`RuleGroupManager`] performs the remote side of every change: create,
//! read, in-place update, delete with wait, and import. All reads go through
//! [`ResourceState::from_describe`] so the result can be compared with a
//! declaration directly.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{mapping, RuleGroupApi};
use crate::error::{Error, Result};
use crate::model::{RuleGroupArn, RuleGroupSpec};
use crate::retry::{RetryError, RetryPolicy};
use crate::state::{plan, Plan, PlanAction, ResourceState};
use crate::validate::ensure_valid;

/// Default time to wait for a deleted rule group to disappear.
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(600);
/// Default interval between describe calls while waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Timing knobs for the manager.
#[derive(Debug, Clone, Copy)]
pub struct ManagerOptions {
    pub delete_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            delete_timeout: DEFAULT_DELETE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Result of applying one declaration.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub plan: Plan,
    pub state: ResourceState,
}

/// Creates, reads, updates and deletes rule groups.
#[derive(Debug)]
pub struct RuleGroupManager<A> {
    api: A,
    options: ManagerOptions,
}

impl<A: RuleGroupApi> RuleGroupManager<A> {
    pub fn new(api: A) -> Self {
        Self::with_options(api, ManagerOptions::default())
    }

    pub fn with_options(api: A, options: ManagerOptions) -> Self {
        Self { api, options }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Creates the rule group declared by `spec` and reads it back.
    pub async fn create(&self, label: &str, spec: &RuleGroupSpec) -> Result<ResourceState> {
        ensure_valid(label, spec)?;

        let response = self
            .api
            .create_rule_group(mapping::expand_create_request(spec))
            .await?;
        let arn = response.rule_group_response.rule_group_arn;
        info!(arn = %arn, name = %spec.name, operation = "create", "Created rule group");

        let state = self.read(&arn, spec.rules.clone()).await?;
        state.ok_or(Error::NotFound(arn))
    }

    /// Reads the current state of `arn`.
    ///
    /// Returns `None` when the rule group no longer exists. `rules` is stored
    /// as given since the service never returns it.
    pub async fn read(&self, arn: &str, rules: Option<String>) -> Result<Option<ResourceState>> {
        match self.api.describe_rule_group(arn).await {
            Ok(response) => {
                debug!(arn = %arn, operation = "read", "Read rule group");
                ResourceState::from_describe(&response, rules).map(Some)
            }
            Err(e) if e.is_not_found() => {
                warn!(arn = %arn, operation = "read", "Rule group not found, removing from state");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Re-reads `prior`, keeping its rules text.
    pub async fn refresh(&self, prior: &ResourceState) -> Result<Option<ResourceState>> {
        self.read(&prior.arn, prior.rules.clone()).await
    }

    /// Brings an existing rule group in line with `spec` without replacing it.
    ///
    /// The body is sent only when something besides tags changed. Tags are
    /// reconciled separately. A stale update token is refreshed once.
    pub async fn update(
        &self,
        label: &str,
        prior: &ResourceState,
        spec: &RuleGroupSpec,
    ) -> Result<ResourceState> {
        ensure_valid(label, spec)?;
        let arn = prior.arn.as_str();
        let plan = plan(Some(prior), spec)?;

        if let PlanAction::Replace { reasons } = &plan.action {
            return Err(Error::Internal(format!(
                "{arn} cannot be updated in place, {} changed",
                reasons.join(", ")
            )));
        }

        if plan.body_changed() {
            self.update_body(arn, spec).await?;
        }

        if plan.tags_changed() {
            self.update_tags(arn, prior, spec).await?;
        }

        self.read(arn, spec.rules.clone())
            .await?
            .ok_or_else(|| Error::NotFound(arn.to_string()))
    }

    async fn update_body(&self, arn: &str, spec: &RuleGroupSpec) -> Result<()> {
        let mut refreshed = false;
        loop {
            let token = self.api.describe_rule_group(arn).await?.update_token;
            let request = mapping::expand_update_request(spec, arn, &token);
            match self.api.update_rule_group(request).await {
                Ok(_) => {
                    info!(arn = %arn, name = %spec.name, operation = "update", "Updated rule group");
                    return Ok(());
                }
                Err(Error::InvalidToken { .. }) if !refreshed => {
                    warn!(arn = %arn, operation = "update", "Update token went stale, retrying");
                    refreshed = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn update_tags(
        &self,
        arn: &str,
        prior: &ResourceState,
        spec: &RuleGroupSpec,
    ) -> Result<()> {
        let removed: Vec<String> = prior
            .tags
            .keys()
            .filter(|k| !spec.tags.contains_key(*k))
            .cloned()
            .collect();
        let upserted: BTreeMap<String, String> = spec
            .tags
            .iter()
            .filter(|(k, v)| prior.tags.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if !removed.is_empty() {
            debug!(arn = %arn, keys = ?removed, "Removing tags");
            self.api.untag_resource(arn, removed).await?;
        }
        if !upserted.is_empty() {
            debug!(arn = %arn, keys = ?upserted.keys().collect::<Vec<_>>(), "Setting tags");
            self.api
                .tag_resource(arn, mapping::expand_tags(&upserted))
                .await?;
        }
        Ok(())
    }

    /// Deletes `arn` and waits until it is gone.
    ///
    /// Deleting a rule group that no longer exists succeeds.
    pub async fn delete(&self, arn: &str) -> Result<()> {
        match self.api.delete_rule_group(arn).await {
            Ok(_) => info!(arn = %arn, operation = "delete", "Deleting rule group"),
            Err(e) if e.is_not_found() => {
                debug!(arn = %arn, operation = "delete", "Rule group already gone");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let timeout = self.options.delete_timeout;
        RetryPolicy::polling(self.options.poll_interval, timeout)
            .poll_until(|| self.is_gone(arn), |gone| *gone)
            .await
            .map_err(|e| match e {
                RetryError::ConditionNotMet { .. } => Error::Timeout {
                    operation: "delete".to_string(),
                    arn: arn.to_string(),
                    timeout_secs: timeout.as_secs(),
                },
                other => {
                    let message = other.to_string();
                    other
                        .into_last_error()
                        .unwrap_or_else(|| Error::Internal(message))
                }
            })?;

        debug!(arn = %arn, operation = "delete", "Rule group deleted");
        Ok(())
    }

    async fn is_gone(&self, arn: &str) -> Result<bool> {
        match self.api.describe_rule_group(arn).await {
            Ok(_) => Ok(false),
            Err(e) if e.is_not_found() => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Reads an existing rule group that isn't managed yet.
    pub async fn import(&self, arn: &str) -> Result<ResourceState> {
        arn.parse::<RuleGroupArn>()?;
        let state = self
            .read(arn, None)
            .await?
            .ok_or_else(|| Error::NotFound(arn.to_string()))?;
        info!(arn = %arn, name = %state.name, operation = "import", "Imported rule group");
        Ok(state)
    }

    /// Plans and performs whatever `spec` needs given `prior`.
    pub async fn apply(
        &self,
        label: &str,
        prior: Option<&ResourceState>,
        spec: &RuleGroupSpec,
    ) -> Result<ApplyOutcome> {
        let plan = plan(prior, spec)?;

        let state = match (&plan.action, prior) {
            (PlanAction::NoOp, Some(prior)) => prior.clone(),
            (PlanAction::Update, Some(prior)) => self.update(label, prior, spec).await?,
            (PlanAction::Replace { reasons }, Some(prior)) => {
                info!(
                    arn = %prior.arn,
                    name = %spec.name,
                    reasons = ?reasons,
                    "Replacing rule group"
                );
                self.delete(&prior.arn).await?;
                self.create(label, spec).await?
            }
            _ => self.create(label, spec).await?,
        };

        Ok(ApplyOutcome { plan, state })
    }
}
