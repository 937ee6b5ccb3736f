//! In-process emulation of the firewall service.
//!
//! Behaves like the real service for everything the resource manager relies
//! on: ARNs, update tokens, pagination, not-found and stale-token errors,
//! duplicate names, and rejecting bodies that don't fit the group type.
//! Used by the test-suite and by `--endpoint memory://`. With
//! `memory://<path>` the CLI keeps the emulated service in a JSON file so it
//! survives between invocations.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use super::wire::{self, RuleGroup, RuleGroupStatus};
use super::{
    service_error, CreateRuleGroupRequest, CreateRuleGroupResponse, DeleteRuleGroupResponse,
    DescribeRuleGroupResponse, ListRuleGroupsResponse, RuleGroupApi, RuleGroupResponse, Tag,
    UpdateRuleGroupRequest, UpdateRuleGroupResponse, MAX_LIST_RESULTS,
};
use crate::error::{Error, Result, INVALID_REQUEST, INVALID_TOKEN, RESOURCE_NOT_FOUND};
use crate::model::{RuleGroupArn, RuleGroupType};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRuleGroup {
    id: String,
    name: String,
    rule_group_type: RuleGroupType,
    capacity: u32,
    description: Option<String>,
    body: RuleGroup,
    tags: IndexMap<String, String>,
    update_token: String,
}

impl StoredRuleGroup {
    fn response(&self, arn: &str, status: RuleGroupStatus) -> RuleGroupResponse {
        RuleGroupResponse {
            rule_group_arn: arn.to_string(),
            rule_group_name: self.name.clone(),
            rule_group_id: self.id.clone(),
            description: self.description.clone(),
            rule_group_type: Some(self.rule_group_type),
            capacity: Some(self.capacity),
            rule_group_status: Some(status),
            tags: self
                .tags
                .iter()
                .map(|(k, v)| Tag::new(k, v))
                .collect(),
            consumed_capacity: None,
            number_of_associations: Some(0),
        }
    }
}

/// In-memory rule group service.
pub struct MemoryRuleGroupApi {
    partition: String,
    region: String,
    account_id: String,
    groups: RwLock<IndexMap<String, StoredRuleGroup>>,
    injected_failures: Mutex<VecDeque<String>>,
}

impl MemoryRuleGroupApi {
    /// Creates an empty service in `aws`/`us-east-1` for account `123456789012`.
    pub fn new() -> Self {
        Self::with_identity("aws", "us-east-1", "123456789012")
    }

    pub fn with_identity(
        partition: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            region: region.into(),
            account_id: account_id.into(),
            groups: RwLock::new(IndexMap::new()),
            injected_failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Loads rule groups saved by [`save`](Self::save). A missing file
    /// yields an empty service.
    pub fn load(
        path: &Path,
        partition: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Result<Self> {
        let api = Self::with_identity(partition, region, account_id);
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let groups: IndexMap<String, StoredRuleGroup> = serde_json::from_str(&content)?;
            debug!(path = %path.display(), rule_groups = groups.len(), "Loaded emulated service");
            *api.groups.write() = groups;
        }
        Ok(api)
    }

    /// Writes every stored rule group to `path` as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&*self.groups.read())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Makes the next `times` calls fail with the service error `code`.
    pub fn fail_next(&self, code: &str, times: usize) {
        let mut failures = self.injected_failures.lock();
        for _ in 0..times {
            failures.push_back(code.to_string());
        }
    }

    /// Number of rule groups currently stored.
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    /// Current update token of a rule group, if it exists.
    pub fn update_token(&self, arn: &str) -> Option<String> {
        self.groups.read().get(arn).map(|g| g.update_token.clone())
    }

    fn injected(&self, operation: &str) -> Result<()> {
        match self.injected_failures.lock().pop_front() {
            Some(code) => Err(service_error(operation, &code, "injected failure", None)),
            None => Ok(()),
        }
    }

    fn not_found(operation: &str, arn: &str) -> Error {
        service_error(operation, RESOURCE_NOT_FOUND, "rule group not found", Some(arn))
    }

    fn invalid(operation: &str, message: impl Into<String>) -> Error {
        Error::api(operation, INVALID_REQUEST, message)
    }

    fn arn_for(&self, rule_group_type: RuleGroupType, name: &str) -> String {
        RuleGroupArn::new(
            &self.partition,
            &self.region,
            &self.account_id,
            rule_group_type,
            name,
        )
        .to_string()
    }

    fn body_from(
        operation: &str,
        rule_group_type: RuleGroupType,
        rule_group: Option<RuleGroup>,
        rules: Option<String>,
    ) -> Result<RuleGroup> {
        let body = match (rule_group, rules) {
            (Some(_), Some(_)) => {
                return Err(Self::invalid(operation, "RuleGroup and Rules are mutually exclusive"))
            }
            (None, None) => {
                return Err(Self::invalid(operation, "one of RuleGroup or Rules is required"))
            }
            (Some(body), None) => body,
            (None, Some(rules)) => RuleGroup {
                rule_variables: None,
                rules_source: wire::RulesSource {
                    rules_string: Some(rules),
                    ..Default::default()
                },
            },
        };

        let source = &body.rules_source;
        let stateful = source.rules_string.is_some()
            || source.rules_source_list.is_some()
            || source.stateful_rules.is_some();
        let stateless = source.stateless_rules_and_custom_actions.is_some();
        match rule_group_type {
            RuleGroupType::Stateful if stateless || !stateful => Err(Self::invalid(
                operation,
                "STATEFUL rule groups require stateful rules",
            )),
            RuleGroupType::Stateless if !stateless || stateful => Err(Self::invalid(
                operation,
                "STATELESS rule groups require StatelessRulesAndCustomActions",
            )),
            _ => Ok(body),
        }
    }
}

impl Default for MemoryRuleGroupApi {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryRuleGroupApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRuleGroupApi")
            .field("region", &self.region)
            .field("rule_groups", &self.len())
            .finish()
    }
}

#[async_trait]
impl RuleGroupApi for MemoryRuleGroupApi {
    async fn create_rule_group(
        &self,
        request: CreateRuleGroupRequest,
    ) -> Result<CreateRuleGroupResponse> {
        const OP: &str = "CreateRuleGroup";
        self.injected(OP)?;

        if request.capacity == 0 {
            return Err(Self::invalid(OP, "Capacity must be at least 1"));
        }
        let body = Self::body_from(OP, request.rule_group_type, request.rule_group, request.rules)?;

        let arn = self.arn_for(request.rule_group_type, &request.rule_group_name);
        let mut groups = self.groups.write();
        if groups.contains_key(&arn) {
            return Err(Self::invalid(
                OP,
                format!("a rule group named '{}' already exists", request.rule_group_name),
            ));
        }

        let stored = StoredRuleGroup {
            id: Uuid::new_v4().to_string(),
            name: request.rule_group_name,
            rule_group_type: request.rule_group_type,
            capacity: request.capacity,
            description: request.description,
            body,
            tags: request.tags.into_iter().map(|t| (t.key, t.value)).collect(),
            update_token: Uuid::new_v4().to_string(),
        };
        let response = CreateRuleGroupResponse {
            update_token: stored.update_token.clone(),
            rule_group_response: stored.response(&arn, RuleGroupStatus::Active),
        };
        debug!(arn = %arn, "Created rule group");
        groups.insert(arn, stored);

        Ok(response)
    }

    async fn describe_rule_group(&self, arn: &str) -> Result<DescribeRuleGroupResponse> {
        const OP: &str = "DescribeRuleGroup";
        self.injected(OP)?;

        let groups = self.groups.read();
        let stored = groups.get(arn).ok_or_else(|| Self::not_found(OP, arn))?;
        Ok(DescribeRuleGroupResponse {
            update_token: stored.update_token.clone(),
            rule_group: Some(stored.body.clone()),
            rule_group_response: stored.response(arn, RuleGroupStatus::Active),
        })
    }

    async fn update_rule_group(
        &self,
        request: UpdateRuleGroupRequest,
    ) -> Result<UpdateRuleGroupResponse> {
        const OP: &str = "UpdateRuleGroup";
        self.injected(OP)?;

        let arn = request.rule_group_arn.clone();
        let mut groups = self.groups.write();
        let stored = groups.get_mut(&arn).ok_or_else(|| Self::not_found(OP, &arn))?;

        if stored.update_token != request.update_token {
            return Err(service_error(
                OP,
                INVALID_TOKEN,
                "update token is out of date",
                Some(&arn),
            ));
        }
        if let Some(t) = request.rule_group_type {
            if t != stored.rule_group_type {
                return Err(Self::invalid(OP, "the rule group type cannot be changed"));
            }
        }

        stored.body = Self::body_from(OP, stored.rule_group_type, request.rule_group, request.rules)?;
        if let Some(description) = request.description {
            stored.description = Some(description).filter(|d| !d.is_empty());
        }
        stored.update_token = Uuid::new_v4().to_string();
        debug!(arn = %arn, "Updated rule group");

        Ok(UpdateRuleGroupResponse {
            update_token: stored.update_token.clone(),
            rule_group_response: stored.response(&arn, RuleGroupStatus::Active),
        })
    }

    async fn delete_rule_group(&self, arn: &str) -> Result<DeleteRuleGroupResponse> {
        const OP: &str = "DeleteRuleGroup";
        self.injected(OP)?;

        let stored = self
            .groups
            .write()
            .shift_remove(arn)
            .ok_or_else(|| Self::not_found(OP, arn))?;
        debug!(arn = %arn, "Deleted rule group");

        Ok(DeleteRuleGroupResponse {
            rule_group_response: stored.response(arn, RuleGroupStatus::Deleting),
        })
    }

    async fn list_rule_groups(
        &self,
        next_token: Option<String>,
        max_results: u32,
    ) -> Result<ListRuleGroupsResponse> {
        const OP: &str = "ListRuleGroups";
        self.injected(OP)?;

        let start = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Self::invalid(OP, format!("invalid NextToken '{token}'")))?,
            None => 0,
        };
        let page = max_results.clamp(1, MAX_LIST_RESULTS) as usize;

        let groups = self.groups.read();
        let rule_groups: Vec<wire::RuleGroupMetadata> = groups
            .iter()
            .skip(start)
            .take(page)
            .map(|(arn, g)| wire::RuleGroupMetadata {
                name: g.name.clone(),
                arn: arn.clone(),
            })
            .collect();
        let end = start + rule_groups.len();

        Ok(ListRuleGroupsResponse {
            next_token: (end < groups.len()).then(|| end.to_string()),
            rule_groups,
        })
    }

    async fn tag_resource(&self, arn: &str, tags: Vec<Tag>) -> Result<()> {
        const OP: &str = "TagResource";
        self.injected(OP)?;

        let mut groups = self.groups.write();
        let stored = groups.get_mut(arn).ok_or_else(|| Self::not_found(OP, arn))?;
        for tag in tags {
            stored.tags.insert(tag.key, tag.value);
        }
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, tag_keys: Vec<String>) -> Result<()> {
        const OP: &str = "UntagResource";
        self.injected(OP)?;

        let mut groups = self.groups.write();
        let stored = groups.get_mut(arn).ok_or_else(|| Self::not_found(OP, arn))?;
        for key in tag_keys {
            stored.tags.shift_remove(&key);
        }
        Ok(())
    }
}
