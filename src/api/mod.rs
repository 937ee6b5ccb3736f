//! Firewall service API.
//!
//! [`RuleGroupApi`] is the seam between the resource manager and the remote
//! service. Three implementations are provided:
//!
//! - [`HttpRuleGroupApi`] speaks the service's JSON 1.0 protocol over HTTP
//! - [`MemoryRuleGroupApi`] emulates the service in-process
//! - [`RetryingApi`] wraps either one and retries transient failures

pub mod http;
pub mod mapping;
pub mod memory;
pub mod retrying;
pub mod wire;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Error, Result, INVALID_TOKEN, RESOURCE_NOT_FOUND};

pub use http::HttpRuleGroupApi;
pub use memory::MemoryRuleGroupApi;
pub use retrying::RetryingApi;
pub use wire::{
    CreateRuleGroupRequest, CreateRuleGroupResponse, DeleteRuleGroupResponse,
    DescribeRuleGroupResponse, ListRuleGroupsResponse, RuleGroupResponse, Tag,
    UpdateRuleGroupRequest, UpdateRuleGroupResponse,
};

/// Largest page the service returns from `ListRuleGroups`.
pub const MAX_LIST_RESULTS: u32 = 100;

/// Maps a service error code onto the crate's error type.
///
/// Not-found and stale-token codes get dedicated variants since callers
/// branch on them; everything else is kept as a generic API error.
pub fn service_error(operation: &str, code: &str, message: &str, arn: Option<&str>) -> Error {
    match code {
        RESOURCE_NOT_FOUND => Error::NotFound(arn.unwrap_or(message).to_string()),
        INVALID_TOKEN => Error::InvalidToken {
            arn: arn.unwrap_or_default().to_string(),
        },
        _ => Error::api(operation, code, message),
    }
}

/// Operations the firewall service exposes for rule groups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleGroupApi: Send + Sync {
    async fn create_rule_group(
        &self,
        request: CreateRuleGroupRequest,
    ) -> Result<CreateRuleGroupResponse>;

    /// Describes a rule group, including its current update token.
    async fn describe_rule_group(&self, arn: &str) -> Result<DescribeRuleGroupResponse>;

    /// Replaces a rule group's body. Fails with an invalid token error when
    /// `request.update_token` is not the latest one.
    async fn update_rule_group(
        &self,
        request: UpdateRuleGroupRequest,
    ) -> Result<UpdateRuleGroupResponse>;

    async fn delete_rule_group(&self, arn: &str) -> Result<DeleteRuleGroupResponse>;

    /// Lists one page of rule groups.
    async fn list_rule_groups(
        &self,
        next_token: Option<String>,
        max_results: u32,
    ) -> Result<ListRuleGroupsResponse>;

    async fn tag_resource(&self, arn: &str, tags: Vec<Tag>) -> Result<()>;

    async fn untag_resource(&self, arn: &str, tag_keys: Vec<String>) -> Result<()>;
}

#[async_trait]
impl<T: RuleGroupApi + ?Sized> RuleGroupApi for Arc<T> {
    async fn create_rule_group(
        &self,
        request: CreateRuleGroupRequest,
    ) -> Result<CreateRuleGroupResponse> {
        (**self).create_rule_group(request).await
    }

    async fn describe_rule_group(&self, arn: &str) -> Result<DescribeRuleGroupResponse> {
        (**self).describe_rule_group(arn).await
    }

    async fn update_rule_group(
        &self,
        request: UpdateRuleGroupRequest,
    ) -> Result<UpdateRuleGroupResponse> {
        (**self).update_rule_group(request).await
    }

    async fn delete_rule_group(&self, arn: &str) -> Result<DeleteRuleGroupResponse> {
        (**self).delete_rule_group(arn).await
    }

    async fn list_rule_groups(
        &self,
        next_token: Option<String>,
        max_results: u32,
    ) -> Result<ListRuleGroupsResponse> {
        (**self).list_rule_groups(next_token, max_results).await
    }

    async fn tag_resource(&self, arn: &str, tags: Vec<Tag>) -> Result<()> {
        (**self).tag_resource(arn, tags).await
    }

    async fn untag_resource(&self, arn: &str, tag_keys: Vec<String>) -> Result<()> {
        (**self).untag_resource(arn, tag_keys).await
    }
}
