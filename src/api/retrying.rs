//! Retry wrapper for any [`RuleGroupApi`] backend.

use async_trait::async_trait;

use super::{
    CreateRuleGroupRequest, CreateRuleGroupResponse, DeleteRuleGroupResponse,
    DescribeRuleGroupResponse, ListRuleGroupsResponse, RuleGroupApi, Tag, UpdateRuleGroupRequest,
    UpdateRuleGroupResponse,
};
use crate::error::{Error, Result};
use crate::retry::{RetryError, RetryPolicy};

/// Retries throttling and internal errors from the wrapped backend.
#[derive(Debug)]
pub struct RetryingApi<A> {
    inner: A,
    policy: RetryPolicy,
}

impl<A: RuleGroupApi> RetryingApi<A> {
    pub fn new(inner: A, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

fn unwrap_retry(err: RetryError<Error>) -> Error {
    let message = err.to_string();
    err.into_last_error()
        .unwrap_or_else(|| Error::Internal(message))
}

#[async_trait]
impl<A: RuleGroupApi> RuleGroupApi for RetryingApi<A> {
    async fn create_rule_group(
        &self,
        request: CreateRuleGroupRequest,
    ) -> Result<CreateRuleGroupResponse> {
        self.policy
            .retry_if(
                || self.inner.create_rule_group(request.clone()),
                Error::is_transient,
            )
            .await
            .map_err(unwrap_retry)
    }

    async fn describe_rule_group(&self, arn: &str) -> Result<DescribeRuleGroupResponse> {
        self.policy
            .retry_if(|| self.inner.describe_rule_group(arn), Error::is_transient)
            .await
            .map_err(unwrap_retry)
    }

    async fn update_rule_group(
        &self,
        request: UpdateRuleGroupRequest,
    ) -> Result<UpdateRuleGroupResponse> {
        self.policy
            .retry_if(
                || self.inner.update_rule_group(request.clone()),
                Error::is_transient,
            )
            .await
            .map_err(unwrap_retry)
    }

    async fn delete_rule_group(&self, arn: &str) -> Result<DeleteRuleGroupResponse> {
        self.policy
            .retry_if(|| self.inner.delete_rule_group(arn), Error::is_transient)
            .await
            .map_err(unwrap_retry)
    }

    async fn list_rule_groups(
        &self,
        next_token: Option<String>,
        max_results: u32,
    ) -> Result<ListRuleGroupsResponse> {
        self.policy
            .retry_if(
                || self.inner.list_rule_groups(next_token.clone(), max_results),
                Error::is_transient,
            )
            .await
            .map_err(unwrap_retry)
    }

    async fn tag_resource(&self, arn: &str, tags: Vec<Tag>) -> Result<()> {
        self.policy
            .retry_if(
                || self.inner.tag_resource(arn, tags.clone()),
                Error::is_transient,
            )
            .await
            .map_err(unwrap_retry)
    }

    async fn untag_resource(&self, arn: &str, tag_keys: Vec<String>) -> Result<()> {
        self.policy
            .retry_if(
                || self.inner.untag_resource(arn, tag_keys.clone()),
                Error::is_transient,
            )
            .await
            .map_err(unwrap_retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockRuleGroupApi;
    use crate::error::{INVALID_REQUEST, THROTTLING};
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy::constant(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_throttling_is_retried() {
        let mut mock = MockRuleGroupApi::new();
        let mut calls = 0;
        mock.expect_list_rule_groups().times(3).returning(move |_, _| {
            calls += 1;
            if calls < 3 {
                Err(Error::api("ListRuleGroups", THROTTLING, "slow down"))
            } else {
                Ok(ListRuleGroupsResponse::default())
            }
        });

        let api = RetryingApi::new(mock, policy());
        assert!(api.list_rule_groups(None, 100).await.is_ok());
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut mock = MockRuleGroupApi::new();
        mock.expect_delete_rule_group()
            .times(1)
            .returning(|_| Err(Error::api("DeleteRuleGroup", INVALID_REQUEST, "in use")));

        let api = RetryingApi::new(mock, policy());
        let err = api.delete_rule_group("arn").await.unwrap_err();
        assert_eq!(err.code(), Some(INVALID_REQUEST));
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_error() {
        let mut mock = MockRuleGroupApi::new();
        mock.expect_describe_rule_group()
            .times(4)
            .returning(|_| Err(Error::api("DescribeRuleGroup", THROTTLING, "slow down")));

        let api = RetryingApi::new(mock, policy());
        let err = api.describe_rule_group("arn").await.unwrap_err();
        assert_eq!(err.code(), Some(THROTTLING));
    }
}
