//! HTTP backend for the firewall service.
//!
//! Speaks the service's JSON 1.0 protocol: every call is a `POST /` with an
//! `X-Amz-Target: NetworkFirewall_20201112.<Operation>` header. Request
//! signing is left to the endpoint (an emulator or a signing proxy).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use super::wire::{
    DeleteRuleGroupRequest, DescribeRuleGroupRequest, ErrorBody, ListRuleGroupsRequest,
    TagResourceRequest, UntagResourceRequest,
};
use super::{
    service_error, CreateRuleGroupRequest, CreateRuleGroupResponse, DeleteRuleGroupResponse,
    DescribeRuleGroupResponse, ListRuleGroupsResponse, RuleGroupApi, Tag, UpdateRuleGroupRequest,
    UpdateRuleGroupResponse,
};
use crate::error::{Error, Result};

const TARGET_PREFIX: &str = "NetworkFirewall_20201112";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const ERROR_TYPE_HEADER: &str = "x-amzn-ErrorType";

/// Rule group API over HTTP.
pub struct HttpRuleGroupApi {
    client: Client,
    endpoint: Url,
}

impl HttpRuleGroupApi {
    /// Creates a client for `endpoint` with the given request timeout.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("Invalid endpoint '{endpoint}': {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Endpoint '{endpoint}' must use http or https"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, endpoint })
    }

    /// Default public endpoint for a region.
    pub fn regional_endpoint(region: &str) -> String {
        format!("https://network-firewall.{region}.amazonaws.com")
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn call<T: Serialize, R: DeserializeOwned>(
        &self,
        operation: &str,
        payload: &T,
        arn: Option<&str>,
    ) -> Result<R> {
        let body = serde_json::to_vec(payload)?;
        debug!(operation, endpoint = %self.endpoint, "Calling firewall API");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let error_type = response
            .headers()
            .get(ERROR_TYPE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await?;
        trace!(operation, %status, body = %text, "Firewall API response");

        if !status.is_success() {
            return Err(Self::parse_error(
                operation,
                status,
                error_type.as_deref(),
                &text,
                arn,
            ));
        }

        // Operations without output return an empty body.
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        Ok(serde_json::from_str(text)?)
    }

    fn parse_error(
        operation: &str,
        status: StatusCode,
        error_type: Option<&str>,
        body: &str,
        arn: Option<&str>,
    ) -> Error {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed.message.clone().unwrap_or_else(|| body.to_string());
        match parsed.code(error_type) {
            Some(code) => service_error(operation, code, &message, arn),
            None => Error::api(operation, format!("HTTP {}", status.as_u16()), message),
        }
    }
}

impl std::fmt::Debug for HttpRuleGroupApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRuleGroupApi")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

#[derive(serde::Deserialize)]
struct Empty {}

#[async_trait]
impl RuleGroupApi for HttpRuleGroupApi {
    async fn create_rule_group(
        &self,
        request: CreateRuleGroupRequest,
    ) -> Result<CreateRuleGroupResponse> {
        self.call("CreateRuleGroup", &request, None).await
    }

    async fn describe_rule_group(&self, arn: &str) -> Result<DescribeRuleGroupResponse> {
        let request = DescribeRuleGroupRequest {
            rule_group_arn: arn.to_string(),
        };
        self.call("DescribeRuleGroup", &request, Some(arn)).await
    }

    async fn update_rule_group(
        &self,
        request: UpdateRuleGroupRequest,
    ) -> Result<UpdateRuleGroupResponse> {
        let arn = request.rule_group_arn.clone();
        self.call("UpdateRuleGroup", &request, Some(&arn)).await
    }

    async fn delete_rule_group(&self, arn: &str) -> Result<DeleteRuleGroupResponse> {
        let request = DeleteRuleGroupRequest {
            rule_group_arn: arn.to_string(),
        };
        self.call("DeleteRuleGroup", &request, Some(arn)).await
    }

    async fn list_rule_groups(
        &self,
        next_token: Option<String>,
        max_results: u32,
    ) -> Result<ListRuleGroupsResponse> {
        let request = ListRuleGroupsRequest {
            next_token,
            max_results: Some(max_results),
        };
        self.call("ListRuleGroups", &request, None).await
    }

    async fn tag_resource(&self, arn: &str, tags: Vec<Tag>) -> Result<()> {
        let request = TagResourceRequest {
            resource_arn: arn.to_string(),
            tags,
        };
        let _: Empty = self.call("TagResource", &request, Some(arn)).await?;
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, tag_keys: Vec<String>) -> Result<()> {
        let request = UntagResourceRequest {
            resource_arn: arn.to_string(),
            tag_keys,
        };
        let _: Empty = self.call("UntagResource", &request, Some(arn)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_endpoint() {
        assert!(HttpRuleGroupApi::new("ftp://example.com", Duration::from_secs(1)).is_err());
        assert!(HttpRuleGroupApi::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpRuleGroupApi::new("http://localhost:4566", Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_parse_error_codes() {
        let err = HttpRuleGroupApi::parse_error(
            "DescribeRuleGroup",
            StatusCode::BAD_REQUEST,
            None,
            r#"{"__type":"ResourceNotFoundException","message":"nope"}"#,
            Some("arn:aws:network-firewall:us-east-1:1:stateful-rulegroup/x"),
        );
        assert!(err.is_not_found());

        let err = HttpRuleGroupApi::parse_error(
            "ListRuleGroups",
            StatusCode::BAD_GATEWAY,
            None,
            "upstream unavailable",
            None,
        );
        assert_eq!(err.code(), Some("HTTP 502"));

        let err = HttpRuleGroupApi::parse_error(
            "UpdateRuleGroup",
            StatusCode::BAD_REQUEST,
            Some("InvalidTokenException:http://internal.example/"),
            r#"{"message":"stale"}"#,
            Some("arn:aws:network-firewall:us-east-1:1:stateful-rulegroup/x"),
        );
        assert!(matches!(err, Error::InvalidToken { .. }), "{err}");
    }

    #[test]
    fn test_regional_endpoint() {
        assert_eq!(
            HttpRuleGroupApi::regional_endpoint("eu-west-1"),
            "https://network-firewall.eu-west-1.amazonaws.com"
        );
    }
}
