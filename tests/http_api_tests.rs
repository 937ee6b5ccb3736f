//! HTTP backend tests against a mock firewall endpoint
//!
//! Covers request framing (target header, content type, payload shape),
//! response decoding, error code mapping, and retries of transient errors.

use std::time::Duration;

use netfw::api::{
    CreateRuleGroupRequest, HttpRuleGroupApi, RetryingApi, RuleGroupApi, Tag, MAX_LIST_RESULTS,
};
use netfw::model::RuleGroupType;
use netfw::resource::{ManagerOptions, RuleGroupManager};
use netfw::retry::RetryPolicy;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARN: &str = "arn:aws:network-firewall:us-east-1:123456789012:stateful-rulegroup/web";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

fn target(operation: &str) -> String {
    format!("NetworkFirewall_20201112.{operation}")
}

fn client(server: &MockServer) -> HttpRuleGroupApi {
    HttpRuleGroupApi::new(&server.uri(), Duration::from_secs(5)).unwrap()
}

fn rule_group_response() -> serde_json::Value {
    json!({
        "RuleGroupArn": ARN,
        "RuleGroupName": "web",
        "RuleGroupId": "b1b2",
        "Type": "STATEFUL",
        "Capacity": 100,
        "RuleGroupStatus": "ACTIVE",
        "Tags": [{ "Key": "Name", "Value": "web" }]
    })
}

fn describe_response() -> serde_json::Value {
    json!({
        "UpdateToken": "token-1",
        "RuleGroup": {
            "RulesSource": {
                "RulesString": "pass ip any any -> any any (sid:1;)"
            }
        },
        "RuleGroupResponse": rule_group_response()
    })
}

#[tokio::test]
async fn test_create_sends_target_and_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("CreateRuleGroup").as_str()))
        .and(header("Content-Type", CONTENT_TYPE))
        .and(body_partial_json(json!({
            "RuleGroupName": "web",
            "Type": "STATEFUL",
            "Capacity": 100,
            "Rules": "pass ip any any -> any any (sid:1;)",
            "Tags": [{ "Key": "Name", "Value": "web" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "UpdateToken": "token-1",
            "RuleGroupResponse": rule_group_response()
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .create_rule_group(CreateRuleGroupRequest {
            rule_group_name: "web".into(),
            rule_group: None,
            rules: Some("pass ip any any -> any any (sid:1;)".into()),
            rule_group_type: RuleGroupType::Stateful,
            capacity: 100,
            description: None,
            tags: vec![Tag::new("Name", "web")],
        })
        .await
        .unwrap();

    assert_eq!(response.update_token, "token-1");
    assert_eq!(response.rule_group_response.rule_group_arn, ARN);
}

#[tokio::test]
async fn test_describe_decodes_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("DescribeRuleGroup").as_str()))
        .and(body_partial_json(json!({ "RuleGroupArn": ARN })))
        .respond_with(ResponseTemplate::new(200).set_body_json(describe_response()))
        .mount(&server)
        .await;

    let response = client(&server).describe_rule_group(ARN).await.unwrap();
    assert_eq!(response.update_token, "token-1");
    assert_eq!(response.rule_group_response.capacity, Some(100));
    let body = response.rule_group.unwrap();
    assert_eq!(
        body.rules_source.rules_string.as_deref(),
        Some("pass ip any any -> any any (sid:1;)")
    );
}

#[tokio::test]
async fn test_not_found_maps_to_not_found_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "com.amazonaws.networkfirewall#ResourceNotFoundException",
            "message": "Rule group not found"
        })))
        .mount(&server)
        .await;

    let err = client(&server).describe_rule_group(ARN).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_error_type_header_is_used_without_body_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .insert_header(
                    "x-amzn-ErrorType",
                    "ResourceNotFoundException:http://internal.example/",
                )
                .set_body_json(json!({ "message": "Rule group not found" })),
        )
        .mount(&server)
        .await;

    let err = client(&server).describe_rule_group(ARN).await.unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[tokio::test]
async fn test_stale_token_maps_to_invalid_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("UpdateRuleGroup").as_str()))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "InvalidTokenException",
            "message": "Update token is stale"
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .update_rule_group(netfw::api::UpdateRuleGroupRequest {
            update_token: "old".into(),
            rule_group_arn: ARN.into(),
            rule_group: None,
            rules: Some("pass ip any any -> any any (sid:2;)".into()),
            rule_group_type: None,
            description: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, netfw::error::Error::InvalidToken { .. }), "{err}");
}

#[tokio::test]
async fn test_list_sends_page_size_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("ListRuleGroups").as_str()))
        .and(body_partial_json(json!({ "MaxResults": MAX_LIST_RESULTS, "NextToken": "page-2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "RuleGroups": [{ "Name": "web", "Arn": ARN }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server)
        .list_rule_groups(Some("page-2".into()), MAX_LIST_RESULTS)
        .await
        .unwrap();
    assert_eq!(page.rule_groups.len(), 1);
    assert!(page.next_token.is_none());
}

#[tokio::test]
async fn test_empty_body_is_accepted_for_tagging() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("UntagResource").as_str()))
        .and(body_partial_json(json!({ "ResourceArn": ARN, "TagKeys": ["Owner"] })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .untag_resource(ARN, vec!["Owner".into()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_throttling_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "ThrottlingException",
            "message": "Rate exceeded"
        })))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(describe_response()))
        .expect(1)
        .mount(&server)
        .await;

    let api = RetryingApi::new(
        client(&server),
        RetryPolicy::constant(3, Duration::from_millis(1)),
    );
    let response = api.describe_rule_group(ARN).await.unwrap();
    assert_eq!(response.update_token, "token-1");
}

#[tokio::test]
async fn test_validation_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "InvalidRequestException",
            "message": "Capacity must be positive"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = RetryingApi::new(
        client(&server),
        RetryPolicy::constant(3, Duration::from_millis(1)),
    );
    let err = api.describe_rule_group(ARN).await.unwrap_err();
    assert_eq!(err.code(), Some("InvalidRequestException"));
}

#[tokio::test]
async fn test_manager_reads_state_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("DescribeRuleGroup").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(describe_response()))
        .mount(&server)
        .await;

    let manager = RuleGroupManager::with_options(
        client(&server),
        ManagerOptions {
            delete_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
        },
    );
    let state = manager.import(ARN).await.unwrap();
    assert_eq!(state.name, "web");
    assert_eq!(state.capacity, 100);
    assert_eq!(state.tags.get("Name").map(String::as_str), Some("web"));
    assert!(state.rules.is_none());

    let attrs = state.attributes().unwrap();
    assert_eq!(
        attrs.get("rule_group.0.rules_source.0.rules_string"),
        Some("pass ip any any -> any any (sid:1;)")
    );
}
