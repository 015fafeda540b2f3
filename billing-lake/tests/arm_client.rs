//! Management API client against wiremock endpoints.

use std::time::Duration;

use billing_lake::arm::ArmClient;
use billing_lake_core::backfill::YearMonth;
use billing_lake_core::contract::{AdvisorApi, CarbonApi, SubscriptionDirectory};
use billing_lake_core::scope::ScopeResolver;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

fn client(server: &MockServer) -> ArmClient {
    ArmClient::new(&server.uri(), TOKEN, Duration::from_secs(5)).expect("client build")
}

#[tokio::test]
async fn billing_subscriptions_follow_next_link() {
    let server = MockServer::start().await;
    let base = "/providers/Microsoft.Billing/billingAccounts/ACCT/billingSubscriptions";

    Mock::given(method("GET"))
        .and(path(base))
        .and(query_param("api-version", "2024-04-01"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"properties": {"subscriptionId": "sub-a", "displayName": "A"}},
                {"properties": {"displayName": "no id"}},
            ],
            "nextLink": format!("{}/page2", server.uri()),
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"properties": {"subscriptionId": "sub-b"}},
                {"properties": {"subscriptionId": "sub-c"}},
            ]
        })))
        .mount(&server)
        .await;

    let arm = client(&server);
    let records = arm.list_billing_subscriptions("ACCT").await.unwrap();
    assert_eq!(records.len(), 4);

    let resolution = ScopeResolver::new(&arm, Duration::from_secs(5))
        .resolve("/providers/Microsoft.Billing/billingAccounts/ACCT")
        .await;
    assert_eq!(resolution.subscription_ids.len(), 3);
}

#[tokio::test]
async fn management_group_query_reads_data_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/providers/Microsoft.ResourceGraph/resources"))
        .and(query_param("api-version", "2021-03-01"))
        .and(body_partial_json(json!({"managementGroups": ["mg-root"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalRecords": 2,
            "data": [{"subscriptionId": "sub-1"}, {"subscriptionId": "sub-2"}]
        })))
        .mount(&server)
        .await;

    let rows = client(&server)
        .query_management_group_subscriptions("mg-root")
        .await
        .unwrap();
    let ids: Vec<_> = rows.into_iter().filter_map(|r| r.subscription_id).collect();
    assert_eq!(ids, vec!["sub-1", "sub-2"]);
}

#[tokio::test]
async fn advisor_requests_cost_category_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subscriptions/sub-1/providers/Microsoft.Advisor/recommendations"))
        .and(query_param("api-version", "2025-01-01"))
        .and(query_param("$filter", "Category eq 'Cost'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "rec-1", "properties": {"category": "Cost"}}]
        })))
        .mount(&server)
        .await;

    let recs = client(&server)
        .list_cost_recommendations("sub-1")
        .await
        .unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0]["id"], "rec-1");
}

#[tokio::test]
async fn carbon_report_requests_single_month() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/providers/Microsoft.Carbon/carbonEmissionReports"))
        .and(query_param("api-version", "2025-04-01"))
        .and(body_partial_json(json!({
            "reportType": "MonthlySummaryReport",
            "subscriptionList": ["sub-1"],
            "carbonScopeList": ["Scope1", "Scope3"],
            "dateRange": {"start": "2025-03-01", "end": "2025-03-01"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"dataType": "MonthlySummaryData", "latestMonthEmissions": 1.5}]
        })))
        .mount(&server)
        .await;

    let report = client(&server)
        .monthly_summary(&["sub-1".to_string()], YearMonth::new(2025, 3).unwrap())
        .await
        .unwrap();
    assert_eq!(report["value"][0]["latestMonthEmissions"], 1.5);
}

#[tokio::test]
async fn error_status_carries_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("AuthorizationFailed"))
        .mount(&server)
        .await;

    let err = client(&server)
        .list_cost_recommendations("sub-1")
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("403"), "{msg}");
    assert!(msg.contains("AuthorizationFailed"), "{msg}");
}
