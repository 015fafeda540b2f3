//! # Management API client
//!
//! [`ArmClient`] implements the remote collaborator traits of `billing-lake-core`
//! ([`SubscriptionDirectory`], [`AdvisorApi`], [`CarbonApi`]) against the cloud
//! management endpoint with a bearer token.
//!
//! - Construct with [`ArmClient::new_from_env`] (`ARM_ACCESS_TOKEN`, optional
//!   `ARM_ENDPOINT`) or [`ArmClient::new`] for tests against a local server.
//! - Every request is sent once. Non-2xx statuses become errors carrying the
//!   status and the response body.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use billing_lake_core::backfill::YearMonth;
use billing_lake_core::contract::{
    AdvisorApi, BillingSubscription, CarbonApi, RemoteError, SubscriptionDirectory,
    SubscriptionRow,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
pub const TOKEN_ENV: &str = "ARM_ACCESS_TOKEN";
pub const ENDPOINT_ENV: &str = "ARM_ENDPOINT";

const BILLING_API_VERSION: &str = "2024-04-01";
const RESOURCE_GRAPH_API_VERSION: &str = "2021-03-01";
const ADVISOR_API_VERSION: &str = "2025-01-01";
const CARBON_API_VERSION: &str = "2025-04-01";
const SUBSCRIPTIONS_QUERY: &str =
    "ResourceContainers | where type =~ 'microsoft.resources/subscriptions' | project subscriptionId";

pub struct ArmClient {
    http: Client,
    endpoint: String,
    token: String,
}

impl ArmClient {
    pub fn new(endpoint: &str, token: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn new_from_env(timeout: Duration) -> Result<Self, RemoteError> {
        dotenvy::dotenv().ok();
        let token = match env::var(TOKEN_ENV) {
            Ok(token) if !token.is_empty() => token,
            Ok(_) | Err(_) => {
                error!(env = TOKEN_ENV, "Access token missing in environment");
                return Err(format!("{TOKEN_ENV} must be set").into());
            }
        };
        let endpoint = env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        info!(endpoint = %endpoint, "Initialised management API client from environment");
        Self::new(&endpoint, &token, timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Management API request failed");
            return Err(format!("management API returned {status}: {body}").into());
        }
        Ok(response.json::<T>().await?)
    }
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(default, rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Deserialize)]
struct BillingSubscriptionResource {
    #[serde(default)]
    properties: BillingSubscription,
}

#[derive(Deserialize)]
struct ResourceGraphResponse {
    #[serde(default)]
    data: Vec<SubscriptionRow>,
}

#[async_trait]
impl SubscriptionDirectory for ArmClient {
    async fn list_billing_subscriptions(
        &self,
        billing_account_id: &str,
    ) -> Result<Vec<BillingSubscription>, RemoteError> {
        let mut url = self.url(&format!(
            "/providers/Microsoft.Billing/billingAccounts/{billing_account_id}/billingSubscriptions?api-version={BILLING_API_VERSION}"
        ));
        let mut records = Vec::new();
        loop {
            let page: Page<BillingSubscriptionResource> =
                self.send_json(self.http.get(&url)).await?;
            records.extend(page.value.into_iter().map(|r| r.properties));
            match page.next_link {
                Some(next) if !next.is_empty() => url = next,
                _ => break,
            }
        }
        debug!(billing_account_id, records = records.len(), "Listed billing subscriptions");
        Ok(records)
    }

    async fn query_management_group_subscriptions(
        &self,
        management_group_id: &str,
    ) -> Result<Vec<SubscriptionRow>, RemoteError> {
        let url = self.url(&format!(
            "/providers/Microsoft.ResourceGraph/resources?api-version={RESOURCE_GRAPH_API_VERSION}"
        ));
        let body = json!({
            "query": SUBSCRIPTIONS_QUERY,
            "managementGroups": [management_group_id],
        });
        let response: ResourceGraphResponse =
            self.send_json(self.http.post(&url).json(&body)).await?;
        debug!(
            management_group_id,
            rows = response.data.len(),
            "Queried management group subscriptions"
        );
        Ok(response.data)
    }
}

#[async_trait]
impl AdvisorApi for ArmClient {
    async fn list_cost_recommendations(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<Value>, RemoteError> {
        let url = self.url(&format!(
            "/subscriptions/{subscription_id}/providers/Microsoft.Advisor/recommendations"
        ));
        let request = self.http.get(&url).query(&[
            ("api-version", ADVISOR_API_VERSION),
            ("$filter", "Category eq 'Cost'"),
        ]);
        let page: Page<Value> = self.send_json(request).await?;
        Ok(page.value)
    }
}

#[async_trait]
impl CarbonApi for ArmClient {
    async fn monthly_summary(
        &self,
        subscription_ids: &[String],
        month: YearMonth,
    ) -> Result<Value, RemoteError> {
        let url = self.url(&format!(
            "/providers/Microsoft.Carbon/carbonEmissionReports?api-version={CARBON_API_VERSION}"
        ));
        let day = month.first_day().format("%Y-%m-%d").to_string();
        let body = json!({
            "reportType": "MonthlySummaryReport",
            "subscriptionList": subscription_ids,
            "carbonScopeList": ["Scope1", "Scope3"],
            "dateRange": { "start": day, "end": day },
        });
        debug!(month = %month, subscriptions = subscription_ids.len(), "Requesting carbon report");
        self.send_json(self.http.post(&url).json(&body)).await
    }
}
