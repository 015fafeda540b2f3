//! # contract: collaborator interfaces of the export pipelines
//!
//! Everything that touches the outside world sits behind a trait in this
//! module: the source object store the vendor exports land in, the data lake,
//! the management API endpoints for subscriptions, advisor recommendations and
//! carbon emissions, and the column projection applied to cost exports.
//!
//! ## Error contract
//! - All async methods return [`RemoteError`], a boxed error. Implementors
//!   convert transport, status and decoding failures into it.
//! - Callers never retry. A failed call degrades the operation it belongs to.
//!
//! ## Mocking & Testing
//! - Async traits are annotated for `mockall`; mocks are exported with the
//!   default `test-export-mocks` feature so the CLI crate can use them too.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::backfill::YearMonth;

/// Error type for every remote collaborator call.
pub type RemoteError = Box<dyn std::error::Error + Send + Sync>;

/// Object store the vendor writes its exports into.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn fetch(&self, container: &str, name: &str) -> Result<Vec<u8>, RemoteError>;

    async fn delete(&self, container: &str, name: &str) -> Result<(), RemoteError>;
}

/// Destination data lake. Keys are `/`-separated.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LakeWriter: Send + Sync {
    async fn put(&self, path: &str, body: Vec<u8>) -> Result<(), RemoteError>;
}

/// One record of a billing-account subscription listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingSubscription {
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// One row of a management-group subscription query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRow {
    #[serde(default)]
    pub subscription_id: Option<String>,
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SubscriptionDirectory: Send + Sync {
    /// Subscriptions billed to a billing account. Records may lack an id.
    async fn list_billing_subscriptions(
        &self,
        billing_account_id: &str,
    ) -> Result<Vec<BillingSubscription>, RemoteError>;

    /// Subscriptions under a management group, from a resource graph query.
    async fn query_management_group_subscriptions(
        &self,
        management_group_id: &str,
    ) -> Result<Vec<SubscriptionRow>, RemoteError>;
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AdvisorApi: Send + Sync {
    /// Cost-category recommendations of one subscription, as returned by the API.
    async fn list_cost_recommendations(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<Value>, RemoteError>;
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CarbonApi: Send + Sync {
    /// Monthly summary report for exactly one month across `subscription_ids`.
    async fn monthly_summary(
        &self,
        subscription_ids: &[String],
        month: YearMonth,
    ) -> Result<Value, RemoteError>;
}

/// Output of an [`ObjectTransform`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformedObject {
    pub body: Vec<u8>,
    /// The dataset's billing-account field, when it carries one.
    pub billing_field: Option<String>,
}

/// Column projection applied to an export before it is written to the lake.
pub trait ObjectTransform: Send + Sync {
    fn transform(&self, name: &str, body: Vec<u8>) -> Result<TransformedObject, RemoteError>;
}

/// Leaves the object untouched and reports no billing field.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl ObjectTransform for Passthrough {
    fn transform(&self, _name: &str, body: Vec<u8>) -> Result<TransformedObject, RemoteError> {
        Ok(TransformedObject {
            body,
            billing_field: None,
        })
    }
}

/// Passthrough that reports a fixed billing field, for exports whose billing
/// identity is known out of band.
#[derive(Debug, Clone, Default)]
pub struct FixedBillingField(pub String);

impl ObjectTransform for FixedBillingField {
    fn transform(&self, _name: &str, body: Vec<u8>) -> Result<TransformedObject, RemoteError> {
        Ok(TransformedObject {
            body,
            billing_field: Some(self.0.clone()),
        })
    }
}
