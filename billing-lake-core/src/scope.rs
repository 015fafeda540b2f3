//! Resolution of a configured billing scope to the subscriptions it covers.
//!
//! A scope is a single string in one of three shapes:
//!
//! ```text
//! /providers/Microsoft.Billing/billingAccounts/<id>           -> every subscription billed to the account
//! /providers/Microsoft.Management/managementGroups/<id>       -> every subscription under the group
//! /subscriptions/<id>                                         -> that subscription only
//! ```
//!
//! Resolution never fails outright: an invalid scope or a failed remote call
//! yields an empty set together with a [`ResolutionWarning`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::contract::SubscriptionDirectory;
use crate::fanout::with_deadline;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("billing scope is empty")]
    Empty,
    #[error("unrecognised billing scope '{0}'")]
    InvalidShape(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeDescriptor {
    Subscription(String),
    BillingAccount(String),
    ManagementGroup(String),
}

fn billing_account_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)providers/Microsoft\.Billing/billingAccounts/([^/]+)")
            .expect("billing account pattern compiles")
    })
}

fn management_group_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)providers/Microsoft\.Management/managementGroups/([^/]+)")
            .expect("management group pattern compiles")
    })
}

fn subscription_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^/?subscriptions/([^/]+)$").expect("subscription pattern compiles")
    })
}

impl ScopeDescriptor {
    pub fn parse(scope: &str) -> Result<Self, ScopeError> {
        let scope = scope.trim();
        if scope.is_empty() {
            return Err(ScopeError::Empty);
        }
        let capture = |pattern: &Regex| {
            pattern
                .captures(scope)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        };
        if let Some(id) = capture(billing_account_pattern()) {
            return Ok(ScopeDescriptor::BillingAccount(id));
        }
        if let Some(id) = capture(management_group_pattern()) {
            return Ok(ScopeDescriptor::ManagementGroup(id));
        }
        if let Some(id) = capture(subscription_pattern()) {
            return Ok(ScopeDescriptor::Subscription(id));
        }
        Err(ScopeError::InvalidShape(scope.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ScopeDescriptor::Subscription(_) => "subscription",
            ScopeDescriptor::BillingAccount(_) => "billing_account",
            ScopeDescriptor::ManagementGroup(_) => "management_group",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ScopeDescriptor::Subscription(id)
            | ScopeDescriptor::BillingAccount(id)
            | ScopeDescriptor::ManagementGroup(id) => id,
        }
    }
}

impl FromStr for ScopeDescriptor {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScopeDescriptor::parse(s)
    }
}

impl fmt::Display for ScopeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeDescriptor::Subscription(id) => write!(f, "/subscriptions/{id}"),
            ScopeDescriptor::BillingAccount(id) => {
                write!(f, "/providers/Microsoft.Billing/billingAccounts/{id}")
            }
            ScopeDescriptor::ManagementGroup(id) => {
                write!(f, "/providers/Microsoft.Management/managementGroups/{id}")
            }
        }
    }
}

/// Why a resolution came back empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionWarning {
    InvalidScope(ScopeError),
    RemoteFailure(String),
    NoSubscriptions,
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionWarning::InvalidScope(e) => write!(f, "configuration error: {e}"),
            ResolutionWarning::RemoteFailure(msg) => write!(f, "remote failure: {msg}"),
            ResolutionWarning::NoSubscriptions => write!(f, "scope contains no subscriptions"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeResolution {
    pub descriptor: Option<ScopeDescriptor>,
    pub subscription_ids: BTreeSet<String>,
    pub warning: Option<ResolutionWarning>,
}

impl ScopeResolution {
    fn degraded(descriptor: Option<ScopeDescriptor>, warning: ResolutionWarning) -> Self {
        Self {
            descriptor,
            subscription_ids: BTreeSet::new(),
            warning: Some(warning),
        }
    }
}

pub struct ScopeResolver<'a, D: SubscriptionDirectory + ?Sized> {
    directory: &'a D,
    call_timeout: Duration,
}

impl<'a, D: SubscriptionDirectory + ?Sized> ScopeResolver<'a, D> {
    pub fn new(directory: &'a D, call_timeout: Duration) -> Self {
        Self {
            directory,
            call_timeout,
        }
    }

    pub async fn resolve(&self, scope: &str) -> ScopeResolution {
        let descriptor = match ScopeDescriptor::parse(scope) {
            Ok(d) => d,
            Err(e) => {
                error!(scope, error = %e, "Invalid billing scope");
                return ScopeResolution::degraded(None, ResolutionWarning::InvalidScope(e));
            }
        };

        let listed = match &descriptor {
            ScopeDescriptor::Subscription(id) => Ok(BTreeSet::from([id.clone()])),
            ScopeDescriptor::BillingAccount(id) => with_deadline(
                self.call_timeout,
                self.directory.list_billing_subscriptions(id),
            )
            .await
            .map(|records| {
                let total = records.len();
                let ids: BTreeSet<String> = records
                    .into_iter()
                    .filter_map(|r| r.subscription_id)
                    .filter(|id| !id.is_empty())
                    .collect();
                if ids.len() < total {
                    warn!(
                        skipped = total - ids.len(),
                        "Skipped billing subscription records without a subscription id"
                    );
                }
                ids
            }),
            ScopeDescriptor::ManagementGroup(id) => with_deadline(
                self.call_timeout,
                self.directory.query_management_group_subscriptions(id),
            )
            .await
            .map(|rows| {
                rows.into_iter()
                    .filter_map(|r| r.subscription_id)
                    .filter(|id| !id.is_empty())
                    .collect()
            }),
        };

        match listed {
            Ok(subscription_ids) => {
                info!(
                    scope_kind = descriptor.kind(),
                    scope_id = descriptor.id(),
                    subscriptions = subscription_ids.len(),
                    "Resolved billing scope"
                );
                let warning = subscription_ids
                    .is_empty()
                    .then_some(ResolutionWarning::NoSubscriptions);
                ScopeResolution {
                    descriptor: Some(descriptor),
                    subscription_ids,
                    warning,
                }
            }
            Err(e) => {
                error!(
                    scope_kind = descriptor.kind(),
                    scope_id = descriptor.id(),
                    error = %e,
                    "Failed to resolve billing scope"
                );
                ScopeResolution::degraded(
                    Some(descriptor),
                    ResolutionWarning::RemoteFailure(e.to_string()),
                )
            }
        }
    }
}
