//! Bounded concurrent fan-out over independent remote units, each under a deadline.

use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, warn};

use crate::contract::RemoteError;

#[derive(Debug, Error)]
#[error("remote call exceeded its deadline of {0:?}")]
pub struct DeadlineExceeded(pub Duration);

/// Runs `call` under `deadline`. Expiry is reported as an ordinary remote error.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, RemoteError>
where
    F: Future<Output = Result<T, RemoteError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(Box::new(DeadlineExceeded(deadline))),
    }
}

/// Outcomes of a fan-out, sorted by unit key.
#[derive(Debug)]
pub struct FanOutReport<T> {
    pub succeeded: Vec<(String, T)>,
    /// Unit key and failure message.
    pub failed: Vec<(String, String)>,
}

impl<T> Default for FanOutReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> FanOutReport<T> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Calls `call` once per unit, at most `concurrency` at a time. A failing unit
/// never cancels its siblings.
pub async fn fan_out<T, F, Fut>(
    units: Vec<String>,
    concurrency: usize,
    deadline: Duration,
    call: F,
) -> FanOutReport<T>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let call = &call;
    let outcomes = stream::iter(units)
        .map(|unit| async move {
            let result = with_deadline(deadline, call(unit.clone())).await;
            (unit, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut report = FanOutReport::default();
    for (unit, result) in outcomes {
        match result {
            Ok(value) => {
                debug!(unit = %unit, "Unit succeeded");
                report.succeeded.push((unit, value));
            }
            Err(e) => {
                warn!(unit = %unit, error = %e, "Unit failed");
                report.failed.push((unit, e.to_string()));
            }
        }
    }
    report.succeeded.sort_by(|a, b| a.0.cmp(&b.0));
    report.failed.sort();
    report
}
