//! HTTP client for a remote distribution ledger.

use crate::error::DistributionError;
use crate::sink::{DistributionReceipt, DistributionSink};
use arban_types::{CitizenId, TrustLevel};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;

/// Default timeout for distribution requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for a distribution ledger's HTTP API.
///
/// - `POST {endpoint}/citizens/{id}/register`
/// - `POST {endpoint}/citizens/{id}/distribute` with `{"level": "GROUP_VERIFIED"}`,
///   answered by `{"distributed": bool, "amount": u64}`
#[derive(Clone)]
pub struct HttpDistributionClient {
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct DistributeRequest<'a> {
    level: &'a str,
}

/// Raw JSON response from the distribute endpoint.
#[derive(Debug, Deserialize)]
struct DistributeResponse {
    distributed: bool,
    #[serde(default)]
    amount: u64,
}

impl HttpDistributionClient {
    /// Create a client with default timeout settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom timeout.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    fn citizen_url(&self, citizen: &CitizenId, action: &str) -> String {
        format!("{}/citizens/{}/{}", self.endpoint, citizen, action)
    }

    pub async fn register_citizen(&self, citizen: &CitizenId) -> Result<(), DistributionError> {
        let url = self.citizen_url(citizen, "register");
        let response = self
            .http_client
            .post(&url)
            .send()
            .await
            .map_err(map_send_error)?;
        ensure_success(&response)?;
        Ok(())
    }

    pub async fn distribute_for_level(
        &self,
        citizen: &CitizenId,
        level: TrustLevel,
    ) -> Result<DistributionReceipt, DistributionError> {
        let url = self.citizen_url(citizen, "distribute");
        let response = self
            .http_client
            .post(&url)
            .json(&DistributeRequest {
                level: level.as_str(),
            })
            .send()
            .await
            .map_err(map_send_error)?;
        ensure_success(&response)?;

        let body: DistributeResponse = response.json().await.map_err(|e| {
            DistributionError::InvalidResponse(format!("failed to parse distribute response: {e}"))
        })?;

        Ok(DistributionReceipt {
            distributed: body.distributed,
            amount: u128::from(body.amount),
        })
    }
}

fn map_send_error(e: reqwest::Error) -> DistributionError {
    if e.is_timeout() {
        DistributionError::Unreachable(format!("request timed out: {e}"))
    } else if e.is_connect() {
        DistributionError::Unreachable(format!("connection failed: {e}"))
    } else {
        DistributionError::RequestFailed(e.to_string())
    }
}

fn ensure_success(response: &reqwest::Response) -> Result<(), DistributionError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(DistributionError::RequestFailed(format!(
            "HTTP status {}",
            response.status()
        )))
    }
}

/// Adapts [`HttpDistributionClient`] to the synchronous [`DistributionSink`]
/// by spawning each call onto a tokio runtime.
///
/// The calling transaction never waits on the network: every call returns
/// immediately with [`DistributionReceipt::nothing`] and the spawned task logs
/// its own outcome. Spawned calls are tracked so a short-lived process can
/// [`flush`](Self::flush) them before its runtime shuts down.
pub struct DispatchingDistribution {
    client: HttpDistributionClient,
    runtime: tokio::runtime::Handle,
    in_flight: Mutex<JoinSet<()>>,
}

impl DispatchingDistribution {
    pub fn new(client: HttpDistributionClient, runtime: tokio::runtime::Handle) -> Self {
        Self {
            client,
            runtime,
            in_flight: Mutex::new(JoinSet::new()),
        }
    }

    /// Bind to the runtime of the calling context.
    pub fn from_current(client: HttpDistributionClient) -> Result<Self, DistributionError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DistributionError::Other(format!("no tokio runtime: {e}")))?;
        Ok(Self::new(client, runtime))
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch<F>(&self, call: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks();
        while tasks.try_join_next().is_some() {}
        tasks.spawn_on(call, &self.runtime);
    }

    /// Calls spawned and not yet finished.
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Wait up to `timeout` for every dispatched call to finish.
    ///
    /// Calls still running at the deadline are aborted and logged. Returns the
    /// number abandoned that way.
    pub async fn flush(&self, timeout: Duration) -> usize {
        let mut tasks = std::mem::take(&mut *self.tasks());
        if tasks.is_empty() {
            return 0;
        }
        tracing::debug!(pending = tasks.len(), "flushing distribution calls");
        if tokio::time::timeout(timeout, join_all(&mut tasks)).await.is_ok() {
            return 0;
        }
        let abandoned = tasks.len();
        tasks.abort_all();
        tracing::warn!(
            abandoned,
            timeout_ms = timeout.as_millis() as u64,
            "distribution calls still running at shutdown were dropped"
        );
        abandoned
    }
}

async fn join_all(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::warn!(error = %e, "distribution task did not complete");
        }
    }
}

impl DistributionSink for DispatchingDistribution {
    fn register_citizen(&self, citizen: &CitizenId) -> Result<(), DistributionError> {
        let client = self.client.clone();
        let citizen = citizen.clone();
        self.dispatch(async move {
            if let Err(e) = client.register_citizen(&citizen).await {
                tracing::warn!(%citizen, error = %e, "remote registration failed");
            }
        });
        Ok(())
    }

    fn distribute_for_level(
        &self,
        citizen: &CitizenId,
        level: TrustLevel,
    ) -> Result<DistributionReceipt, DistributionError> {
        let client = self.client.clone();
        let citizen = citizen.clone();
        self.dispatch(async move {
            match client.distribute_for_level(&citizen, level).await {
                Ok(receipt) => tracing::info!(
                    %citizen,
                    %level,
                    distributed = receipt.distributed,
                    amount = %receipt.amount,
                    "remote distribution completed"
                ),
                Err(e) => tracing::warn!(%citizen, %level, error = %e, "remote distribution failed"),
            }
        });
        Ok(DistributionReceipt::nothing())
    }
}
