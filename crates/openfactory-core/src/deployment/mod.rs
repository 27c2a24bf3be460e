//! C2 — Deployment Backend.

mod docker;
mod naming;
mod swarm;

pub use docker::DockerDeploymentPlatform;
pub use naming::{
    routing_api_instance_name, stream_api_instance_name, STATE_API_INSTANCE_NAME,
};
pub use swarm::SwarmDeploymentPlatform;

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::domain::GroupName;
use crate::error::CoreResult;
use crate::grouping::Readiness;

const READINESS_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Polymorphic interface for deploying and tearing down serving instances.
/// Two variants implement this: a single-host container engine and a
/// cluster scheduler. All operations are idempotent.
#[async_trait]
pub trait DeploymentPlatform: Send + Sync {
    /// Validates connectivity to the backend; fails fatally on
    /// misconfiguration (e.g. local engine unreachable, not a cluster
    /// manager node).
    async fn initialize(&self) -> CoreResult<()>;

    async fn deploy_service(
        &self,
        group: &GroupName,
        kafka_topic: &str,
        kafka_consumer_group_id: &str,
    ) -> CoreResult<()>;
    async fn remove_service(&self, group: &GroupName) -> CoreResult<()>;

    /// No-op in `local` mode, where the front-end runs on the host.
    async fn deploy_routing_api(&self) -> CoreResult<()>;
    async fn remove_routing_api(&self) -> CoreResult<()>;

    async fn deploy_state_api(&self) -> CoreResult<()>;
    async fn remove_state_api(&self) -> CoreResult<()>;

    fn service_url(&self, group: &GroupName) -> CoreResult<Url>;
    fn state_api_url(&self) -> CoreResult<Url>;

    /// Default readiness probe: GET `{url}/ready` with a 2s timeout. 200
    /// with `{"status":"ready"}` is ready; 404 means no readiness endpoint
    /// is exposed; any transport error means unreachable.
    async fn service_ready(&self, group: &GroupName) -> Readiness {
        let url = match self.service_url(group) {
            Ok(url) => url,
            Err(err) => return (false, Some(err.to_string())),
        };
        probe_ready(&format!("{}/ready", url.as_str().trim_end_matches('/'))).await
    }
}

/// Shared default-ready probe, also used directly for the state API.
pub async fn probe_ready(ready_url: &str) -> Readiness {
    let client = match reqwest::Client::builder()
        .timeout(READINESS_PROBE_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(err) => return (false, Some(err.to_string())),
    };

    match client.get(ready_url).send().await {
        Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => {
            (false, Some("no readiness endpoint".to_string()))
        }
        Ok(resp) if resp.status().is_success() => (true, None),
        Ok(resp) => (false, Some(format!("status {}", resp.status()))),
        Err(err) => (false, Some(format!("unreachable: {err}"))),
    }
}
