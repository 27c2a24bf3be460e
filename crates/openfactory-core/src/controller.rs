//! C3 — Routing Controller: composes a grouping strategy and a deployment
//! backend into the deploy/teardown/route/ready lifecycle.

use std::collections::HashMap;
use url::Url;

use crate::deployment::DeploymentPlatform;
use crate::domain::{AssetUuid, GroupName};
use crate::env::RuntimeEnvironment;
use crate::error::CoreResult;
use crate::grouping::GroupingStrategy;

pub struct RoutingController {
    registry: Box<dyn GroupingStrategy>,
    backend: Box<dyn DeploymentPlatform>,
    environment: RuntimeEnvironment,
}

impl RoutingController {
    pub fn new(
        registry: Box<dyn GroupingStrategy>,
        backend: Box<dyn DeploymentPlatform>,
        environment: RuntimeEnvironment,
    ) -> Self {
        Self { registry, backend, environment }
    }

    /// Idempotent: deploys the derived stream and serving instance for
    /// every known group, then the state API, then (outside `local`) the
    /// front-end itself. An empty group set is logged as a warning, not an
    /// error.
    pub async fn deploy(&self) -> CoreResult<()> {
        self.backend.initialize().await?;

        let groups = self.registry.all_groups().await?;
        if groups.is_empty() {
            tracing::warn!("no groups returned by the grouping strategy at deploy time");
        }

        for group in &groups {
            self.registry.create_derived_stream(group).await?;
            let topic = self.registry.derived_stream_topic(group);
            let consumer_group_id = self.registry.derived_stream_consumer_group(group);
            self.backend.deploy_service(group, &topic, &consumer_group_id).await?;
        }

        self.backend.deploy_state_api().await?;
        if !self.environment.is_local() {
            self.backend.deploy_routing_api().await?;
        }
        Ok(())
    }

    /// Symmetric reverse of `deploy`.
    pub async fn teardown(&self) -> CoreResult<()> {
        let groups = self.registry.all_groups().await?;
        for group in &groups {
            self.registry.remove_derived_stream(group).await?;
            self.backend.remove_service(group).await?;
        }

        self.backend.remove_state_api().await?;
        if !self.environment.is_local() {
            self.backend.remove_routing_api().await?;
        }
        Ok(())
    }

    /// Resolves an asset to its group instance's base URL, or `None` if the
    /// asset has no known group.
    pub async fn route(&self, asset: &AssetUuid) -> CoreResult<Option<Url>> {
        match self.registry.group_of(asset).await? {
            Some(group) => Ok(Some(self.backend.service_url(&group)?)),
            None => Ok(None),
        }
    }

    pub fn state_api_url(&self) -> CoreResult<Url> {
        self.backend.state_api_url()
    }

    /// Aggregated readiness: ready iff the registry, every deployed group
    /// instance, and the state API are all ready. Every failure
    /// contributes one entry to `issues`, keyed by component name or
    /// `service:<group>`.
    pub async fn ready(&self) -> (bool, HashMap<String, String>) {
        let mut issues = HashMap::new();

        let (registry_ready, registry_issue) = self.registry.ready().await;
        if !registry_ready {
            issues.insert(
                "registry".to_string(),
                registry_issue.unwrap_or_else(|| "not ready".to_string()),
            );
        }

        match self.registry.all_groups().await {
            Ok(groups) => {
                for group in &groups {
                    let (ready, issue) = self.backend.service_ready(group).await;
                    if !ready {
                        issues.insert(
                            format!("service:{group}"),
                            issue.unwrap_or_else(|| "not ready".to_string()),
                        );
                    }
                }
            }
            Err(err) => {
                issues.insert("registry".to_string(), err.to_string());
            }
        }

        let state_api_ready = match self.backend.state_api_url() {
            Ok(url) => crate::deployment::probe_ready(&format!("{}ready", url)).await,
            Err(err) => (false, Some(err.to_string())),
        };
        if !state_api_ready.0 {
            issues.insert(
                "state_api".to_string(),
                state_api_ready.1.unwrap_or_else(|| "not ready".to_string()),
            );
        }

        (issues.is_empty(), issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubRegistry {
        groups: HashSet<GroupName>,
        deploy_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl GroupingStrategy for StubRegistry {
        async fn group_of(&self, asset: &AssetUuid) -> CoreResult<Option<GroupName>> {
            if asset.as_str() == "known" {
                Ok(GroupName::parse("wc1"))
            } else {
                Ok(None)
            }
        }
        async fn all_groups(&self) -> CoreResult<HashSet<GroupName>> {
            Ok(self.groups.clone())
        }
        async fn assets_in(&self, _group: &GroupName) -> CoreResult<HashSet<AssetUuid>> {
            Ok(HashSet::new())
        }
        async fn create_derived_stream(&self, _group: &GroupName) -> CoreResult<()> {
            self.deploy_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn remove_derived_stream(&self, _group: &GroupName) -> CoreResult<()> {
            Ok(())
        }
        fn derived_stream_topic(&self, group: &GroupName) -> String {
            format!("{}_stream", group.sanitized())
        }
        fn derived_stream_consumer_group(&self, group: &GroupName) -> String {
            format!("{}_stream-consumer-group", group.sanitized())
        }
        async fn ready(&self) -> crate::grouping::Readiness {
            (true, None)
        }
    }

    struct StubBackend;

    #[async_trait]
    impl DeploymentPlatform for StubBackend {
        async fn initialize(&self) -> CoreResult<()> {
            Ok(())
        }
        async fn deploy_service(
            &self,
            _group: &GroupName,
            _kafka_topic: &str,
            _kafka_consumer_group_id: &str,
        ) -> CoreResult<()> {
            Ok(())
        }
        async fn remove_service(&self, _group: &GroupName) -> CoreResult<()> {
            Ok(())
        }
        async fn deploy_routing_api(&self) -> CoreResult<()> {
            Ok(())
        }
        async fn remove_routing_api(&self) -> CoreResult<()> {
            Ok(())
        }
        async fn deploy_state_api(&self) -> CoreResult<()> {
            Ok(())
        }
        async fn remove_state_api(&self) -> CoreResult<()> {
            Ok(())
        }
        fn service_url(&self, group: &GroupName) -> CoreResult<Url> {
            Url::parse(&format!("http://{}.local/", group.sanitized()))
                .map_err(|e| CoreError::Internal { message: e.to_string() })
        }
        fn state_api_url(&self) -> CoreResult<Url> {
            Url::parse("http://state-api.local/").map_err(|e| CoreError::Internal { message: e.to_string() })
        }
    }

    #[tokio::test]
    async fn route_resolves_known_asset_to_group_url() {
        let registry = StubRegistry {
            groups: HashSet::new(),
            deploy_calls: Arc::new(AtomicUsize::new(0)),
        };
        let controller = RoutingController::new(
            Box::new(registry),
            Box::new(StubBackend),
            RuntimeEnvironment::Local,
        );

        let url = controller
            .route(&AssetUuid::parse("known").unwrap())
            .await
            .unwrap();
        assert_eq!(url.unwrap().as_str(), "http://wc1.local/");
    }

    #[tokio::test]
    async fn route_returns_none_for_unknown_asset() {
        let registry = StubRegistry {
            groups: HashSet::new(),
            deploy_calls: Arc::new(AtomicUsize::new(0)),
        };
        let controller = RoutingController::new(
            Box::new(registry),
            Box::new(StubBackend),
            RuntimeEnvironment::Local,
        );

        let url = controller
            .route(&AssetUuid::parse("missing").unwrap())
            .await
            .unwrap();
        assert!(url.is_none());
    }

    #[test]
    fn route_works_under_a_bare_current_thread_executor() {
        let registry = StubRegistry {
            groups: HashSet::new(),
            deploy_calls: Arc::new(AtomicUsize::new(0)),
        };
        let controller = RoutingController::new(
            Box::new(registry),
            Box::new(StubBackend),
            RuntimeEnvironment::Local,
        );

        let url = tokio_test::block_on(controller.route(&AssetUuid::parse("known").unwrap())).unwrap();
        assert_eq!(url.unwrap().as_str(), "http://wc1.local/");
    }

    #[tokio::test]
    async fn deploy_is_idempotent_over_repeated_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut groups = HashSet::new();
        groups.insert(GroupName::parse("wc1").unwrap());
        let registry = StubRegistry { groups, deploy_calls: calls.clone() };
        let controller = RoutingController::new(
            Box::new(registry),
            Box::new(StubBackend),
            RuntimeEnvironment::Local,
        );

        controller.deploy().await.unwrap();
        controller.deploy().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct SpyBackend {
        seen_topics: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl DeploymentPlatform for SpyBackend {
        async fn initialize(&self) -> CoreResult<()> {
            Ok(())
        }
        async fn deploy_service(
            &self,
            _group: &GroupName,
            kafka_topic: &str,
            _kafka_consumer_group_id: &str,
        ) -> CoreResult<()> {
            self.seen_topics.lock().unwrap().push(kafka_topic.to_string());
            Ok(())
        }
        async fn remove_service(&self, _group: &GroupName) -> CoreResult<()> {
            Ok(())
        }
        async fn deploy_routing_api(&self) -> CoreResult<()> {
            Ok(())
        }
        async fn remove_routing_api(&self) -> CoreResult<()> {
            Ok(())
        }
        async fn deploy_state_api(&self) -> CoreResult<()> {
            Ok(())
        }
        async fn remove_state_api(&self) -> CoreResult<()> {
            Ok(())
        }
        fn service_url(&self, group: &GroupName) -> CoreResult<Url> {
            Url::parse(&format!("http://{}.local/", group.sanitized()))
                .map_err(|e| CoreError::Internal { message: e.to_string() })
        }
        fn state_api_url(&self) -> CoreResult<Url> {
            Url::parse("http://state-api.local/").map_err(|e| CoreError::Internal { message: e.to_string() })
        }
    }

    #[tokio::test]
    async fn deploy_passes_a_distinct_topic_per_group() {
        let mut groups = HashSet::new();
        groups.insert(GroupName::parse("wc1").unwrap());
        groups.insert(GroupName::parse("wc2").unwrap());
        let registry = StubRegistry { groups, deploy_calls: Arc::new(AtomicUsize::new(0)) };
        let seen_topics = Arc::new(std::sync::Mutex::new(Vec::new()));
        let controller = RoutingController::new(
            Box::new(registry),
            Box::new(SpyBackend { seen_topics: seen_topics.clone() }),
            RuntimeEnvironment::Local,
        );

        controller.deploy().await.unwrap();

        let topics = seen_topics.lock().unwrap();
        assert_eq!(topics.len(), 2);
        assert_ne!(topics[0], topics[1]);
    }
}
