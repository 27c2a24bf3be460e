//! Docker Swarm deployment backend: one replicated `Service` per group
//! instead of a bare container. No host port is published — cluster DNS
//! resolves the service name directly, on the fixed container port.

use async_trait::async_trait;
use bollard::models::{
    ServiceSpec, ServiceSpecMode, ServiceSpecModeReplicated, TaskSpec, TaskSpecContainerSpec,
};
use bollard::service::CreateServiceOptions;
use bollard::Docker;
use std::collections::HashMap;
use url::Url;

use crate::domain::GroupName;
use crate::error::{CoreError, CoreResult};

use super::naming::{routing_api_instance_name, stream_api_instance_name, STATE_API_INSTANCE_NAME};
use super::DeploymentPlatform;

const STREAM_API_PORT: u16 = 8000;
const STATE_API_PORT: u16 = 8000;

pub struct SwarmDeploymentPlatform {
    docker: Docker,
    network: String,
    stream_api_image: String,
    routing_api_image: String,
    state_api_image: String,
    replicas: u64,
    stream_api_base_env: HashMap<String, String>,
    routing_api_env: HashMap<String, String>,
    state_api_env: HashMap<String, String>,
}

impl SwarmDeploymentPlatform {
    pub async fn connect(
        node_host: impl AsRef<str>,
        network: impl Into<String>,
        stream_api_image: impl Into<String>,
        routing_api_image: impl Into<String>,
        state_api_image: impl Into<String>,
        replicas: u64,
        stream_api_base_env: HashMap<String, String>,
        routing_api_env: HashMap<String, String>,
        state_api_env: HashMap<String, String>,
    ) -> CoreResult<Self> {
        let docker = Docker::connect_with_http(node_host.as_ref(), 120, bollard::API_DEFAULT_VERSION)?;
        Ok(Self {
            docker,
            network: network.into(),
            stream_api_image: stream_api_image.into(),
            routing_api_image: routing_api_image.into(),
            state_api_image: state_api_image.into(),
            replicas,
            stream_api_base_env,
            routing_api_env,
            state_api_env,
        })
    }

    async fn service_exists(&self, name: &str) -> CoreResult<bool> {
        match self.docker.inspect_service(name, None).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn ensure_service(
        &self,
        name: &str,
        image: &str,
        env: &HashMap<String, String>,
    ) -> CoreResult<()> {
        if self.service_exists(name).await? {
            tracing::debug!(service = name, "swarm service already deployed, skipping");
            return Ok(());
        }

        let env_list: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let spec = ServiceSpec {
            name: Some(name.to_string()),
            task_template: Some(TaskSpec {
                container_spec: Some(TaskSpecContainerSpec {
                    image: Some(image.to_string()),
                    env: Some(env_list),
                    ..Default::default()
                }),
                networks: Some(vec![bollard::models::NetworkAttachmentConfig {
                    target: Some(self.network.clone()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            mode: Some(ServiceSpecMode {
                replicated: Some(ServiceSpecModeReplicated {
                    replicas: Some(self.replicas as i64),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        self.docker
            .create_service(spec, None::<CreateServiceOptions>)
            .await?;
        Ok(())
    }

    async fn remove_service_named(&self, name: &str) -> CoreResult<()> {
        if !self.service_exists(name).await? {
            return Ok(());
        }
        self.docker.delete_service(name).await?;
        Ok(())
    }

    fn group_env(
        &self,
        group: &GroupName,
        kafka_topic: &str,
        kafka_consumer_group_id: &str,
    ) -> HashMap<String, String> {
        let mut env = self.stream_api_base_env.clone();
        env.insert("GROUP_NAME".to_string(), group.as_str().to_string());
        env.insert("KAFKA_TOPIC".to_string(), kafka_topic.to_string());
        env.insert(
            "KAFKA_CONSUMER_GROUP_ID".to_string(),
            kafka_consumer_group_id.to_string(),
        );
        env
    }
}

#[async_trait]
impl DeploymentPlatform for SwarmDeploymentPlatform {
    async fn initialize(&self) -> CoreResult<()> {
        let info = self.docker.info().await?;
        let is_manager = info
            .swarm
            .as_ref()
            .and_then(|s| s.control_available)
            .unwrap_or(false);
        if !is_manager {
            return Err(CoreError::BackendUnreachable {
                message: "Docker node is not an active Swarm manager".to_string(),
            });
        }
        Ok(())
    }

    async fn deploy_service(
        &self,
        group: &GroupName,
        kafka_topic: &str,
        kafka_consumer_group_id: &str,
    ) -> CoreResult<()> {
        let name = stream_api_instance_name(group);
        let env = self.group_env(group, kafka_topic, kafka_consumer_group_id);
        self.ensure_service(&name, &self.stream_api_image, &env).await
    }

    async fn remove_service(&self, group: &GroupName) -> CoreResult<()> {
        self.remove_service_named(&stream_api_instance_name(group)).await
    }

    async fn deploy_routing_api(&self) -> CoreResult<()> {
        let name = routing_api_instance_name(true);
        self.ensure_service(name, &self.routing_api_image, &self.routing_api_env)
            .await
    }

    async fn remove_routing_api(&self) -> CoreResult<()> {
        self.remove_service_named(routing_api_instance_name(true)).await
    }

    async fn deploy_state_api(&self) -> CoreResult<()> {
        self.ensure_service(STATE_API_INSTANCE_NAME, &self.state_api_image, &self.state_api_env)
            .await
    }

    async fn remove_state_api(&self) -> CoreResult<()> {
        self.remove_service_named(STATE_API_INSTANCE_NAME).await
    }

    fn service_url(&self, group: &GroupName) -> CoreResult<Url> {
        let raw = format!("http://{}:{STREAM_API_PORT}/", stream_api_instance_name(group));
        Url::parse(&raw).map_err(|e| CoreError::Internal { message: e.to_string() })
    }

    fn state_api_url(&self) -> CoreResult<Url> {
        let raw = format!("http://{STATE_API_INSTANCE_NAME}:{STATE_API_PORT}/");
        Url::parse(&raw).map_err(|e| CoreError::Internal { message: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform() -> SwarmDeploymentPlatform {
        SwarmDeploymentPlatform {
            docker: Docker::connect_with_http("http://127.0.0.1:2375", 120, bollard::API_DEFAULT_VERSION)
                .unwrap(),
            network: "openfactory-network".to_string(),
            stream_api_image: "openfactoryio/stream-api-non-replicated:latest".to_string(),
            routing_api_image: "openfactoryio/routing-layer:latest".to_string(),
            state_api_image: "openfactoryio/state-api:latest".to_string(),
            replicas: 1,
            stream_api_base_env: HashMap::from([("KAFKA_BROKER".to_string(), "kafka:9092".to_string())]),
            routing_api_env: HashMap::new(),
            state_api_env: HashMap::new(),
        }
    }

    #[test]
    fn group_env_varies_kafka_topic_and_consumer_group_by_group() {
        let platform = platform();
        let a = GroupName::parse("workcenter-1").unwrap();
        let b = GroupName::parse("workcenter-2").unwrap();

        let env_a = platform.group_env(&a, "workcenter-1_stream", "workcenter-1_stream-consumer-group");
        let env_b = platform.group_env(&b, "workcenter-2_stream", "workcenter-2_stream-consumer-group");

        assert_eq!(env_a.get("KAFKA_TOPIC").unwrap(), "workcenter-1_stream");
        assert_ne!(env_a.get("KAFKA_TOPIC"), env_b.get("KAFKA_TOPIC"));
        assert_ne!(env_a.get("KAFKA_CONSUMER_GROUP_ID"), env_b.get("KAFKA_CONSUMER_GROUP_ID"));
        assert_eq!(env_a.get("KAFKA_BROKER").unwrap(), "kafka:9092");
    }

    #[test]
    fn service_url_and_state_api_url_use_fixed_dns_names() {
        let platform = platform();
        let group = GroupName::parse("workcenter-1").unwrap();
        assert_eq!(
            platform.service_url(&group).unwrap().as_str(),
            "http://stream-api-group-workcenter-1:8000/"
        );
        assert_eq!(
            platform.state_api_url().unwrap().as_str(),
            "http://openfactory-state-api:8000/"
        );
    }
}
