//! Single-host Docker Engine deployment backend.
//!
//! One container per group (`stream-api-group-<sanitised>`), one container
//! for the central state API, and — outside `local` mode — one container
//! for the front-end itself. Host ports are published only in `local`
//! mode; otherwise the Docker user-defined network's DNS resolves
//! container names directly.

use async_trait::async_trait;
use bollard::container::{Config as ContainerConfig, CreateContainerOptions, StartContainerOptions};
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use std::collections::HashMap;
use url::Url;

use crate::domain::GroupName;
use crate::env::RuntimeEnvironment;
use crate::error::{CoreError, CoreResult};

use super::naming::{routing_api_instance_name, stream_api_instance_name, STATE_API_INSTANCE_NAME};
use super::DeploymentPlatform;

const STREAM_API_PORT: u16 = 8000;
const STATE_API_PORT: u16 = 8000;
/// Fixed local-mode host port for the singleton state API container. Unlike
/// stream-api groups, there's no group name to hash against, and this must
/// stay outside the default `fastapi_group_port_base` hash window so it
/// never collides with a group's published port.
const STATE_API_LOCAL_HOST_PORT: u16 = 8500;

pub struct DockerDeploymentPlatform {
    docker: Docker,
    network: String,
    environment: RuntimeEnvironment,
    base_port: u16,
    stream_api_image: String,
    routing_api_image: String,
    state_api_image: String,
    cpu_limit_millis: i64,
    /// Environment variables every stream-api container receives, with the
    /// group name substituted in by the caller per group via
    /// `GROUP_NAME`/`KAFKA_TOPIC` overrides.
    stream_api_base_env: HashMap<String, String>,
    routing_api_env: HashMap<String, String>,
    state_api_env: HashMap<String, String>,
}

impl DockerDeploymentPlatform {
    pub async fn connect(
        network: impl Into<String>,
        environment: RuntimeEnvironment,
        base_port: u16,
        stream_api_image: impl Into<String>,
        routing_api_image: impl Into<String>,
        state_api_image: impl Into<String>,
        cpu_limit_millis: i64,
        stream_api_base_env: HashMap<String, String>,
        routing_api_env: HashMap<String, String>,
        state_api_env: HashMap<String, String>,
    ) -> CoreResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self {
            docker,
            network: network.into(),
            environment,
            base_port,
            stream_api_image: stream_api_image.into(),
            routing_api_image: routing_api_image.into(),
            state_api_image: state_api_image.into(),
            cpu_limit_millis,
            stream_api_base_env,
            routing_api_env,
            state_api_env,
        })
    }

    fn host_config(&self, publish_port: Option<(u16, u16)>) -> HostConfig {
        let port_bindings = publish_port.map(|(container_port, host_port)| {
            let mut map = HashMap::new();
            map.insert(
                format!("{container_port}/tcp"),
                Some(vec![PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some(host_port.to_string()),
                }]),
            );
            map
        });

        HostConfig {
            network_mode: Some(self.network.clone()),
            port_bindings,
            cpu_period: Some(100_000),
            cpu_quota: Some(self.cpu_limit_millis * 100),
            ..Default::default()
        }
    }

    async fn container_exists(&self, name: &str) -> CoreResult<bool> {
        match self.docker.inspect_container(name, None).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn ensure_container(
        &self,
        name: &str,
        image: &str,
        env: &HashMap<String, String>,
        publish_port: Option<(u16, u16)>,
    ) -> CoreResult<()> {
        if self.container_exists(name).await? {
            tracing::debug!(container = name, "container already deployed, skipping");
            return Ok(());
        }

        let env_list: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let config = ContainerConfig {
            image: Some(image.to_string()),
            env: Some(env_list),
            host_config: Some(self.host_config(publish_port)),
            ..Default::default()
        };

        self.docker
            .create_container(Some(CreateContainerOptions { name, platform: None }), config)
            .await?;
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> CoreResult<()> {
        if !self.container_exists(name).await? {
            return Ok(());
        }
        let options = bollard::container::RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker.remove_container(name, Some(options)).await?;
        Ok(())
    }

    fn host_port_for(&self, group: &GroupName) -> u16 {
        crate::hash::host_port_for_group(self.base_port, group.as_str())
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
impl DeploymentPlatform for DockerDeploymentPlatform {
    async fn initialize(&self) -> CoreResult<()> {
        self.docker.ping().await?;
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

        let publish = self
            .environment
            .is_local()
            .then(|| (STREAM_API_PORT, self.host_port_for(group)));

        self.ensure_container(&name, &self.stream_api_image, &env, publish)
            .await
    }

    async fn remove_service(&self, group: &GroupName) -> CoreResult<()> {
        self.remove_container(&stream_api_instance_name(group)).await
    }

    async fn deploy_routing_api(&self) -> CoreResult<()> {
        if self.environment.is_local() {
            return Ok(());
        }
        let name = routing_api_instance_name(false);
        self.ensure_container(name, &self.routing_api_image, &self.routing_api_env, None)
            .await
    }

    async fn remove_routing_api(&self) -> CoreResult<()> {
        if self.environment.is_local() {
            return Ok(());
        }
        self.remove_container(routing_api_instance_name(false)).await
    }

    async fn deploy_state_api(&self) -> CoreResult<()> {
        let publish = self
            .environment
            .is_local()
            .then_some((STATE_API_PORT, STATE_API_LOCAL_HOST_PORT));

        self.ensure_container(
            STATE_API_INSTANCE_NAME,
            &self.state_api_image,
            &self.state_api_env,
            publish,
        )
        .await
    }

    async fn remove_state_api(&self) -> CoreResult<()> {
        self.remove_container(STATE_API_INSTANCE_NAME).await
    }

    fn service_url(&self, group: &GroupName) -> CoreResult<Url> {
        let raw = if self.environment.is_local() {
            format!("http://localhost:{}/", self.host_port_for(group))
        } else {
            format!("http://{}:{STREAM_API_PORT}/", stream_api_instance_name(group))
        };
        Url::parse(&raw).map_err(|e| CoreError::Internal { message: e.to_string() })
    }

    fn state_api_url(&self) -> CoreResult<Url> {
        let raw = if self.environment.is_local() {
            format!("http://localhost:{STATE_API_LOCAL_HOST_PORT}/")
        } else {
            format!("http://{STATE_API_INSTANCE_NAME}:{STATE_API_PORT}/")
        };
        Url::parse(&raw).map_err(|e| CoreError::Internal { message: e.to_string() })
    }
}
