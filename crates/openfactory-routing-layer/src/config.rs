//! Environment-only configuration, loaded with `figment`'s `Env` provider
//! — the sole configuration mechanism for this process.

use figment::providers::Env;
use figment::Figment;
use openfactory_core::env::{LogLevel, RuntimeEnvironment};
use serde::Deserialize;

fn default_environment() -> String {
    "local".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_grouping_strategy() -> String {
    "uns_level".to_string()
}
fn default_deployment_platform() -> String {
    "docker".to_string()
}
fn default_docker_network() -> String {
    "openfactory-network".to_string()
}
fn default_port_base() -> u16 {
    6000
}
fn default_cpu_limit_millis() -> i64 {
    500
}
fn default_replicas() -> u64 {
    1
}
fn default_app_version() -> String {
    "local-dev".to_string()
}
fn default_stream_api_image() -> String {
    "openfactoryio/stream-api-non-replicated:latest".to_string()
}
fn default_routing_api_image() -> String {
    "openfactoryio/routing-layer:latest".to_string()
}
fn default_state_api_image() -> String {
    "openfactoryio/state-api:latest".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    pub ksqldb_url: String,
    pub ksqldb_assets_stream: String,
    pub ksqldb_assets_table: String,
    pub ksqldb_uns_map: String,

    #[serde(default = "default_grouping_strategy")]
    pub grouping_strategy: String,
    #[serde(default = "default_grouping_strategy")]
    pub uns_fastapi_group_grouping_level: String,

    #[serde(default = "default_deployment_platform")]
    pub deployment_platform: String,
    #[serde(default = "default_docker_network")]
    pub docker_network: String,
    pub swarm_node_host: Option<String>,

    #[serde(default = "default_stream_api_image")]
    pub stream_api_image: String,
    #[serde(default = "default_routing_api_image")]
    pub routing_api_image: String,
    #[serde(default = "default_state_api_image")]
    pub state_api_image: String,

    #[serde(default = "default_cpu_limit_millis")]
    pub stream_api_cpu_limit_millis: i64,
    #[serde(default = "default_replicas")]
    pub stream_api_replicas: u64,

    #[serde(default = "default_port_base")]
    pub fastapi_group_port_base: u16,

    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default = "default_app_version")]
    pub application_version: String,
    #[serde(default = "default_app_version")]
    pub application_manufacturer: String,
    #[serde(default = "default_app_version")]
    pub openfactory_version: String,

    /// Upstream broker address needed only to build the per-group
    /// container/service environment block handed to deployed instances;
    /// the topic and consumer group id are derived per group, not global.
    pub kafka_broker: String,
    #[serde(default)]
    pub queue_maxsize: Option<usize>,
}

impl RoutingConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config: Self = Figment::new().merge(Env::raw()).extract()?;
        Ok(config)
    }

    pub fn runtime_environment(&self) -> anyhow::Result<RuntimeEnvironment> {
        Ok(self.environment.parse()?)
    }

    pub fn parsed_log_level(&self) -> anyhow::Result<LogLevel> {
        Ok(self.log_level.parse()?)
    }

    pub fn bind_addr(&self) -> String {
        format!(
            "{}:{}",
            self.host.clone().unwrap_or_else(|| "0.0.0.0".to_string()),
            self.port.unwrap_or(8080)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// `RoutingConfig::load` reads the whole process environment through
    /// `figment`, so these tests mutate real env vars and must not run
    /// concurrently with each other or with any other test doing the same.
    fn set_required_vars() {
        env::set_var("KSQLDB_URL", "http://ksqldb.local:8088");
        env::set_var("KSQLDB_ASSETS_STREAM", "assets");
        env::set_var("KSQLDB_ASSETS_TABLE", "assets_table");
        env::set_var("KSQLDB_UNS_MAP", "uns_map");
        env::set_var("KAFKA_BROKER", "kafka:9092");
    }

    fn clear_optional_vars() {
        for key in ["ENVIRONMENT", "LOG_LEVEL", "GROUPING_STRATEGY", "DEPLOYMENT_PLATFORM"] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn loads_with_defaults_when_optional_vars_are_absent() {
        set_required_vars();
        clear_optional_vars();

        let config = RoutingConfig::load().unwrap();
        assert_eq!(config.environment, "local");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.grouping_strategy, "uns_level");
        assert_eq!(config.deployment_platform, "docker");
        assert_eq!(config.ksqldb_url, "http://ksqldb.local:8088");
    }

    #[test]
    #[serial]
    fn explicit_env_vars_override_defaults() {
        set_required_vars();
        env::set_var("ENVIRONMENT", "production");
        env::set_var("DEPLOYMENT_PLATFORM", "swarm");

        let config = RoutingConfig::load().unwrap();
        assert_eq!(config.environment, "production");
        assert_eq!(config.deployment_platform, "swarm");
        assert!(!config.runtime_environment().unwrap().is_local());

        clear_optional_vars();
    }
}
