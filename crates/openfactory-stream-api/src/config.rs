//! Environment-only configuration for the streaming dispatcher process.

use figment::providers::Env;
use figment::Figment;
use openfactory_core::env::LogLevel;
use serde::Deserialize;

fn default_log_level() -> String {
    "info".to_string()
}
fn default_queue_maxsize() -> usize {
    1000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_drop_slow_consumers() -> bool {
    false
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamApiConfig {
    pub kafka_broker: String,
    pub kafka_topic: String,
    pub kafka_consumer_group_id: String,

    /// The group this instance serves, injected by the deployment backend.
    pub group_name: String,

    #[serde(default = "default_queue_maxsize")]
    pub queue_maxsize: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// Opt-in alternative to the default block-on-full backpressure: drop
    /// a message for a subscriber whose queue is currently full instead of
    /// blocking the dispatcher.
    #[serde(default = "default_drop_slow_consumers")]
    pub drop_slow_consumers: bool,
}

impl StreamApiConfig {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Figment::new().merge(Env::raw()).extract()?)
    }

    pub fn parsed_log_level(&self) -> anyhow::Result<LogLevel> {
        Ok(self.log_level.parse()?)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
