//! Shared environment primitives: the deployment environment and log level
//! enums, rejecting unknown values at config-load time rather than at
//! first use.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    Local,
    Dev,
    Devswarm,
    Production,
}

impl RuntimeEnvironment {
    /// `local` is the only environment that binds a host port and runs the
    /// front-end on the host instead of deploying it as a cluster service.
    pub fn is_local(self) -> bool {
        matches!(self, Self::Local)
    }
}

impl FromStr for RuntimeEnvironment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "dev" => Ok(Self::Dev),
            "devswarm" => Ok(Self::Devswarm),
            "production" => Ok(Self::Production),
            other => Err(CoreError::configuration(format!(
                "invalid ENVIRONMENT '{other}': expected one of local, dev, devswarm, production"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Maps to the `tracing`/`EnvFilter` level name; `critical` has no
    /// direct tracing equivalent and is treated as `error`.
    pub fn as_tracing_level(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            other => Err(CoreError::configuration(format!(
                "invalid LOG_LEVEL '{other}': expected one of debug, info, warning, error, critical"
            ))),
        }
    }
}

/// Installs a `tracing-subscriber` registry with an `EnvFilter` derived
/// from the given level.
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_new(level.as_tracing_level())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
