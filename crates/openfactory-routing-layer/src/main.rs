use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use openfactory_core::deployment::{DeploymentPlatform, DockerDeploymentPlatform, SwarmDeploymentPlatform};
use openfactory_core::grouping::{GroupingStrategy, UnsLevelGroupingStrategy};
use openfactory_core::RoutingController;
use openfactory_routing_layer::config::RoutingConfig;
use openfactory_routing_layer::web::{self, AppState, VersionInfo};

#[derive(Parser)]
#[command(name = "openfactory-routing-layer", about = "Group-aware routing and streaming management CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deploy every group's derived stream and serving instance, plus the state API.
    Deploy,
    /// Tear down everything `deploy` created.
    Teardown,
    /// Run the HTTP front-end.
    Runserver,
    /// Build the three container images this system depends on.
    Build,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match RoutingConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let log_level = match config.parsed_log_level() {
        Ok(level) => level,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    openfactory_core::env::init_tracing(log_level);

    let result = match cli.command {
        Command::Deploy => run_deploy(&config).await,
        Command::Teardown => run_teardown(&config).await,
        Command::Runserver => run_server(&config).await,
        Command::Build => run_build().await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn build_grouping_strategy(config: &RoutingConfig) -> anyhow::Result<Box<dyn GroupingStrategy>> {
    match config.grouping_strategy.as_str() {
        "uns_level" => {
            let strategy = UnsLevelGroupingStrategy::connect(
                config.ksqldb_url.clone(),
                config.ksqldb_assets_stream.clone(),
                config.ksqldb_assets_table.clone(),
                config.ksqldb_uns_map.clone(),
                config.uns_fastapi_group_grouping_level.clone(),
            )
            .await?;
            Ok(Box::new(strategy))
        }
        other => anyhow::bail!("unknown GROUPING_STRATEGY '{other}', expected one of: uns_level"),
    }
}

/// Base environment every stream-api container/service receives. The
/// deployment backend layers `GROUP_NAME`, `KAFKA_TOPIC` and
/// `KAFKA_CONSUMER_GROUP_ID` on top, per group, at deploy time — those
/// three are never global.
fn stream_api_env(config: &RoutingConfig) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert("KAFKA_BROKER".to_string(), config.kafka_broker.clone());
    env.insert("LOG_LEVEL".to_string(), config.log_level.clone());
    if let Some(size) = config.queue_maxsize {
        env.insert("QUEUE_MAXSIZE".to_string(), size.to_string());
    }
    env
}

fn routing_api_env(config: &RoutingConfig, environment: &str) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert("KSQLDB_URL".to_string(), config.ksqldb_url.clone());
    env.insert("KAFKA_BROKER".to_string(), config.kafka_broker.clone());
    env.insert("KSQLDB_ASSETS_STREAM".to_string(), config.ksqldb_assets_stream.clone());
    env.insert("KSQLDB_ASSETS_TABLE".to_string(), config.ksqldb_assets_table.clone());
    env.insert("KSQLDB_UNS_MAP".to_string(), config.ksqldb_uns_map.clone());
    env.insert("LOG_LEVEL".to_string(), config.log_level.clone());
    env.insert("ENVIRONMENT".to_string(), environment.to_string());
    env.insert("DEPLOYMENT_PLATFORM".to_string(), config.deployment_platform.clone());
    env
}

fn state_api_env(config: &RoutingConfig) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert("KSQLDB_URL".to_string(), config.ksqldb_url.clone());
    env.insert("KSQLDB_ASSETS_TABLE".to_string(), config.ksqldb_assets_table.clone());
    env.insert("LOG_LEVEL".to_string(), config.log_level.clone());
    env.insert("DEPLOYMENT_PLATFORM".to_string(), config.deployment_platform.clone());
    env
}

async fn build_deployment_platform(config: &RoutingConfig) -> anyhow::Result<Box<dyn DeploymentPlatform>> {
    let environment = config.runtime_environment()?;
    let stream_env = stream_api_env(config);
    let routing_env = routing_api_env(config, &config.environment);
    let state_env = state_api_env(config);

    match config.deployment_platform.as_str() {
        "docker" => {
            let platform = DockerDeploymentPlatform::connect(
                config.docker_network.clone(),
                environment,
                config.fastapi_group_port_base,
                config.stream_api_image.clone(),
                config.routing_api_image.clone(),
                config.state_api_image.clone(),
                config.stream_api_cpu_limit_millis,
                stream_env,
                routing_env,
                state_env,
            )
            .await?;
            Ok(Box::new(platform))
        }
        "swarm" => {
            let node_host = config
                .swarm_node_host
                .clone()
                .ok_or_else(|| anyhow::anyhow!("SWARM_NODE_HOST is required when DEPLOYMENT_PLATFORM=swarm"))?;
            let platform = SwarmDeploymentPlatform::connect(
                node_host,
                config.docker_network.clone(),
                config.stream_api_image.clone(),
                config.routing_api_image.clone(),
                config.state_api_image.clone(),
                config.stream_api_replicas,
                stream_env,
                routing_env,
                state_env,
            )
            .await?;
            Ok(Box::new(platform))
        }
        other => anyhow::bail!("unknown DEPLOYMENT_PLATFORM '{other}', expected one of: docker, swarm"),
    }
}

async fn build_controller(config: &RoutingConfig) -> anyhow::Result<RoutingController> {
    let registry = build_grouping_strategy(config).await?;
    let backend = build_deployment_platform(config).await?;
    let environment = config.runtime_environment()?;
    Ok(RoutingController::new(registry, backend, environment))
}

async fn run_deploy(config: &RoutingConfig) -> anyhow::Result<()> {
    let controller = build_controller(config).await?;
    controller.deploy().await?;
    tracing::info!("deploy complete");
    Ok(())
}

async fn run_teardown(config: &RoutingConfig) -> anyhow::Result<()> {
    let controller = build_controller(config).await?;
    controller.teardown().await?;
    tracing::info!("teardown complete");
    Ok(())
}

async fn run_server(config: &RoutingConfig) -> anyhow::Result<()> {
    let controller = Arc::new(build_controller(config).await?);
    let version = VersionInfo {
        application_version: config.application_version.clone(),
        application_manufacturer: config.application_manufacturer.clone(),
        openfactory_version: config.openfactory_version.clone(),
    };
    let state = AppState::new(controller, version)?;
    let app = web::build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %config.bind_addr(), "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn run_build() -> anyhow::Result<()> {
    const IMAGES: [(&str, &str); 3] = [
        ("routing-layer", "."),
        ("stream-api-non-replicated", "."),
        ("state-api", "."),
    ];

    for (name, context) in IMAGES {
        tracing::info!(image = name, "building image");
        let status = tokio::process::Command::new("docker")
            .args(["build", "-t", &format!("openfactoryio/{name}:latest"), context])
            .status()
            .await?;
        if !status.success() {
            anyhow::bail!("docker build failed for {name}");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
