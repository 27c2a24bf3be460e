use std::process::ExitCode;
use std::sync::Arc;

use openfactory_stream_api::config::StreamApiConfig;
use openfactory_stream_api::fanout::FanoutIndex;
use openfactory_stream_api::web::{self, AppState};
use openfactory_stream_api::dispatcher;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match StreamApiConfig::load() {
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

    let fanout = FanoutIndex::new();

    let dispatcher = match dispatcher::start(
        &config.kafka_broker,
        &config.kafka_consumer_group_id,
        &config.kafka_topic,
        fanout.clone(),
        config.drop_slow_consumers,
    )
    .await
    {
        Ok(handle) => Arc::new(handle),
        Err(err) => {
            tracing::error!(error = %err, "dispatcher failed to start");
            return ExitCode::FAILURE;
        }
    };

    let state = AppState { fanout, dispatcher: dispatcher.clone(), queue_maxsize: config.queue_maxsize };
    let app = web::build_router(state);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr()).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(addr = %config.bind_addr(), group = %config.group_name, "listening");

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    match Arc::try_unwrap(dispatcher) {
        Ok(handle) => handle.stop().await,
        Err(_) => tracing::warn!("dispatcher handle still shared at shutdown, skipping clean stop"),
    }

    match serve_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server error");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
