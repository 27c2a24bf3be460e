//! End-to-end scenarios against the group instance's own HTTP surface.

use axum_test::TestServer;
use openfactory_core::AssetUuid;
use openfactory_stream_api::dispatcher::DispatcherHandle;
use openfactory_stream_api::fanout::FanoutIndex;
use openfactory_stream_api::web::{self, AppState};
use std::sync::Arc;

fn test_server(ready: bool) -> (TestServer, FanoutIndex) {
    let fanout = FanoutIndex::new();
    let state = AppState {
        fanout: fanout.clone(),
        dispatcher: Arc::new(DispatcherHandle::stub(ready)),
        queue_maxsize: 10,
    };
    (TestServer::new(web::build_router(state)).unwrap(), fanout)
}

#[tokio::test]
async fn health_is_always_ok() {
    let (server, _fanout) = test_server(false);
    let response = server.get("/health").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn ready_reflects_dispatcher_state() {
    let (server, _fanout) = test_server(false);
    let response = server.get("/ready").await;
    response.assert_status_service_unavailable();

    let (server, _fanout) = test_server(true);
    let response = server.get("/ready").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn asset_stream_requires_asset_uuid() {
    let (server, _fanout) = test_server(true);
    let response = server.get("/asset_stream").await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn subscribing_registers_in_the_fanout_index() {
    let (_server, fanout) = test_server(true);
    let asset = AssetUuid::parse("A").unwrap();
    let (id, _rx) = fanout.subscribe(&asset, 10);
    assert!(fanout.contains_key(&asset));
    fanout.unsubscribe(&asset, id);
    assert!(!fanout.contains_key(&asset));
}
