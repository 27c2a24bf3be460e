//! C7 — Stream Endpoint, plus the group instance's own `/health`/`/ready`.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::{self, Stream};
use openfactory_core::AssetUuid;
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::dispatcher::DispatcherHandle;
use crate::fanout::{FanoutIndex, SubscriberId};

#[derive(Clone)]
pub struct AppState {
    pub fanout: FanoutIndex,
    pub dispatcher: Arc<DispatcherHandle>,
    pub queue_maxsize: usize,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/asset_stream", get(asset_stream))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

struct SubscriptionGuard {
    fanout: FanoutIndex,
    asset: AssetUuid,
    id: SubscriberId,
    receiver: mpsc::Receiver<String>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.fanout.unsubscribe(&self.asset, self.id);
    }
}

async fn asset_stream(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(asset) = params.get("asset_uuid").cloned().and_then(AssetUuid::parse) else {
        return (
            axum::http::StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "asset_uuid is required" })),
        )
            .into_response();
    };

    let dataitem_filter = params.get("id").cloned();

    let (id, receiver) = state.fanout.subscribe(&asset, state.queue_maxsize);
    let guard = SubscriptionGuard { fanout: state.fanout.clone(), asset, id, receiver };

    let event_stream = subscription_events(guard, dataitem_filter);

    Sse::new(event_stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("heartbeat"))
        .into_response()
}

fn subscription_events(
    guard: SubscriptionGuard,
    dataitem_filter: Option<String>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let dataitem_filter = Arc::new(dataitem_filter);

    stream::unfold(Some(guard), move |state| {
        let dataitem_filter = dataitem_filter.clone();
        async move {
            let mut guard = state?;
            loop {
                let payload = guard.receiver.recv().await?;

                match payload_matches_filter(&payload, dataitem_filter.as_deref()) {
                    Some(true) => {}
                    Some(false) => continue,
                    None => {
                        tracing::warn!("skipping unparsable payload while data-item filtering");
                        continue;
                    }
                }

                let event = Event::default().event("asset_update").data(payload);
                return Some((Ok(event), Some(guard)));
            }
        }
    })
}

/// `None` if `filter` is set but `payload` isn't a JSON object with a
/// matching `"id"` field (including the "not JSON at all" case) — the
/// caller skips and logs; `Some(_)` otherwise. No filter always matches.
fn payload_matches_filter(payload: &str, filter: Option<&str>) -> Option<bool> {
    let Some(filter) = filter else { return Some(true) };
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    Some(value.get("id").and_then(|v| v.as_str()) == Some(filter))
}

async fn health() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

async fn ready(State(state): State<AppState>) -> Response {
    if state.dispatcher.ready() {
        Json(json!({ "status": "ready" })).into_response()
    } else {
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready", "issues": "partitions not yet assigned" })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"id":"A"}"#, Some("A"), Some(true))]
    #[case(r#"{"id":"B"}"#, Some("A"), Some(false))]
    #[case(r#"{"id":"A"}"#, None, Some(true))]
    #[case(r#"not json"#, Some("A"), None)]
    #[case(r#"{"no_id_field":1}"#, Some("A"), Some(false))]
    fn matches_filter_as_expected(
        #[case] payload: &str,
        #[case] filter: Option<&str>,
        #[case] expected: Option<bool>,
    ) {
        assert_eq!(payload_matches_filter(payload, filter), expected);
    }
}
