//! C5 — SSE Proxy: a line-transparent forwarder from a group serving
//! instance's `/asset_stream` to the client.
//!
//! No parsing or reframing of SSE events is performed. The upstream
//! response is read line by line; each non-empty line is forwarded
//! verbatim with a trailing newline. A non-200 upstream response, or any
//! I/O error mid-stream, yields a single terminal `event: error` frame.
//! When the client disconnects, axum drops this stream, which drops the
//! upstream `reqwest` response and closes the upstream read promptly.

use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{self, Stream, StreamExt, TryStreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio_util::io::StreamReader;
use url::Url;

/// `reqwest::Response::bytes_stream()`'s concrete item type changes across
/// versions; name it through a trait object boundary instead of pinning
/// the exact stream type.
type BoxedByteStream = std::pin::Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// No request timeout on the read — this is a long-lived stream. A connect
/// timeout still bounds how long we wait for the TCP handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn proxy_event_stream(upstream_url: Url) -> Response {
    let client = match reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(err) => return error_response(err.to_string()),
    };

    let upstream = client
        .get(upstream_url)
        .header(header::ACCEPT, "text/event-stream")
        .send()
        .await;

    let response = match upstream {
        Ok(response) => response,
        Err(err) => return error_response(err.to_string()),
    };

    if !response.status().is_success() {
        let body = response.text().await.unwrap_or_default();
        return error_response(body);
    }

    let byte_stream: BoxedByteStream = Box::pin(response.bytes_stream());
    let io_stream = byte_stream.map_err(|err| std::io::Error::other(err));
    let reader = BufReader::new(StreamReader::new(io_stream));
    let lines = reader.lines();

    let body = Body::from_stream(line_transparent_frames(lines));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .unwrap_or_else(|err| error_response(err.to_string()))
}

fn line_transparent_frames<R>(
    lines: Lines<R>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    R: tokio::io::AsyncBufRead + Unpin + Send,
{
    stream::unfold(Some(lines), |state| async move {
        let mut lines = state?;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.is_empty() => continue,
                Ok(Some(line)) => {
                    let mut frame = line.into_bytes();
                    frame.push(b'\n');
                    return Some((Ok(Bytes::from(frame)), Some(lines)));
                }
                Ok(None) => return None,
                Err(err) => {
                    let frame = format!("event: error\ndata: {err}\n\n");
                    return Some((Ok(Bytes::from(frame)), None));
                }
            }
        }
    })
}

fn error_response(message: String) -> Response {
    let frame = format!("event: error\ndata: {message}\n\n");
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(Body::from(frame))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn body_string(response: Response) -> String {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn forwards_upstream_lines_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "event: asset_update\ndata: {\"id\":\"1\"}\n\nevent: asset_update\ndata: {\"id\":\"2\"}\n\n",
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let response = proxy_event_stream(Url::parse(&server.uri()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("event: asset_update"));
        assert!(body.contains("data: {\"id\":\"1\"}"));
        assert!(body.contains("data: {\"id\":\"2\"}"));
    }

    #[tokio::test]
    async fn non_200_upstream_yields_one_error_frame() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let response = proxy_event_stream(Url::parse(&server.uri()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.starts_with("event: error\n"));
        assert!(body.contains("upstream down"));
    }
}
