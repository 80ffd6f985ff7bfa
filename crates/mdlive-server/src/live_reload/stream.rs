//! Event stream endpoint for live reload.
//!
//! Each `GET /refresh/` connection registers with the [`Hub`] and receives
//! one `data:` frame per published message. Two tasks serve a connection:
//! a write loop that turns hub messages into frames, and a disconnect
//! watcher that unregisters the client once the HTTP layer drops the body.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderValue, Version, header};
use axum::response::{IntoResponse, Response};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;

use super::hub::{ClientRegistration, Hub};
use crate::error::ServerError;
use crate::state::AppState;

/// Frames buffered between the write loop and the HTTP body.
const FRAME_BUFFER: usize = 4;

/// Comment frame sent periodically; clients ignore it.
const KEEP_ALIVE_FRAME: &str = ": keep-alive\n\n";

/// Handle `GET /refresh/`.
pub(crate) async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    version: Version,
) -> Result<Response, ServerError> {
    // Chunked transfer coding is needed to flush frames one by one.
    if matches!(version, Version::HTTP_09 | Version::HTTP_10) {
        return Err(ServerError::StreamingUnsupported);
    }

    let registration = state.hub.register();
    tracing::debug!(client = %registration.id(), "Event stream opened");
    let body = spawn_client_stream(state.hub.clone(), registration, state.keep_alive);

    let mut response = (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        body,
    )
        .into_response();

    if version == Version::HTTP_11 {
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    }

    Ok(response)
}

/// Start the write loop and disconnect watcher for one client.
///
/// Returns the streaming response body. The body ends when the client is
/// unregistered; dropping the body unregisters the client.
fn spawn_client_stream(
    hub: Hub,
    mut registration: ClientRegistration,
    keep_alive: Duration,
) -> Body {
    let (frames, body) = mpsc::channel::<Result<Bytes, Infallible>>(FRAME_BUFFER);
    let (write_done, write_done_rx) = oneshot::channel::<()>();
    let id = registration.id();

    let watcher_frames = frames.clone();
    tokio::spawn(async move {
        tokio::select! {
            biased;
            () = watcher_frames.closed() => {
                tracing::info!(client = %id, "HTTP connection just closed");
                hub.unregister(id);
            }
            _ = write_done_rx => {}
        }
    });

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + keep_alive, keep_alive);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let frame = tokio::select! {
                message = registration.recv() => match message {
                    Some(message) => encode_frame(&format!("Message: {message}")),
                    None => break,
                },
                _ = ticker.tick() => KEEP_ALIVE_FRAME.to_owned(),
            };

            if frames.send(Ok(Bytes::from(frame))).await.is_err() {
                break;
            }
        }

        tracing::debug!(client = %id, "Event stream finished");
        drop(write_done);
    });

    Body::from_stream(ReceiverStream::new(body))
}

/// Encode a payload with event-stream framing.
///
/// Every line becomes a `data:` field; a blank line terminates the event.
fn encode_frame(payload: &str) -> String {
    let mut frame = String::with_capacity(payload.len() + 8);
    for line in payload.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
    frame
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tokio_stream::StreamExt;

    use super::*;

    #[test]
    fn test_encode_frame_single_line() {
        assert_eq!(
            encode_frame("Message: Files have been changed."),
            "data: Message: Files have been changed.\n\n"
        );
    }

    #[test]
    fn test_encode_frame_multi_line() {
        assert_eq!(encode_frame("a\nb"), "data: a\ndata: b\n\n");
    }

    #[tokio::test]
    async fn test_stream_forwards_messages() {
        let hub = Hub::spawn();
        let body = spawn_client_stream(hub.clone(), hub.register(), Duration::from_secs(60));
        let mut data = body.into_data_stream();

        hub.publish("hello");

        let frame = data.next().await.unwrap().unwrap();
        assert_eq!(frame, Bytes::from("data: Message: hello\n\n"));
    }

    #[tokio::test]
    async fn test_dropping_body_unregisters_client() {
        let hub = Hub::spawn();
        let body = spawn_client_stream(hub.clone(), hub.register(), Duration::from_secs(60));
        assert_eq!(hub.client_count().await, 1);

        drop(body);

        let deadline = Instant::now() + Duration::from_secs(5);
        while hub.client_count().await != 0 {
            assert!(Instant::now() < deadline, "client was never unregistered");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_body_ends_when_hub_closes_client() {
        let hub = Hub::spawn();
        let body = spawn_client_stream(hub.clone(), hub.register(), Duration::from_secs(60));
        let mut data = body.into_data_stream();

        hub.close_all();

        let next = tokio::time::timeout(Duration::from_secs(5), data.next())
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_keep_alive_comment() {
        let hub = Hub::spawn();
        let body = spawn_client_stream(hub.clone(), hub.register(), Duration::from_millis(20));
        let mut data = body.into_data_stream();

        let frame = data.next().await.unwrap().unwrap();
        assert_eq!(frame, Bytes::from(KEEP_ALIVE_FRAME));
    }

    #[tokio::test]
    async fn test_stream_opened_after_close_all_ends() {
        let hub = Hub::spawn();
        hub.close_all();

        let body = spawn_client_stream(hub.clone(), hub.register(), Duration::from_secs(60));
        let mut data = body.into_data_stream();

        let next = tokio::time::timeout(Duration::from_secs(5), data.next())
            .await
            .unwrap();
        assert!(next.is_none());
    }
}
