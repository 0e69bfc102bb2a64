//! Endpoints of HTTP server.
//!
//! The page is the user interface: it shows the live stream, forwards the
//! capture button and the slider as events and polls `/state` for what to
//! display.
use axum::{
    body::StreamBody,
    extract::Query,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::WatchStream;
use webcam::LiveFeed;

use crate::{
    events::InputSource,
    surface::{SnapshotReceiver, UiState},
};

/// JPEG quality of the served canvas.
const CANVAS_QUALITY: i32 = 90;

const INDEX_HTML: &str = include_str!("index.html");

/// Build the router serving the page and its API.
pub fn router(input: InputSource, snapshot: SnapshotReceiver, feed: LiveFeed) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthcheck", get(healthcheck))
        .route("/stream", get(live_stream))
        .route("/capture", post(capture))
        .route("/slider", post(slider))
        .route("/state", get(state))
        .route("/canvas", get(canvas))
        .layer(Extension(input))
        .layer(Extension(snapshot))
        .layer(Extension(feed))
}

/// Health check endpoint.
pub async fn healthcheck() -> &'static str {
    "healthy"
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Live camera stream as MJPEG.
pub async fn live_stream(Extension(feed): Extension<LiveFeed>) -> impl IntoResponse {
    log::info!("Live stream requested");

    let stream = WatchStream::new(feed.subscribe()).filter_map(|frame| async move {
        frame.map(|data| Ok::<_, String>(as_jpeg_stream_item(&data)))
    });

    // Set body and headers for multipart streaming
    let body = StreamBody::new(stream);
    let headers = [(
        header::CONTENT_TYPE,
        "multipart/x-mixed-replace; boundary=frame",
    )];

    (headers, body)
}

/// Capture button.
pub async fn capture(Extension(input): Extension<InputSource>) -> StatusCode {
    match input.capture().await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(err) => {
            log::error!("Capture not delivered: {err}");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SliderParams {
    value: u8,
}

/// Slider input.
pub async fn slider(
    Extension(input): Extension<InputSource>,
    Query(params): Query<SliderParams>,
) -> StatusCode {
    match input.slider(params.value).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(err) => {
            log::error!("Slider value not delivered: {err}");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Status text, progress, alert and canvas version for the page.
pub async fn state(Extension(snapshot): Extension<SnapshotReceiver>) -> Json<UiState> {
    let state = UiState::from(&*snapshot.borrow());
    Json(state)
}

/// Current canvas as JPEG, no content while blank.
pub async fn canvas(Extension(snapshot): Extension<SnapshotReceiver>) -> Response {
    let image = snapshot.borrow().canvas.clone();
    let Some(image) = image else {
        return StatusCode::NO_CONTENT.into_response();
    };

    match turbojpeg::compress_image(&*image, CANVAS_QUALITY, turbojpeg::Subsamp::Sub2x2) {
        Ok(buf) => (
            [(header::CONTENT_TYPE, "image/jpeg")],
            Bytes::copy_from_slice(&buf),
        )
            .into_response(),
        Err(err) => {
            log::error!("Failed to encode canvas: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Wrap a JPEG frame as one part of a `multipart/x-mixed-replace` stream.
fn as_jpeg_stream_item(data: &[u8]) -> Bytes {
    Bytes::copy_from_slice(
        &[
            "--frame\r\nContent-Type: image/jpeg\r\n\r\n".as_bytes(),
            data,
            "\r\n\r\n".as_bytes(),
        ]
        .concat(),
    )
}
