//! HTTP API for the relay

use crate::error::RelayError;
use crate::models::{ConnectorConfig, RelayRequest, RelayResponse};
use crate::service::RelayService;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures_util::{pin_mut, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Reply};

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Request body for POST /api/v1/messages
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

/// Body exceeded `max_request_size`
#[derive(Debug)]
struct BodyTooLarge;

impl warp::reject::Reject for BodyTooLarge {}

/// Body stream failed before it was complete
#[derive(Debug)]
struct BodyReadFailed(String);

impl warp::reject::Reject for BodyReadFailed {}

/// Collect the request body up to `limit` bytes. Chunked bodies without a
/// Content-Length are accepted and counted as they arrive.
fn limited_body(limit: u64) -> impl Filter<Extract = (Bytes,), Error = warp::Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and(warp::body::stream())
        .and_then(move |declared: Option<u64>, body| collect_body(declared, body, limit))
}

async fn collect_body<S, B>(
    declared: Option<u64>,
    body: S,
    limit: u64,
) -> Result<Bytes, warp::Rejection>
where
    S: Stream<Item = Result<B, warp::Error>> + Send,
    B: Buf + Send,
{
    if declared.map_or(false, |len| len > limit) {
        return Err(warp::reject::custom(BodyTooLarge));
    }

    pin_mut!(body);
    let mut collected = BytesMut::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| warp::reject::custom(BodyReadFailed(e.to_string())))?;
        if (collected.len() + chunk.remaining()) as u64 > limit {
            return Err(warp::reject::custom(BodyTooLarge));
        }
        collected.put(chunk);
    }

    Ok(collected.freeze())
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, warp::reply::Response> {
    serde_json::from_slice(body)
        .map_err(|e| error_reply(&RelayError::InvalidRequest(format!("Invalid JSON: {}", e))))
}

/// Create HTTP API routes
pub fn create_api_routes(
    service: Arc<RelayService>,
    max_request_size: u64,
) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
    let service_filter = warp::any().map(move || Arc::clone(&service));

    // POST /api/v1/relay - Request envelope (saveConfig, getConfig, sendMessage, raw events)
    let post_relay = warp::path!("api" / "v1" / "relay")
        .and(warp::post())
        .and(limited_body(max_request_size))
        .and(service_filter.clone())
        .and_then(handle_post_relay);

    // GET /api/v1/config - Current connector config
    let get_config = warp::path!("api" / "v1" / "config")
        .and(warp::get())
        .and(service_filter.clone())
        .and_then(handle_get_config);

    // PUT /api/v1/config - Replace connector config
    let put_config = warp::path!("api" / "v1" / "config")
        .and(warp::put())
        .and(limited_body(max_request_size))
        .and(service_filter.clone())
        .and_then(handle_put_config);

    // POST /api/v1/messages - Publish a message
    let post_messages = warp::path!("api" / "v1" / "messages")
        .and(warp::post())
        .and(limited_body(max_request_size))
        .and(service_filter.clone())
        .and_then(handle_post_messages);

    // GET /api/v1/health - Health check endpoint
    let get_health = warp::path!("api" / "v1" / "health")
        .and(warp::get())
        .map(|| {
            warp::reply::json(&HealthResponse {
                status: "healthy".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
        });

    post_relay
        .or(get_config)
        .or(put_config)
        .or(post_messages)
        .or(get_health)
        .recover(handle_rejection)
}

/// Turn an envelope into an HTTP reply: status from `statusCode`, body as JSON
pub fn envelope_reply(response: RelayResponse) -> warp::reply::Response {
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match response.body {
        Some(body) => warp::reply::with_status(warp::reply::json(&body), status).into_response(),
        None => status.into_response(),
    }
}

fn error_reply(err: &RelayError) -> warp::reply::Response {
    envelope_reply(RelayResponse::error(err))
}

/// Handle POST /api/v1/relay
async fn handle_post_relay(
    body: Bytes,
    service: Arc<RelayService>,
) -> Result<warp::reply::Response, warp::Rejection> {
    // An empty body is an event without fields; forward it as an empty object
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::json!({})
    } else {
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                return Ok(error_reply(&RelayError::InvalidRequest(format!(
                    "Invalid JSON: {}",
                    e
                ))))
            }
        }
    };

    Ok(envelope_reply(service.handle_value(payload).await))
}

/// Handle GET /api/v1/config
async fn handle_get_config(
    service: Arc<RelayService>,
) -> Result<warp::reply::Response, warp::Rejection> {
    match service.get_config().await {
        Ok(config) => Ok(warp::reply::json(&config).into_response()),
        Err(e) => Ok(error_reply(&e)),
    }
}

/// Handle PUT /api/v1/config
async fn handle_put_config(
    body: Bytes,
    service: Arc<RelayService>,
) -> Result<warp::reply::Response, warp::Rejection> {
    let config: ConnectorConfig = match parse_json(&body) {
        Ok(config) => config,
        Err(reply) => return Ok(reply),
    };
    let response = service.handle(RelayRequest::SaveConfig(config)).await;
    Ok(envelope_reply(response))
}

/// Handle POST /api/v1/messages
async fn handle_post_messages(
    body: Bytes,
    service: Arc<RelayService>,
) -> Result<warp::reply::Response, warp::Rejection> {
    let request: SendMessageRequest = match parse_json(&body) {
        Ok(request) => request,
        Err(reply) => return Ok(reply),
    };
    let response = service
        .handle(RelayRequest::SendMessage(request.message))
        .await;
    Ok(envelope_reply(response))
}

/// Map warp rejections onto the relay error body
async fn handle_rejection(rejection: warp::Rejection) -> Result<warp::reply::Response, Infallible> {
    let (status, kind, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not_found", "Not found".to_string())
    } else if rejection.find::<BodyTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            "Request body too large".to_string(),
        )
    } else if let Some(e) = rejection.find::<BodyReadFailed>() {
        (
            StatusCode::BAD_REQUEST,
            "invalid_request",
            format!("Failed to read request body: {}", e.0),
        )
    } else if let Some(e) = rejection.find::<warp::reject::InvalidHeader>() {
        (StatusCode::BAD_REQUEST, "invalid_request", e.to_string())
    } else if rejection
        .find::<warp::reject::MethodNotAllowed>()
        .is_some()
    {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "Method not allowed".to_string(),
        )
    } else {
        tracing::warn!(?rejection, "Unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
            "kind": kind,
        })),
        status,
    )
    .into_response())
}
