//! Same-origin edge proxy to the conversational API.
//!
//! The browser never sees the service credential: every GET or POST under
//! `/api/proxy/` is replayed against the configured base URL with the bearer
//! token injected, and the upstream response is streamed back unchanged
//! apart from hop-by-hop headers.

use axum::body::{Body, Bytes};
use axum::extract::{Path, RawQuery, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use crate::error::{ErrorBody, error_response};
use crate::state::AppState;

pub const CONFIG_MISSING: &str = "API configuration missing";
pub const PROXY_FAILED: &str = "Failed to proxy request";

/// Response headers that describe the upstream connection, not the payload.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// `GET|POST /api/proxy/{*path}`: forward to `{CHAT_API_BASE_URL}/{path}`.
pub async fn forward(
    State(state): State<AppState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    method: Method,
    body: Bytes,
) -> Response {
    let configured = state
        .config
        .chat
        .as_ref()
        .filter(|chat| !chat.base_url.trim().is_empty() && !chat.api_key.trim().is_empty());
    let Some(chat) = configured else {
        warn!(%path, "proxy: conversational API not configured");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::message(CONFIG_MISSING));
    };

    let url = target_url(&chat.base_url, &path, query.as_deref());
    info!(%method, %url, "proxy: forwarding");

    let mut request = state
        .http
        .request(method.clone(), &url)
        .bearer_auth(&chat.api_key)
        .header(CONTENT_TYPE, "application/json");
    if method == Method::POST {
        request = request.body(body);
    }

    let upstream = match request.send().await {
        Ok(upstream) => upstream,
        Err(e) => {
            warn!(error = %e, %url, "proxy: upstream request failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::message(PROXY_FAILED));
        }
    };

    let status = upstream.status();
    info!(status = status.as_u16(), %url, "proxy: upstream responded");
    let headers = passthrough_headers(upstream.headers());
    (status, headers, Body::from_stream(upstream.bytes_stream())).into_response()
}

pub(crate) fn target_url(base_url: &str, path: &str, query: Option<&str>) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match query.filter(|q| !q.is_empty()) {
        Some(query) => format!("{base}/{path}?{query}"),
        None => format!("{base}/{path}"),
    }
}

/// Copy upstream headers minus hop-by-hop ones and any credential echo.
pub(crate) fn passthrough_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        if HOP_BY_HOP.contains(&name.as_str()) || *name == AUTHORIZATION {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

#[cfg(test)]
#[path = "proxy_test.rs"]
mod tests;
