//! Per-request access logging.
//!
//! One structured `info` line per completed request, plus the request
//! latency histogram. Forwarding headers are logged only when present.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::observability::metrics;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_SERVER: &str = "x-forwarded-server";
const X_REQUEST_ID: &str = "x-request-id";

fn header_str<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let uri = request.uri().clone();
    let from = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    let headers = request.headers();
    let host = header_str(headers, header::HOST).unwrap_or_default().to_string();
    let user_agent = header_str(headers, header::USER_AGENT).unwrap_or_default().to_string();
    let forwarded_for = header_str(headers, X_FORWARDED_FOR).map(str::to_string);
    let forwarded_host = header_str(headers, X_FORWARDED_HOST).map(str::to_string);
    let forwarded_server = header_str(headers, X_FORWARDED_SERVER).map(str::to_string);
    let request_id = header_str(headers, X_REQUEST_ID).map(str::to_string);

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();
    tracing::info!(
        method = %method,
        uri = %uri,
        duration = ?duration,
        from = %from,
        host = %host,
        status_code = status.as_u16(),
        user_agent = %user_agent,
        x_forwarded_for = forwarded_for.as_deref(),
        x_forwarded_host = forwarded_host.as_deref(),
        x_forwarded_server = forwarded_server.as_deref(),
        request_id = request_id.as_deref(),
        "Request completed"
    );
    metrics::record_http_request(method.as_str(), status.as_u16(), duration);

    response
}
