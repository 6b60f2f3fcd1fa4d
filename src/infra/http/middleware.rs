use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{debug, error, warn};

use crate::application::error::ErrorReport;

/// Logs every response; failed responses additionally carry the cause chain
/// their handler attached as an [`ErrorReport`], which is stripped here so
/// it never reaches the wire.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let mut response = next.run(request).await;

    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    if !status.is_client_error() && !status.is_server_error() {
        debug!(%method, %uri, status = status.as_u16(), elapsed_ms, "request completed");
        return response;
    }

    let (source, detail) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages.join("; ")),
        None => ("unknown", String::new()),
    };

    if status.is_server_error() {
        error!(
            %method,
            %uri,
            status = status.as_u16(),
            elapsed_ms,
            source,
            detail,
            "request failed"
        );
    } else {
        warn!(
            %method,
            %uri,
            status = status.as_u16(),
            elapsed_ms,
            source,
            detail,
            "request rejected"
        );
    }

    response
}
