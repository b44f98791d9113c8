use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::services::lifecycle::{ApplicationEvent, RequestHandledEvent};
use crate::AppState;

/// Emits a `RequestHandled` lifecycle event for every request.
/// Responses with a 5xx status count as failures.
pub async fn request_event_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    state
        .lifecycle
        .dispatch(ApplicationEvent::RequestHandled(RequestHandledEvent {
            method,
            path,
            status: status.as_u16(),
            duration: started.elapsed(),
            failed: status.is_server_error(),
        }));

    response
}
