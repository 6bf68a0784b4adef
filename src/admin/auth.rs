use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::admin::AdminState;

/// Require `Authorization: Bearer <api_key>`. An empty key disables the check.
pub async fn admin_auth_middleware(
    State(state): State<AdminState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if state.api_key.is_empty() {
        return Ok(next.run(request).await);
    }

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == &*state.api_key);

    if authorized {
        Ok(next.run(request).await)
    } else {
        tracing::debug!(path = %request.uri().path(), "Rejected unauthenticated admin request");
        Err(StatusCode::UNAUTHORIZED)
    }
}
