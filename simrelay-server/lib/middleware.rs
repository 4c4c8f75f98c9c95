//! Request middleware.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::IntoResponse,
};

//--------------------------------------------------------------------------------------------------
// Middleware Functions
//--------------------------------------------------------------------------------------------------

/// Logs every request and the status it was answered with.
pub async fn logging_middleware(
    req: Request<Body>,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let method = req.method().clone();
    let uri = req.uri().clone();

    tracing::debug!("request: {method} {uri}");
    let response = next.run(req).await;
    tracing::info!("{method} {uri}: {}", response.status());

    Ok(response)
}
