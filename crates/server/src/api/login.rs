//! `POST /api/login` - form-encoded or JSON credential submission.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use super::{ApiError, decode_json};
use crate::AppResources;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub service: String,
}

/// Content-negotiates between `application/json` and
/// `application/x-www-form-urlencoded` (the login page posts the latter).
/// Anything else is 415. On success: 303 to the service's redirect URL with
/// the `auth_code` query parameter set.
#[tracing::instrument(skip(resources, headers, body))]
pub async fn login(
    State(resources): State<AppResources>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    let request: LoginRequest = if content_type.starts_with("application/json") {
        match decode_json(&body) {
            Ok(request) => request,
            Err(response) => return response,
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        match serde_urlencoded::from_str(&body) {
            Ok(request) => request,
            Err(e) => {
                tracing::info!(error = %e, "bad form request");
                return StatusCode::BAD_REQUEST.into_response();
            }
        }
    } else {
        tracing::info!(content_type, "unsupported login content type");
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    };

    if request.handle.is_empty() || request.secret.is_empty() || request.service.is_empty() {
        tracing::info!("login request missing required fields");
        return StatusCode::BAD_REQUEST.into_response();
    }

    match resources
        .service
        .login(&request.handle, &request.secret, &request.service)
        .await
    {
        Ok(redirect_url) => Redirect::to(redirect_url.as_str()).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}
