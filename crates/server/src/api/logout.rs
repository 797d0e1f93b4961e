//! `POST /api/logout` - revoke a refresh token by encoded-JWT match.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::{ApiError, decode_json};
use crate::AppResources;

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

#[tracing::instrument(skip(resources, body))]
pub async fn logout(State(resources): State<AppResources>, body: String) -> Response {
    let request: LogoutRequest = match decode_json(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match resources
        .service
        .revoke_refresh_token(&request.refresh_token)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}
