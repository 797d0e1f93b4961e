//! `POST /api/refresh` - single-use rotation of a refresh token into a
//! fresh (access, refresh) pair.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use super::{ApiError, decode_json};
use crate::AppResources;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

#[tracing::instrument(skip(resources, body))]
pub async fn refresh(State(resources): State<AppResources>, body: String) -> Response {
    let request: RefreshRequest = match decode_json(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match resources
        .service
        .refresh_tokens(&request.refresh_token)
        .await
    {
        Ok((access_token, refresh_token)) => Json(RefreshResponse {
            access_token: access_token.encoded().to_owned(),
            refresh_token: refresh_token.encoded().to_owned(),
        })
        .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}
