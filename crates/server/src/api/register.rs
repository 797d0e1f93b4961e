//! `POST /api/register` - create an account.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::{ApiError, decode_json};
use crate::AppResources;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[tracing::instrument(skip(resources, body), fields(username))]
pub async fn register(State(resources): State<AppResources>, body: String) -> Response {
    let request: RegisterRequest = match decode_json(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    tracing::Span::current().record("username", request.username.as_str());

    match resources
        .service
        .register(&request.username, &request.password)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}
