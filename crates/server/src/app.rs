//! The browser-facing login page.

use askama::Template;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;

use crate::AppResources;

/// Login page template. The form posts form-encoded credentials to
/// `/api/login` with the service name carried in a hidden field.
#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    service: String,
    display: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginPageQuery {
    pub service: Option<String>,
}

/// `GET /login?service=<name>` - render the login form for a known service.
#[tracing::instrument(skip(resources))]
pub async fn login_page(
    State(resources): State<AppResources>,
    Query(params): Query<LoginPageQuery>,
) -> Response {
    let Some(service) = params.service else {
        tracing::info!("login page requested without 'service' query param");
        return (StatusCode::BAD_REQUEST, "missing 'service' query parameter").into_response();
    };

    let Some(definition) = resources.catalog.get(&service) else {
        tracing::info!(%service, "login page requested for unknown service");
        return (StatusCode::BAD_REQUEST, "unknown service").into_response();
    };

    let template = LoginTemplate {
        service,
        display: definition.display,
    };
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render login template");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
