//! HTTP API for the authorization server, mounted under `/api`:
//!
//! - `POST /api/login` - authenticate and receive an auth-code redirect
//! - `POST /api/refresh` - consume a refresh token, mint a new pair
//! - `POST /api/logout` - revoke a refresh token
//! - `POST /api/register` - create an account

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde::de::DeserializeOwned;

use crate::AppResources;
use crate::service::ServiceError;

mod login;
mod logout;
mod refresh;
mod register;

pub use refresh::RefreshResponse;

/// Build the `/api` router.
pub fn router() -> Router<AppResources> {
    Router::new()
        .route("/login", post(login::login))
        .route("/refresh", post(refresh::refresh))
        .route("/logout", post(logout::logout))
        .route("/register", post(register::register))
}

/// Service-layer error carried to the HTTP boundary. Maps onto status codes;
/// bodies stay empty and details go to the log.
pub struct ApiError(pub ServiceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::InvalidCredentials | ServiceError::AccountNotFound => {
                StatusCode::UNAUTHORIZED
            }
            ServiceError::ServiceNotFound(_)
            | ServiceError::TokenInvalid(_)
            | ServiceError::TokenNotFound
            | ServiceError::InvalidHandle => StatusCode::BAD_REQUEST,
            ServiceError::HandleExists => StatusCode::CONFLICT,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "api request failed");
        } else {
            tracing::info!(error = %self.0, status = %status, "api request rejected");
        }

        status.into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError(e)
    }
}

/// Decode a JSON request body, rejecting parse failures with a bare 400.
fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T, Response> {
    serde_json::from_str(body).map_err(|e| {
        tracing::info!(error = %e, "bad json request");
        StatusCode::BAD_REQUEST.into_response()
    })
}

/// Serve the application: the login page plus the `/api` routes, with
/// request tracing and permissive CORS, until SIGINT/SIGTERM.
pub async fn start_webserver(resources: AppResources) -> color_eyre::Result<()> {
    use tower_http::{cors::CorsLayer, trace::TraceLayer};

    let port = resources.config.port;
    let router = Router::new()
        .route("/login", axum::routing::get(crate::app::login_page))
        .nest("/api", router())
        .with_state(resources)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("server running at {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
