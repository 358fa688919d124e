//! Roman webhook HTTP server

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode, header::AUTHORIZATION},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::auth::{AuthError, AuthResolver, bearer_token};
use crate::dispatcher::{DispatchError, Dispatcher, HandlerContext};
use crate::events::InboundEvent;
use crate::version::read_version;

/// Webhook server state
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthResolver,
    pub dispatcher: Dispatcher,
    pub release_file_path: Option<PathBuf>,
}

/// Request failure mapped to an HTTP status (no body)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("authorization required")]
    Unauthenticated,

    #[error("no Roman auth found")]
    TenantNotFound,

    #[error("malformed event: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::TenantNotFound => StatusCode::NOT_FOUND,
            Self::MalformedEvent(_) | Self::Dispatch(DispatchError::Asset(_)) => {
                warn!("Rejecting malformed event: {}", self);
                StatusCode::BAD_REQUEST
            }
            Self::Auth(_) | Self::Dispatch(_) => {
                error!("Unhandled exception in the application! {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        status.into_response()
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/roman", post(handle_roman))
        .route("/status", get(status))
        .route("/version", get(version))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Run the webhook HTTP server until `shutdown` resolves
pub async fn run_server(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let version = read_version(state.release_file_path.as_deref()).await;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(version = %version, "🌐 Server up and running on {}", addr);

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    Ok(())
}

/// Liveness check
async fn status() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    version: String,
}

/// Running version
async fn version(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: read_version(state.release_file_path.as_deref()).await,
    })
}

/// Middleware logging every request except liveness checks
async fn log_request(req: Request<Body>, next: Next) -> Response {
    if req.uri().path() == "/status" {
        return next.run(req).await;
    }

    let method = req.method().clone();
    let uri = req.uri().clone();
    let ip = client_ip(&req);
    let start = Instant::now();

    let response = next.run(req).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        http_method = %method,
        url = %uri,
        duration_ms,
        status_code = response.status().as_u16(),
        ip = ip.as_deref(),
        "Request to {} took {}ms with status code {}.",
        uri,
        duration_ms,
        response.status()
    );

    response
}

/// First `X-Forwarded-For` hop, else the peer address
fn client_ip(req: &Request<Body>) -> Option<String> {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Webhook called by Roman for every conversation event
async fn handle_roman(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AppError::Unauthenticated)?;

    let tenant = state
        .auth
        .resolve(token)
        .await?
        .ok_or(AppError::TenantNotFound)?;

    let event = InboundEvent::from_slice(&body).map_err(|e| {
        warn!("Failed to parse Roman event: {}", e);
        AppError::MalformedEvent(e)
    })?;

    let ctx = HandlerContext {
        is_user_admin: tenant.is_admin(&event.user_id),
        app_key: tenant.app_key,
    };

    let reply = state.dispatcher.dispatch(event, &ctx).await?;

    Ok(match reply {
        Some(message) => Json(message).into_response(),
        None => StatusCode::OK.into_response(),
    })
}
