// SPDX-License-Identifier: MIT

//! The Panel-facing HTTP control surface: out of core scope per spec.md §1,
//! but without it `wings-daemon` has no way for the Panel to ever reach a
//! server it manages. Kept deliberately thin — every handler is a couple of
//! lines delegating straight into `wings-engine`/`wings-activity` — mirroring
//! how little the teacher's own listener handlers do beyond dispatch
//! (`daemon::listener::commands`).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use wings_adapters::ContainerAdapter;
use wings_core::{PowerAction, ServerId};
use wings_engine::{RemoveOptions, ServerManager};

use crate::error::DaemonError;

#[derive(Clone)]
struct AppState {
    manager: Arc<ServerManager>,
    adapter: Arc<dyn ContainerAdapter>,
    bearer: Arc<str>,
}

pub async fn serve(
    addr: SocketAddr,
    manager: Arc<ServerManager>,
    adapter: Arc<dyn ContainerAdapter>,
    bearer: String,
    cancel: CancellationToken,
) -> Result<(), DaemonError> {
    let state = AppState { manager, adapter, bearer: Arc::from(bearer) };
    let app = Router::new()
        .route("/api/system", get(system_info))
        .route("/api/servers", post(create_server))
        .route("/api/servers/:id", get(get_server).delete(delete_server))
        .route("/api/servers/:id/power", post(power_action))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer))
        .with_state(state);

    let listener = TcpListener::bind(addr).await.map_err(DaemonError::Http)?;
    info!(%addr, "control http listener bound");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(DaemonError::Http)
}

async fn require_bearer(State(state): State<AppState>, headers: HeaderMap, request: axum::extract::Request, next: Next) -> Response {
    let expected = format!("Bearer {}", state.bearer);
    match headers.get(axum::http::header::AUTHORIZATION) {
        Some(value) if value.as_bytes() == expected.as_bytes() => next.run(request).await,
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

#[derive(Serialize)]
struct SystemInfo {
    version: &'static str,
}

async fn system_info() -> Json<SystemInfo> {
    Json(SystemInfo { version: env!("CARGO_PKG_VERSION") })
}

#[derive(Serialize)]
struct ServerStatus {
    id: ServerId,
    state: wings_core::PowerState,
    suspended: bool,
    installing: bool,
    transferring: bool,
}

async fn get_server(State(state): State<AppState>, Path(id): Path<ServerId>) -> Result<Json<ServerStatus>, StatusCode> {
    let server = state.manager.get(id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(ServerStatus {
        id,
        state: server.state(),
        suspended: server.is_suspended(),
        installing: server.installing(),
        transferring: server.transferring(),
    }))
}

#[derive(Deserialize)]
struct CreateServerRequest {
    id: ServerId,
    #[serde(default)]
    install: bool,
}

async fn create_server(State(state): State<AppState>, Json(request): Json<CreateServerRequest>) -> Result<StatusCode, StatusCode> {
    state
        .manager
        .add(request.id, request.install)
        .await
        .map(|_| StatusCode::CREATED)
        .map_err(engine_status)
}

#[derive(Deserialize)]
struct DeleteServerQuery {
    #[serde(default)]
    delete_files: bool,
}

async fn delete_server(
    State(state): State<AppState>,
    Path(id): Path<ServerId>,
    Query(query): Query<DeleteServerQuery>,
) -> Result<StatusCode, StatusCode> {
    state
        .manager
        .remove(id, RemoveOptions { delete_files: query.delete_files })
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(engine_status)
}

#[derive(Deserialize)]
struct PowerRequest {
    action: PowerAction,
}

async fn power_action(
    State(state): State<AppState>,
    Path(id): Path<ServerId>,
    Json(request): Json<PowerRequest>,
) -> Result<StatusCode, StatusCode> {
    let server = state.manager.get(id).ok_or(StatusCode::NOT_FOUND)?;
    server
        .handle_power_action(Arc::clone(&state.adapter), request.action, None)
        .await
        .map(|_| StatusCode::ACCEPTED)
        .map_err(engine_status)
}

fn engine_status(err: wings_engine::EngineError) -> StatusCode {
    use wings_engine::EngineError;
    match err {
        EngineError::NotFound => StatusCode::NOT_FOUND,
        EngineError::Suspended => StatusCode::FORBIDDEN,
        EngineError::Locked => StatusCode::CONFLICT,
        _ => StatusCode::BAD_GATEWAY,
    }
}
