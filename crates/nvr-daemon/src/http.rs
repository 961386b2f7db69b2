use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use nvr_core::state::{StateManager, View};
use nvr_core::timestamp::DayKey;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::source::AnySource;

type Manager = StateManager<AnySource>;

#[derive(Clone)]
struct HttpState {
    manager: Manager,
}

#[derive(Deserialize)]
struct SelectRecording {
    url: String,
}

pub fn router(manager: Manager) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/day/:day", post(select_day))
        .route("/api/today", post(today))
        .route("/api/next", post(next_day))
        .route("/api/prev", post(prev_day))
        .route("/api/select", post(select_recording))
        .layer(CorsLayer::permissive())
        .with_state(HttpState { manager })
}

pub fn start_server(
    bind_address: String,
    port: u16,
    manager: Manager,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(manager);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

/// Crawls `day` in the background and answers with the view as it is now.
async fn accepted(state: &HttpState, day: DayKey) -> (StatusCode, Json<View>) {
    let manager = state.manager.clone();
    tokio::spawn(async move { manager.ensure(day).await });
    (StatusCode::ACCEPTED, Json(state.manager.view().await))
}

async fn get_state(State(state): State<HttpState>) -> Json<View> {
    Json(state.manager.view().await)
}

async fn select_day(
    State(state): State<HttpState>,
    Path(day): Path<String>,
) -> Result<(StatusCode, Json<View>), (StatusCode, String)> {
    let day: DayKey = day.parse().map_err(|e| {
        warn!("HTTP API: bad day '{}': {}", day, e);
        (StatusCode::BAD_REQUEST, format!("invalid day '{}': {}", day, e))
    })?;
    info!("HTTP API: Select day {}", day);
    let day = state.manager.set_day(Some(day)).await;
    Ok(accepted(&state, day).await)
}

async fn today(State(state): State<HttpState>) -> (StatusCode, Json<View>) {
    info!("HTTP API: Today");
    let day = state.manager.set_day(None).await;
    accepted(&state, day).await
}

async fn next_day(State(state): State<HttpState>) -> (StatusCode, Json<View>) {
    info!("HTTP API: Next day");
    let day = state.manager.step_day(1).await;
    accepted(&state, day).await
}

async fn prev_day(State(state): State<HttpState>) -> (StatusCode, Json<View>) {
    info!("HTTP API: Previous day");
    let day = state.manager.step_day(-1).await;
    accepted(&state, day).await
}

async fn select_recording(
    State(state): State<HttpState>,
    Json(body): Json<SelectRecording>,
) -> Json<View> {
    info!("HTTP API: Select recording {}", body.url);
    state.manager.select_recording(body.url).await;
    Json(state.manager.view().await)
}
