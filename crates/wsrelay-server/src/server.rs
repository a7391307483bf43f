//! HTTP server: WebSocket upgrades and the health report

use std::net::SocketAddr;

use axum::{
    extract::{ws::rejection::WebSocketUpgradeRejection, State, WebSocketUpgrade},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use wsrelay_config::Config;
use wsrelay_hub::{BridgeStatus, Hub, HubHandle, UpstreamBridge};
use wsrelay_observability::{HealthCheckResult, HealthResponse, HealthStatus};

use crate::state::AppState;
use crate::websocket::{AxumConnection, TungsteniteDialer};

const APP_NAME: &str = "wsrelay";

/// Start the hub and the upstream bridge, returning the hub's handle
///
/// The two tasks keep each other alive and run for the life of the process.
pub fn spawn_core(config: &Config) -> HubHandle {
    let (hub, handle) = Hub::new(&config.hub);
    tokio::spawn(hub.run());

    let dialer = TungsteniteDialer::new(config.upstream.url.clone());
    let bridge = UpstreamBridge::new(dialer, handle.clone(), config.upstream.retry_delay());
    tokio::spawn(bridge.run());

    info!(url = %config.upstream.url, "Upstream bridge started");
    handle
}

/// Run the relay until the process is killed
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .server
        .bind_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    let state = AppState::new(spawn_core(&config));
    let app = create_router(state, &config.server.ws_path);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "wsrelay listening on http://{}{}",
        listener.local_addr()?,
        config.server.ws_path
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router
pub fn create_router(state: AppState, ws_path: &str) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(ws_path, get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn websocket_handler(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!("Rejected WebSocket upgrade: {}", rejection);
            return rejection.into_response();
        }
    };

    ws.on_failed_upgrade(|e| warn!("WebSocket upgrade failed: {}", e))
        .on_upgrade(move |socket| async move {
            state.hub.attach(AxumConnection::new(socket));
        })
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.hub.stats();
    let upstream = state.hub.upstream_status();

    let hub_check = HealthCheckResult::new("hub", HealthStatus::Healthy).with_metadata(json!({
        "clients": stats.clients,
        "slow_client_drops": stats.slow_client_drops,
    }));
    let upstream_status = match upstream {
        BridgeStatus::Connected => HealthStatus::Healthy,
        BridgeStatus::Connecting | BridgeStatus::Disconnected => HealthStatus::Degraded,
    };
    let upstream_check =
        HealthCheckResult::new("upstream", upstream_status).with_message(upstream.to_string());

    let report = HealthResponse::from_checks(
        APP_NAME,
        env!("CARGO_PKG_VERSION"),
        state.started_at,
        vec![hub_check, upstream_check],
    );
    (report.status.to_status_code(), Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use wsrelay_config::HubConfig;

    fn test_state() -> AppState {
        let (hub, handle) = Hub::new(&HubConfig::default());
        tokio::spawn(hub.run());
        AppState::new(handle)
    }

    #[tokio::test]
    async fn test_health_reports_degraded_without_upstream() {
        let app = create_router(test_state(), "/ws");

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let report: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(report["status"], "degraded");
        assert_eq!(report["app_name"], "wsrelay");
        assert_eq!(report["checks"][0]["metadata"]["clients"], 0);
        assert_eq!(report["checks"][1]["message"], "disconnected");
    }

    #[tokio::test]
    async fn test_plain_get_on_ws_path_is_rejected() {
        let app = create_router(test_state(), "/ws");

        let response = app
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
