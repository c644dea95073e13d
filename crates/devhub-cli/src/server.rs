//! Local status listener.
//!
//! Read-only JSON view of the supervisor, served with axum until the
//! cancellation token fires.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use devhub_runtime::{ProcessSupervisor, ShutdownCoordinator};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Clone)]
struct AppState {
    supervisor: Arc<ProcessSupervisor>,
    coordinator: Arc<ShutdownCoordinator>,
}

/// Routes of the status listener.
pub fn router(supervisor: Arc<ProcessSupervisor>, coordinator: Arc<ShutdownCoordinator>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/processes", get(list_processes))
        .route("/processes/:id", get(get_process))
        .with_state(AppState {
            supervisor,
            coordinator,
        })
}

/// Serve on a pre-bound listener until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    supervisor: Arc<ProcessSupervisor>,
    coordinator: Arc<ShutdownCoordinator>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("Status listener on http://{addr}");

    axum::serve(listener, router(supervisor, coordinator))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("Status listener shut down");
    Ok(())
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "draining": state.coordinator.is_draining(),
        "mode": state.coordinator.mode().to_string(),
    }))
}

async fn list_processes(State(state): State<AppState>) -> impl IntoResponse {
    debug!("GET /processes");
    Json(state.supervisor.list().await)
}

async fn get_process(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.supervisor.status(&id).await {
        Some(snapshot) => Json(snapshot).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no process '{id}'") })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use devhub_core::CommandSpec;
    use tower::ServiceExt;

    use super::*;

    fn app() -> (Arc<ProcessSupervisor>, Router) {
        let supervisor = Arc::new(ProcessSupervisor::default());
        let router = router(
            Arc::clone(&supervisor),
            Arc::new(ShutdownCoordinator::default()),
        );
        (supervisor, router)
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_not_draining() {
        let (_, router) = app();
        let (status, body) = get_json(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["draining"], false);
        assert_eq!(body["mode"], "terminate");
    }

    #[tokio::test]
    async fn test_unknown_process_is_404() {
        let (_, router) = app();
        let (status, body) = get_json(router, "/processes/ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("ghost"));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_processes_lists_snapshots() {
        let (supervisor, router) = app();
        supervisor
            .start("job", "Job", CommandSpec::new("true"), None)
            .await
            .unwrap()
            .wait_for_exit()
            .await;

        let (status, body) = get_json(router, "/processes").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], "job");
        assert_eq!(body[0]["status"], "stopped");
        assert_eq!(body[0]["exit_code"], 0);
    }
}
