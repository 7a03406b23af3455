// dietops/src/api/mod.rs
pub(crate) mod auth;
pub(crate) mod handlers;

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::tasks::TaskEngine;
use handlers::{
    delete_backup_handler, download_backup_handler, get_schedule_handler, health_handler,
    list_backups_handler, start_backup_handler, start_maintenance_handler, start_restore_handler,
    task_status_handler, update_schedule_handler,
};

pub struct AppState {
    pub engine: TaskEngine,
    pub admin_token: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/admin/backups",
            post(start_backup_handler).get(list_backups_handler),
        )
        .route(
            "/api/admin/backups/{name}",
            get(download_backup_handler).delete(delete_backup_handler),
        )
        .route("/api/admin/restore", post(start_restore_handler))
        .route("/api/admin/maintenance", post(start_maintenance_handler))
        .route("/api/admin/tasks/{task_id}", get(task_status_handler))
        .route(
            "/api/admin/schedule",
            get(get_schedule_handler).put(update_schedule_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(state: Arc<AppState>, address: &str) -> Result<()> {
    let app = router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated with an error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        } else {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
