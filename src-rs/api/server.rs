use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::api::handlers::{
    handle_cancel, handle_close, handle_current, handle_get_api_config, handle_get_storage_config,
    handle_health, handle_history, handle_notifications, handle_outputs, handle_put_api_config,
    handle_put_storage_config, handle_start, handle_status,
};
use crate::runtime::Runtime;

pub fn router(runtime: Arc<Runtime>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/modules/:module/tasks", post(handle_start))
        .route("/modules/:module/tasks/current", get(handle_current))
        .route("/modules/:module/tasks/:id", get(handle_status))
        .route("/modules/:module/tasks/:id/close", post(handle_close))
        .route("/modules/:module/tasks/:id/cancel", post(handle_cancel))
        .route("/modules/:module/history", get(handle_history))
        .route("/modules/:module/outputs", get(handle_outputs))
        .route(
            "/modules/:module/storage-config",
            get(handle_get_storage_config).put(handle_put_storage_config),
        )
        .route("/config/api", get(handle_get_api_config).put(handle_put_api_config))
        .route("/notifications", get(handle_notifications))
        .with_state(runtime)
}

pub struct ApiServer {
    pub port: u16,
    pub runtime: Arc<Runtime>,
}

impl ApiServer {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            port: runtime.config.port,
            runtime,
        }
    }

    pub async fn start(&self) -> Result<(), String> {
        let app = router(self.runtime.clone());
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        info!(%addr, "api listening");
        axum::Server::bind(&addr)
            .serve(app.into_make_service())
            .await
            .map_err(|err| err.to_string())
    }
}
