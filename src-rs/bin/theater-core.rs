use std::sync::Arc;

use theater_core_rs::api::ApiServer;
use theater_core_rs::config::AppConfig;
use theater_core_rs::runtime::Runtime;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    let runtime = match Runtime::build(config) {
        Ok(runtime) => Arc::new(runtime),
        Err(err) => {
            error!(error = %err, "could not open storage");
            std::process::exit(1);
        }
    };

    let server = ApiServer::new(runtime);
    if let Err(err) = server.start().await {
        error!(error = %err, "server error");
    }
}
