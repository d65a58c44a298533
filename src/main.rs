use log::info;
use tokio::net::TcpListener;

use crate::api::AppState;
use crate::config::Config;

mod api;
mod config;
mod error;
mod logger;
mod quality;
mod relay;
mod track;
mod upstream;

#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    logger::init(config.log_level)?;

    let bind_address = config.bind_address();
    info!("iRetro server starting on {}", bind_address);
    info!("Upstream catalog: {}", config.upstream_base_url);
    info!("API endpoints:");
    info!("   GET /api/search?q=<query>");
    info!("   GET /api/stream/<id>");
    info!("   GET /api/health");

    let app = api::create_router(AppState::new(config));
    let listener = TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
