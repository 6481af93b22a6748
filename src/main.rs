use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use tricoclinic::api::server::start_server;
use tricoclinic::api::types::ApiContext;
use tricoclinic::config::AppConfig;
use tricoclinic::db::sqlite::open_database;
use tricoclinic::uploads::UploadStore;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env();

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = open_database(&config.database_path)?;
    let uploads = UploadStore::new(config.uploads_dir.clone(), &config.base_url)?;

    tracing::info!(
        db = %config.database_path.display(),
        uploads = %config.uploads_dir.display(),
        "starting {} v{}",
        tricoclinic::config::APP_NAME,
        tricoclinic::config::APP_VERSION,
    );

    let addr = config.bind_addr;
    let ctx = ApiContext::new(conn, config, uploads);
    let mut server = start_server(ctx, addr).await?;
    tracing::info!(addr = %server.addr, "listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.shutdown();
    Ok(())
}
