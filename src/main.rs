use anyhow::Result;
use axum::Router;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
mod storage;

use services::{
    auth::SqliteAuthResolver,
    metadata_store::SqliteFileRepository,
    settings::{OSS_SETTING, SqliteSettings},
    upload_service::UploadService,
};
use state::AppState;
use storage::local::LocalDiskBackend;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting media-upload with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db = db::connect(&cfg.database_url).await?;

    // --- Handle migration mode ---
    if migrate {
        db::run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }
    db::run_migrations(&db).await?;

    let settings = SqliteSettings::new(db.clone());
    if let Some(value) = cfg.oss_setting.as_deref() {
        settings.put(OSS_SETTING, value).await?;
        tracing::info!("Stored {} from configuration", OSS_SETTING);
    }

    // --- Wire the upload pipeline ---
    let local = LocalDiskBackend::new(&cfg.storage_dir, cfg.public_base_url.clone());
    let files = SqliteFileRepository::new(db.clone());
    let uploads = UploadService::new(
        Arc::new(SqliteAuthResolver::new(db.clone())),
        Arc::new(settings),
        Arc::new(local.clone()),
        Arc::new(files.clone()),
    );
    let state = AppState {
        uploads,
        files,
        local,
        db,
    };

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
