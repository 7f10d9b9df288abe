use std::sync::Arc;

use encrypted_storage_server::{
    auth::JwtService,
    config::Config,
    create_app,
    database::Database,
    handlers::AppState,
    services::{
        catalog::PgFileCatalog, quota::PgQuotaLedger, users::PgUserStore, FileService,
    },
    storage::{local::LocalStore, UrlSigner},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "encrypted_storage_server=info,tower_http=info".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    let database = Database::new(&config.database_url).await?;
    database.migrate().await?;

    let signer = UrlSigner::new(&config.url_signing_secret);
    let store = Arc::new(LocalStore::new(
        &config.storage_dir,
        &config.public_base_url,
        signer.clone(),
    )?);

    let files = FileService::new(
        Arc::new(PgFileCatalog::new(database.pool().clone())),
        Arc::new(PgQuotaLedger::new(database.pool().clone())),
        store.clone(),
        config.max_file_size_mb,
        config.signed_url_ttl_secs,
        config.storage_op_timeout_secs,
    );

    let state = AppState {
        users: Arc::new(PgUserStore::new(database.pool().clone())),
        files,
        store,
        jwt: Arc::new(JwtService::new(
            &config.jwt_secret,
            config.jwt_expiration_minutes,
        )),
        signer,
        config: config.clone(),
    };

    let app = create_app(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
