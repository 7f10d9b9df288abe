use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;

pub use handlers::AppState;

pub fn create_app(state: AppState) -> Router {
    // Multipart overhead on top of the raw file cap.
    let body_limit = state.config.max_file_size_bytes() as usize + 1024 * 1024;

    let api = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/salt", get(handlers::auth::salt))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/verify", get(handlers::auth::verify))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/files/upload", post(handlers::files::upload))
        .route("/files", get(handlers::files::list))
        .route(
            "/files/:id",
            get(handlers::files::metadata).delete(handlers::files::delete),
        )
        .route("/files/:id/download", get(handlers::files::download))
        .route(
            "/files/:id/permanent",
            delete(handlers::files::delete_permanent),
        )
        .route("/user/profile", get(handlers::user::profile))
        .route("/user/storage", get(handlers::user::storage))
        .route("/user/password", patch(handlers::user::change_password));

    Router::new()
        .nest("/api/v1", api)
        .route("/health/live", get(handlers::health::live))
        .route("/health/ready", get(handlers::health::ready))
        .route("/storage/*path", get(handlers::files::serve_signed))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
