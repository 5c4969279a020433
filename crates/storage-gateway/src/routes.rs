use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::backend::StorageAccount;
use crate::handlers;

/// Create gateway routes
pub fn gateway_routes<A: StorageAccount>() -> Router<AppState<A>> {
    Router::new()
        // Greeting / health check
        .route("/", get(handlers::root).post(handlers::root))
        .route("/health", get(handlers::root))
        // Storage writes
        .route("/enqueue-message", post(handlers::enqueue_message::<A>))
        .route("/store-entity", post(handlers::store_entity::<A>))
        .route("/upload-blob", post(handlers::upload_blob::<A>))
        .route("/upload-file", post(handlers::upload_file::<A>))
}

/// Function-style aliases (`/api/<FunctionName>`)
pub fn function_routes<A: StorageAccount>() -> Router<AppState<A>> {
    Router::new()
        .route(
            "/api/AzureFunctionRoot",
            get(handlers::root).post(handlers::root),
        )
        .route(
            "/api/ProcessQueueMessage",
            post(handlers::enqueue_message::<A>),
        )
        .route("/api/StoreTableInfo", post(handlers::store_entity::<A>))
        .route("/api/UploadBlob", post(handlers::upload_blob::<A>))
        .route("/api/UploadFile", post(handlers::upload_file::<A>))
}

/// Build the complete application router.
pub fn create_router<A: StorageAccount>(state: AppState<A>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = usize::try_from(state.config.limits.max_upload_size).unwrap_or(usize::MAX);

    Router::new()
        .merge(gateway_routes::<A>())
        .merge(function_routes::<A>())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
