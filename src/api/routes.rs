use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::{routing::get, routing::post, Router};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::api::handlers;
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(vec![axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT]);

    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health))
        .route("/registrar", get(handlers::registrar_form).post(handlers::registrar))
        .route("/reconocer", get(handlers::reconocer_form).post(handlers::reconocer))
        .route("/comparar", get(handlers::comparar_form).post(handlers::comparar))
        .route("/usuarios", get(handlers::usuarios))
        .route("/usuarios/eliminar/:nombre", post(handlers::eliminar))
        // Uploaded photos routinely exceed axum's 2 MB default
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .layer(cors)
        .with_state(state)
}
