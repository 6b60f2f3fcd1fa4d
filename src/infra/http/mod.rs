mod handlers;
mod middleware;

pub use handlers::base_url_from_request;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::convert::ConvertService;
use crate::application::error::ErrorReport;
use crate::infra::db::PostgresRepositories;
use crate::infra::storage::FsBlobStorage;

#[derive(Clone)]
pub struct RouterState {
    pub convert: Arc<ConvertService>,
    pub storage: Arc<FsBlobStorage>,
    /// Absent only in router tests that run without a database.
    pub db: Option<Arc<PostgresRepositories>>,
}

pub fn build_router(state: RouterState) -> Router {
    Router::new()
        .route("/converter", get(handlers::convert))
        .route("/healthcheck", get(handlers::healthcheck))
        .route("/download/{key}/{file}", get(handlers::download))
        .route("/internal/changes/{doc_id}", post(handlers::convert_from_changes))
        .route("/_health/db", get(handlers::db_health))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .with_state(state)
}

fn db_health_response(result: Result<(), sqlx::Error>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error("infra::http::db_health", &err).attach(&mut response);
            response
        }
    }
}
