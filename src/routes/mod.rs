use crate::models::AppState;
use axum::Router;

pub mod health_routes;
pub mod recall_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", recall_routes::router())
        .merge(health_routes::router())
        .with_state(state)
}
