use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/dashboard", get(handlers::get_dashboard))
        .route("/api/validate-username", post(handlers::validate_username))
        .with_state(state)
}
