use crate::errors::AppError;
use crate::models::{DashboardView, UsernameCheckRequest, ValidationResponse};
use crate::render::Surface;
use crate::state::AppState;
use crate::ui::render_index;
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Html,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    /// Comma separated panel targets present on the page.
    pub targets: Option<String>,
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state.settings))
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> (StatusCode, Json<DashboardView>) {
    let targets = match query.targets {
        Some(list) => parse_targets(&list),
        None => state.settings.targets(),
    };

    let view = state.aggregator.refresh(Surface::with_targets(targets)).await;
    let status = if view.ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(view))
}

pub async fn validate_username(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UsernameCheckRequest>,
) -> Result<Json<ValidationResponse>, AppError> {
    let settings = &state.settings;
    let token = headers
        .get(settings.csrf_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::forbidden("missing CSRF token"))?
        .to_string();

    let validator = state.validator_for(&token).await;
    let client = state.aggregator.client().clone();
    let path = settings.validation_path.clone();
    let header = settings.csrf_header.clone();

    let response = validator
        .on_input(&payload.username, |username| async move {
            client.check_username(&path, &header, &token, &username).await
        })
        .await;

    Ok(Json(response))
}

fn parse_targets(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .map(str::to_string)
        .collect()
}
