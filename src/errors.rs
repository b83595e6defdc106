use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("unexpected shape for `{field}`: {message}")]
    DataShape { field: String, message: String },

    #[error("panel target `{0}` is not present")]
    MissingTarget(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DashboardError {
    pub fn transport(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn data_shape(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataShape {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
