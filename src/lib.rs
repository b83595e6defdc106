pub mod aggregator;
pub mod app;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod handlers;
pub mod models;
pub mod render;
pub mod state;
pub mod stats;
pub mod ui;
pub mod validator;

pub use aggregator::Aggregator;
pub use app::router;
pub use config::{load_settings, resolve_config_path, Settings};
pub use state::AppState;
