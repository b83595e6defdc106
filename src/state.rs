use crate::aggregator::Aggregator;
use crate::config::Settings;
use crate::errors::DashboardError;
use crate::validator::FieldValidator;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::debug;

const MAX_TRACKED_FIELDS: usize = 1024;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub aggregator: Arc<Aggregator>,
    pub validators: Arc<Mutex<HashMap<String, Arc<FieldValidator>>>>,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, DashboardError> {
        let aggregator = Aggregator::from_settings(&settings)?;
        Ok(Self {
            settings: Arc::new(settings),
            aggregator: Arc::new(aggregator),
            validators: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Validator for the form session identified by its CSRF token.
    pub async fn validator_for(&self, token: &str) -> Arc<FieldValidator> {
        let mut validators = self.validators.lock().await;
        if !validators.contains_key(token) && validators.len() >= MAX_TRACKED_FIELDS {
            debug!("validator table full; starting over");
            validators.clear();
        }
        Arc::clone(validators.entry(token.to_string()).or_default())
    }
}
