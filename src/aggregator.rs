use crate::config::{EndpointSpec, Settings};
use crate::errors::DashboardError;
use crate::fetch::{SummaryClient, fetch_all};
use crate::models::DashboardView;
use crate::render::{ChartHandle, PanelRegistry, Surface, render_snapshot};
use crate::stats::build_snapshot_at;
use chrono::{Local, NaiveDate};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info};

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load dashboard data. Please try again.";

/// Fetch, derive and render for one dashboard.
///
/// Owns the panel registry; a refresh only touches it after every mandatory
/// endpoint has answered.
#[derive(Debug)]
pub struct Aggregator {
    client: SummaryClient,
    endpoints: Vec<EndpointSpec>,
    registry: Mutex<PanelRegistry>,
}

impl Aggregator {
    pub fn new(client: SummaryClient, endpoints: Vec<EndpointSpec>) -> Self {
        Self {
            client,
            endpoints,
            registry: Mutex::new(PanelRegistry::new()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, DashboardError> {
        settings.validate()?;
        let timeout = Duration::from_secs(settings.timeout_secs);
        let client = SummaryClient::new(&settings.base_url, timeout)?;
        Ok(Self::new(client, settings.endpoints.clone()))
    }

    pub fn endpoints(&self) -> &[EndpointSpec] {
        &self.endpoints
    }

    pub fn client(&self) -> &SummaryClient {
        &self.client
    }

    pub fn registry(&self) -> &Mutex<PanelRegistry> {
        &self.registry
    }

    pub async fn refresh(&self, surface: Surface) -> DashboardView {
        self.refresh_at(Local::now().date_naive(), surface).await
    }

    pub async fn refresh_at(&self, today: NaiveDate, mut surface: Surface) -> DashboardView {
        let fetched = match fetch_all(&self.client, &self.endpoints).await {
            Ok(fetched) => fetched,
            Err(err) => {
                error!("dashboard refresh failed: {err}");
                surface.show_error(LOAD_FAILED_MESSAGE);
                let charts = self.registry.lock().await.handles();
                return finish(false, surface, charts, Vec::new());
            }
        };

        let snapshot = build_snapshot_at(today, &self.endpoints, &fetched);
        let mut registry = self.registry.lock().await;
        render_snapshot(&mut registry, &mut surface, &self.endpoints, &snapshot);
        info!(
            charts = registry.live_count(),
            warnings = snapshot.warnings.len(),
            "dashboard rendered"
        );
        surface.show_ok("Dashboard updated");
        finish(true, surface, registry.handles(), snapshot.warnings)
    }
}

fn finish(
    ok: bool,
    surface: Surface,
    charts: Vec<ChartHandle>,
    warnings: Vec<String>,
) -> DashboardView {
    let charts = charts
        .into_iter()
        .filter(|chart| surface.has_target(&chart.target))
        .collect();
    let (texts, status, skipped) = surface.into_parts();
    DashboardView {
        ok,
        status,
        charts,
        texts,
        skipped,
        warnings,
    }
}
