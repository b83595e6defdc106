use crate::errors::DashboardError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{
    collections::BTreeSet,
    env,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requiredness {
    Mandatory,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Doughnut,
    Pie,
    Bar,
    HorizontalBar,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Palette {
    #[default]
    Expense,
    Income,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum PanelView {
    Categories {
        chart: ChartKind,
        #[serde(default)]
        palette: Palette,
    },
    Monthly {
        chart: ChartKind,
        #[serde(default)]
        palette: Palette,
    },
    TopMonth,
    CurrentMonth,
    CategorySummary,
    MonthlySummary,
    /// Income and expense lines over the union of their months.
    IncomeVsExpenses { income: SeriesRef },
    /// Income minus expenses per month; the only signed chart.
    NetSavings { income: SeriesRef },
    /// Savings rate, health label and twelve-month totals as text.
    SavingsHealth { income: SeriesRef },
}

/// A monthly series read from another endpoint's response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRef {
    pub endpoint: String,
    pub field: String,
}

impl PanelView {
    /// The other endpoint this view reads from, if any.
    pub fn series_ref(&self) -> Option<&SeriesRef> {
        match self {
            PanelView::IncomeVsExpenses { income }
            | PanelView::NetSavings { income }
            | PanelView::SavingsHealth { income } => Some(income),
            _ => None,
        }
    }
}

/// One panel fed by an endpoint: where it draws, which field it reads.
///
/// Comparison views read `field` as the expense side and take the income
/// side from their [`SeriesRef`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelBinding {
    pub target: String,
    /// Dotted path into the response body, e.g. `this_year_expenses_data.months`.
    pub field: String,
    #[serde(default)]
    pub title: String,
    pub view: PanelView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub name: String,
    pub path: String,
    pub required: Requiredness,
    /// Body substituted when an optional endpoint fails.
    #[serde(default)]
    pub fallback: Value,
    #[serde(default)]
    pub panels: Vec<PanelBinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub port: u16,
    pub base_url: String,
    pub timeout_secs: u64,
    pub validation_path: String,
    pub csrf_header: String,
    pub endpoints: Vec<EndpointSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8080,
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 10,
            validation_path: "/authentication/validate-username/".to_string(),
            csrf_header: "X-CSRFToken".to_string(),
            endpoints: default_endpoints(),
        }
    }
}

fn yearly_income() -> SeriesRef {
    SeriesRef {
        endpoint: "income_summary".to_string(),
        field: "this_year_income_data.months".to_string(),
    }
}

fn panel(target: &str, field: &str, title: &str, view: PanelView) -> PanelBinding {
    PanelBinding {
        target: target.to_string(),
        field: field.to_string(),
        title: title.to_string(),
        view,
    }
}

pub fn default_endpoints() -> Vec<EndpointSpec> {
    vec![
        EndpointSpec {
            name: "expense_categories".to_string(),
            path: "/expense_category_summary/".to_string(),
            required: Requiredness::Mandatory,
            fallback: Value::Null,
            panels: vec![
                panel(
                    "expense-chart",
                    "expense_category_data",
                    "Expense Summary by Category",
                    PanelView::Categories {
                        chart: ChartKind::Doughnut,
                        palette: Palette::Expense,
                    },
                ),
                panel(
                    "top-categories-chart",
                    "expense_category_data",
                    "Amount Spent",
                    PanelView::Categories {
                        chart: ChartKind::HorizontalBar,
                        palette: Palette::Expense,
                    },
                ),
                panel(
                    "expense-summary",
                    "expense_category_data",
                    "Total Expenses",
                    PanelView::CategorySummary,
                ),
            ],
        },
        EndpointSpec {
            name: "monthly_expenses".to_string(),
            path: "/monthly_expense_summary/".to_string(),
            required: Requiredness::Optional,
            fallback: json!({ "monthly_data": {} }),
            panels: vec![panel(
                "monthly-chart",
                "monthly_data",
                "Monthly Expenses",
                PanelView::Monthly {
                    chart: ChartKind::Bar,
                    palette: Palette::Expense,
                },
            )],
        },
        EndpointSpec {
            name: "expense_summary".to_string(),
            path: "/expense_summary_rest/".to_string(),
            required: Requiredness::Mandatory,
            fallback: Value::Null,
            panels: vec![
                panel(
                    "expense-trend-chart",
                    "this_year_expenses_data.months",
                    "Expenses this year",
                    PanelView::Monthly {
                        chart: ChartKind::Line,
                        palette: Palette::Expense,
                    },
                ),
                panel(
                    "expense-top-month",
                    "this_year_expenses_data.months",
                    "Top month",
                    PanelView::TopMonth,
                ),
                panel(
                    "expense-this-month",
                    "this_year_expenses_data.months",
                    "This month",
                    PanelView::CurrentMonth,
                ),
                panel(
                    "expense-average",
                    "this_year_expenses_data.months",
                    "Monthly Average",
                    PanelView::MonthlySummary,
                ),
                panel(
                    "trend-comparison-chart",
                    "this_year_expenses_data.months",
                    "Income vs Expenses",
                    PanelView::IncomeVsExpenses {
                        income: yearly_income(),
                    },
                ),
                panel(
                    "savings-chart",
                    "this_year_expenses_data.months",
                    "Monthly Net Savings",
                    PanelView::NetSavings {
                        income: yearly_income(),
                    },
                ),
                panel(
                    "savings-health",
                    "this_year_expenses_data.months",
                    "Financial Health",
                    PanelView::SavingsHealth {
                        income: yearly_income(),
                    },
                ),
            ],
        },
        EndpointSpec {
            name: "income_sources".to_string(),
            path: "/income/income_sources_data/".to_string(),
            required: Requiredness::Optional,
            fallback: json!({ "income_sources_data": {} }),
            panels: vec![panel(
                "income-chart",
                "income_sources_data",
                "Income Summary by Source",
                PanelView::Categories {
                    chart: ChartKind::Pie,
                    palette: Palette::Income,
                },
            )],
        },
        EndpointSpec {
            name: "income_summary".to_string(),
            path: "/income/income_summary_rest/".to_string(),
            required: Requiredness::Optional,
            fallback: json!({ "this_year_income_data": { "months": {} } }),
            panels: vec![
                panel(
                    "income-top-month",
                    "this_year_income_data.months",
                    "Top month",
                    PanelView::TopMonth,
                ),
                panel(
                    "income-this-month",
                    "this_year_income_data.months",
                    "This month",
                    PanelView::CurrentMonth,
                ),
            ],
        },
    ]
}

impl Settings {
    /// Every panel target the configuration knows about, in declaration order.
    pub fn targets(&self) -> Vec<String> {
        self.endpoints
            .iter()
            .flat_map(|endpoint| endpoint.panels.iter().map(|panel| panel.target.clone()))
            .collect()
    }

    pub fn validate(&self) -> Result<(), DashboardError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(DashboardError::Config(format!(
                "base_url must be an http(s) URL, got `{}`",
                self.base_url
            )));
        }

        let mut names = BTreeSet::new();
        let mut targets = BTreeSet::new();
        for endpoint in &self.endpoints {
            if !names.insert(endpoint.name.as_str()) {
                return Err(DashboardError::Config(format!(
                    "endpoint `{}` is declared twice",
                    endpoint.name
                )));
            }
            if endpoint.required == Requiredness::Optional && endpoint.fallback.is_null() {
                return Err(DashboardError::Config(format!(
                    "optional endpoint `{}` needs a fallback body",
                    endpoint.name
                )));
            }
            for panel in &endpoint.panels {
                if !targets.insert(panel.target.as_str()) {
                    return Err(DashboardError::Config(format!(
                        "panel target `{}` is bound twice",
                        panel.target
                    )));
                }
            }
        }

        for panel in self.endpoints.iter().flat_map(|endpoint| endpoint.panels.iter()) {
            if let Some(source) = panel.view.series_ref() {
                if !names.contains(source.endpoint.as_str()) {
                    return Err(DashboardError::Config(format!(
                        "panel `{}` reads from unknown endpoint `{}`",
                        panel.target, source.endpoint
                    )));
                }
            }
        }

        Ok(())
    }

    /// Applies `PORT`, `SUMMARY_BASE_URL` and `SUMMARY_TIMEOUT_SECS` from `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(port) = lookup("PORT").and_then(|value| value.parse::<u16>().ok()) {
            self.port = port;
        }
        if let Some(base_url) = lookup("SUMMARY_BASE_URL").filter(|value| !value.trim().is_empty())
        {
            self.base_url = base_url.trim().to_string();
        }
        if let Some(timeout) = lookup("SUMMARY_TIMEOUT_SECS").and_then(|value| value.parse().ok()) {
            self.timeout_secs = timeout;
        }
        self
    }
}

pub fn resolve_config_path() -> Option<PathBuf> {
    env::var("DASHBOARD_CONFIG_PATH").ok().map(PathBuf::from)
}

pub async fn load_settings(path: Option<&Path>) -> Settings {
    let Some(path) = path else {
        return Settings::default();
    };

    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(settings) => {
                info!("loaded dashboard settings from {}", path.display());
                settings
            }
            Err(err) => {
                error!("failed to parse settings file: {err}");
                Settings::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Settings::default(),
        Err(err) => {
            error!("failed to read settings file: {err}");
            Settings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert!(settings.targets().contains(&"expense-chart".to_string()));
        assert!(
            settings
                .endpoints
                .iter()
                .filter(|endpoint| endpoint.required == Requiredness::Optional)
                .all(|endpoint| !endpoint.fallback.is_null())
        );
    }

    #[test]
    fn duplicate_targets_are_rejected() {
        let mut settings = Settings::default();
        let duplicate = settings.endpoints[0].panels[0].clone();
        settings.endpoints[1].panels.push(duplicate);
        assert!(matches!(settings.validate(), Err(DashboardError::Config(_))));
    }

    #[test]
    fn optional_endpoint_without_fallback_is_rejected() {
        let mut settings = Settings::default();
        let income = settings
            .endpoints
            .iter_mut()
            .find(|endpoint| endpoint.name == "income_summary")
            .unwrap();
        income.fallback = Value::Null;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("income_summary"));

        let parsed: EndpointSpec = serde_json::from_value(json!({
            "name": "extra",
            "path": "/extra/",
            "required": "optional",
        }))
        .unwrap();
        let mut settings = Settings::default();
        settings.endpoints.push(parsed);
        assert!(matches!(settings.validate(), Err(DashboardError::Config(_))));
    }

    #[test]
    fn comparison_panels_must_name_a_declared_endpoint() {
        let mut settings = Settings::default();
        settings.endpoints.retain(|endpoint| endpoint.name != "income_summary");
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("unknown endpoint `income_summary`"));
    }

    #[test]
    fn overrides_replace_port_and_base_url() {
        let settings = Settings::default().with_overrides(|key| match key {
            "PORT" => Some("9191".to_string()),
            "SUMMARY_BASE_URL" => Some(" http://upstream:9000 ".to_string()),
            "SUMMARY_TIMEOUT_SECS" => Some("not-a-number".to_string()),
            _ => None,
        });
        assert_eq!(settings.port, 9191);
        assert_eq!(settings.base_url, "http://upstream:9000");
        assert_eq!(settings.timeout_secs, 10);
    }

    #[test]
    fn partial_settings_file_falls_back_to_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "base_url": "http://finance.local" }"#).unwrap();
        assert_eq!(settings.base_url, "http://finance.local");
        assert_eq!(settings.endpoints, default_endpoints());
    }

    #[tokio::test]
    async fn missing_settings_file_yields_defaults() {
        let mut path = std::env::temp_dir();
        path.push(format!("expense_dashboard_missing_{}.json", std::process::id()));
        let settings = load_settings(Some(&path)).await;
        assert_eq!(settings, Settings::default());
    }
}
