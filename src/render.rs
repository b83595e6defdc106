use crate::config::{ChartKind, EndpointSpec, Palette, PanelBinding, PanelView};
use crate::errors::DashboardError;
use crate::models::{
    DashboardSnapshot, MonthAmount, MonthlyComparison, PanelData, SavingsMetrics, StatusKind,
    StatusMessage,
};
use crate::stats::{format_amount, format_percentage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

const EXPENSE_COLORS: [&str; 8] = [
    "#FF6384", "#36A2EB", "#FFCE56", "#4BC0C0", "#9966FF", "#FF9F40", "#FF63FF", "#C9CBCF",
];
const INCOME_COLORS: [&str; 8] = [
    "#4BC0C0", "#36A2EB", "#FFCE56", "#FF6384", "#9966FF", "#FF9F40", "#2F4858", "#C9CBCF",
];
const TREND_INCOME: &str = "#4BC0C0";
const TREND_EXPENSES: &str = "#FF6384";
const TREND_SAVINGS: &str = "#36A2EB";

fn palette_colors(palette: Palette, count: usize) -> Vec<String> {
    let colors = match palette {
        Palette::Expense => &EXPENSE_COLORS,
        Palette::Income => &INCOME_COLORS,
    };
    colors.iter().cycle().take(count).map(|c| c.to_string()).collect()
}

/// Everything the page needs to draw one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    #[serde(default)]
    pub percentages: Vec<String>,
    pub colors: Vec<String>,
    /// Named datasets sharing `labels`; set instead of `values` on comparison charts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub label: String,
    pub values: Vec<f64>,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartHandle {
    pub id: u64,
    pub target: String,
    pub spec: ChartSpec,
}

/// Live chart per panel target. Charts only change through destroy-then-create.
#[derive(Debug, Default)]
pub struct PanelRegistry {
    next_id: u64,
    live: HashMap<String, ChartHandle>,
    destroyed: u64,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, target: &str, spec: ChartSpec) -> &ChartHandle {
        self.destroy(target);
        self.next_id += 1;
        let handle = ChartHandle {
            id: self.next_id,
            target: target.to_string(),
            spec,
        };
        self.live.entry(target.to_string()).or_insert(handle)
    }

    pub fn destroy(&mut self, target: &str) -> Option<ChartHandle> {
        let removed = self.live.remove(target);
        if let Some(handle) = &removed {
            self.destroyed += 1;
            debug!(panel = %handle.target, id = handle.id, "destroyed chart");
        }
        removed
    }

    pub fn get(&self, target: &str) -> Option<&ChartHandle> {
        self.live.get(target)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn destroyed_count(&self) -> u64 {
        self.destroyed
    }

    /// Live handles ordered by target.
    pub fn handles(&self) -> Vec<ChartHandle> {
        let mut handles: Vec<ChartHandle> = self.live.values().cloned().collect();
        handles.sort_by(|a, b| a.target.cmp(&b.target));
        handles
    }
}

/// The targets, text slots and status region of one view.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    targets: BTreeSet<String>,
    texts: BTreeMap<String, String>,
    status: Option<StatusMessage>,
    skipped: Vec<String>,
}

impl Surface {
    pub fn with_targets<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn has_target(&self, target: &str) -> bool {
        self.targets.contains(target)
    }

    pub fn require(&self, target: &str) -> Result<(), DashboardError> {
        if self.has_target(target) {
            Ok(())
        } else {
            Err(DashboardError::MissingTarget(target.to_string()))
        }
    }

    pub fn set_text(&mut self, slot: impl Into<String>, text: impl Into<String>) {
        self.texts.insert(slot.into(), text.into());
    }

    pub fn texts(&self) -> &BTreeMap<String, String> {
        &self.texts
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn show_error(&mut self, message: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind: StatusKind::Error,
            message: message.into(),
            retry: true,
        });
    }

    pub fn show_ok(&mut self, message: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind: StatusKind::Ok,
            message: message.into(),
            retry: false,
        });
    }

    pub fn into_parts(self) -> (BTreeMap<String, String>, Option<StatusMessage>, Vec<String>) {
        (self.texts, self.status, self.skipped)
    }
}

/// Draws every configured panel whose target is on the surface.
///
/// Panels without derived data (a data-shape problem upstream) keep whatever
/// the registry already holds for them.
pub fn render_snapshot(
    registry: &mut PanelRegistry,
    surface: &mut Surface,
    endpoints: &[EndpointSpec],
    snapshot: &DashboardSnapshot,
) {
    for binding in endpoints.iter().flat_map(|endpoint| endpoint.panels.iter()) {
        if let Err(err) = surface.require(&binding.target) {
            debug!("{err}; skipping panel");
            surface.skipped.push(binding.target.clone());
            continue;
        }

        match snapshot.panels.get(&binding.target) {
            Some(data) => render_panel(registry, surface, binding, data),
            None => debug!(panel = %binding.target, "no data derived; keeping previous render"),
        }
    }
}

fn render_panel(
    registry: &mut PanelRegistry,
    surface: &mut Surface,
    binding: &PanelBinding,
    data: &PanelData,
) {
    let target = binding.target.as_str();
    match (&binding.view, data) {
        (
            PanelView::Categories { chart, palette },
            PanelData::Categories {
                breakdown,
                percentages,
            },
        ) => {
            let spec = ChartSpec {
                kind: *chart,
                title: binding.title.clone(),
                labels: breakdown.labels(),
                values: breakdown.values(),
                percentages: percentages.clone(),
                colors: palette_colors(*palette, breakdown.len()),
                series: Vec::new(),
            };
            registry.replace(target, spec);
        }
        (PanelView::Monthly { chart, palette }, PanelData::Monthly { series }) => {
            let spec = ChartSpec {
                kind: *chart,
                title: binding.title.clone(),
                labels: series.labels(),
                values: series.values(),
                percentages: Vec::new(),
                colors: palette_colors(*palette, 1),
                series: Vec::new(),
            };
            registry.replace(target, spec);
        }
        (PanelView::TopMonth, PanelData::TopMonth { entry })
        | (PanelView::CurrentMonth, PanelData::CurrentMonth { entry }) => {
            write_month(surface, target, entry.as_ref());
        }
        (
            PanelView::CategorySummary,
            PanelData::CategorySummary {
                total,
                count,
                top,
                top_share,
            },
        ) => {
            surface.set_text(target, format_amount(*total));
            surface.set_text(format!("{target}-count"), count.to_string());
            match top {
                Some((label, amount)) => {
                    surface.set_text(format!("{target}-top"), label.clone());
                    surface.set_text(format!("{target}-top-value"), format_amount(*amount));
                }
                None => {
                    surface.set_text(format!("{target}-top"), "--");
                    surface.set_text(format!("{target}-top-value"), "--");
                }
            }
            surface.set_text(
                format!("{target}-top-share"),
                top_share.clone().unwrap_or_else(|| "--".to_string()),
            );
        }
        (
            PanelView::MonthlySummary,
            PanelData::MonthlySummary {
                total,
                months,
                average,
            },
        ) => {
            surface.set_text(target, format_amount(*average));
            surface.set_text(format!("{target}-total"), format_amount(*total));
            surface.set_text(format!("{target}-months"), months.to_string());
        }
        (PanelView::IncomeVsExpenses { .. }, PanelData::Trend { comparison }) => {
            registry.replace(target, comparison_spec(&binding.title, comparison));
        }
        (PanelView::NetSavings { .. }, PanelData::Trend { comparison }) => {
            registry.replace(target, savings_spec(&binding.title, comparison));
        }
        (PanelView::SavingsHealth { .. }, PanelData::SavingsHealth { metrics }) => {
            write_health(surface, target, metrics);
        }
        (view, _) => warn!(panel = %target, ?view, "derived data does not match the panel view"),
    }
}

fn comparison_spec(title: &str, comparison: &MonthlyComparison) -> ChartSpec {
    let series = if comparison.is_empty() {
        Vec::new()
    } else {
        vec![
            ChartSeries {
                label: "Income".to_string(),
                values: comparison.income().to_vec(),
                color: TREND_INCOME.to_string(),
            },
            ChartSeries {
                label: "Expenses".to_string(),
                values: comparison.expenses().to_vec(),
                color: TREND_EXPENSES.to_string(),
            },
        ]
    };
    ChartSpec {
        kind: ChartKind::Line,
        title: title.to_string(),
        labels: comparison.labels(),
        values: Vec::new(),
        percentages: Vec::new(),
        colors: vec![TREND_INCOME.to_string(), TREND_EXPENSES.to_string()],
        series,
    }
}

/// One bar per month, coloured by the sign of the savings.
fn savings_spec(title: &str, comparison: &MonthlyComparison) -> ChartSpec {
    let values = comparison.savings();
    let colors = values
        .iter()
        .map(|value| {
            if *value >= 0.0 {
                TREND_SAVINGS.to_string()
            } else {
                TREND_EXPENSES.to_string()
            }
        })
        .collect();
    ChartSpec {
        kind: ChartKind::Bar,
        title: title.to_string(),
        labels: comparison.labels(),
        values,
        percentages: Vec::new(),
        colors,
        series: Vec::new(),
    }
}

fn write_health(surface: &mut Surface, target: &str, metrics: &SavingsMetrics) {
    let health = metrics.health().map_or("--", |status| status.label());
    surface.set_text(target, health);
    surface.set_text(
        format!("{target}-rate"),
        metrics
            .savings_rate
            .map_or_else(|| "--".to_string(), |rate| format_percentage(rate / 100.0)),
    );
    surface.set_text(format!("{target}-income"), format_amount(metrics.total_income));
    surface.set_text(format!("{target}-expenses"), format_amount(metrics.total_expenses));
    surface.set_text(format!("{target}-savings"), format_amount(metrics.total_savings));
    surface.set_text(
        format!("{target}-avg-income"),
        format_amount(metrics.avg_monthly_income),
    );
    surface.set_text(
        format!("{target}-avg-expenses"),
        format_amount(metrics.avg_monthly_expenses),
    );
}

fn write_month(surface: &mut Surface, target: &str, entry: Option<&MonthAmount>) {
    match entry {
        Some(entry) => {
            surface.set_text(target, entry.key.label());
            surface.set_text(format!("{target}-value"), format_amount(entry.amount));
        }
        None => {
            surface.set_text(target, "--");
            surface.set_text(format!("{target}-value"), "--");
        }
    }
}
