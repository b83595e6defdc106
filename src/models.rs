use crate::render::ChartHandle;
use chrono::{Datelike, Month, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

/// Key of one entry in a monthly series.
///
/// Plain months order before year-months; each variant orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MonthKey {
    Month(u32),
    YearMonth { year: i32, month: u32 },
}

impl MonthKey {
    pub fn month(&self) -> u32 {
        match self {
            MonthKey::Month(month) | MonthKey::YearMonth { month, .. } => *month,
        }
    }

    /// Whether this key names the calendar month of `date`.
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            MonthKey::Month(month) => *month == date.month(),
            MonthKey::YearMonth { year, month } => *year == date.year() && *month == date.month(),
        }
    }

    pub fn label(&self) -> String {
        let short = short_month_name(self.month());
        match self {
            MonthKey::Month(_) => short.to_string(),
            MonthKey::YearMonth { year, .. } => format!("{short} {year}"),
        }
    }
}

fn short_month_name(month: u32) -> &'static str {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| &m.name()[..3])
        .unwrap_or("???")
}

fn valid_month(month: u32) -> Option<u32> {
    (1..=12).contains(&month).then_some(month)
}

impl FromStr for MonthKey {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        if let Ok(month) = value.parse::<u32>() {
            return valid_month(month)
                .map(MonthKey::Month)
                .ok_or_else(|| format!("month {month} is out of range"));
        }

        if let Some((year, month)) = value.split_once('-') {
            let year = year
                .parse::<i32>()
                .map_err(|_| format!("invalid year in `{value}`"))?;
            let month = month
                .parse::<u32>()
                .ok()
                .and_then(valid_month)
                .ok_or_else(|| format!("invalid month in `{value}`"))?;
            return Ok(MonthKey::YearMonth { year, month });
        }

        value
            .parse::<Month>()
            .map(|m| MonthKey::Month(m.number_from_month()))
            .map_err(|_| format!("`{value}` is not a month"))
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthKey::Month(month) => write!(f, "{month}"),
            MonthKey::YearMonth { year, month } => write!(f, "{year:04}-{month:02}"),
        }
    }
}

/// Month -> amount, iterated chronologically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlySeries {
    entries: BTreeMap<MonthKey, f64>,
}

impl MonthlySeries {
    pub fn insert(&mut self, key: MonthKey, amount: f64) -> Option<f64> {
        self.entries.insert(key, amount)
    }

    pub fn get(&self, key: &MonthKey) -> Option<f64> {
        self.entries.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MonthKey, f64)> + '_ {
        self.entries.iter().map(|(key, amount)| (*key, *amount))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.values().sum()
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.keys().map(MonthKey::label).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.values().copied().collect()
    }
}

impl FromIterator<(MonthKey, f64)> for MonthlySeries {
    fn from_iter<T: IntoIterator<Item = (MonthKey, f64)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Label -> amount, kept in the order the upstream reported it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryBreakdown {
    entries: Vec<(String, f64)>,
}

impl CategoryBreakdown {
    /// Inserts or replaces the amount for `label`; labels stay unique.
    pub fn insert(&mut self, label: impl Into<String>, amount: f64) {
        let label = label.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == label) {
            Some(entry) => entry.1 = amount,
            None => self.entries.push((label, amount)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.entries.iter().map(|(label, amount)| (label.as_str(), *amount))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, amount)| amount).sum()
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|(label, _)| label.clone()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, amount)| *amount).collect()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for CategoryBreakdown {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        let mut breakdown = Self::default();
        for (label, amount) in iter {
            breakdown.insert(label, amount);
        }
        breakdown
    }
}

/// Income and expenses aligned on the union of their months.
///
/// A month reported by only one side counts as zero on the other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyComparison {
    months: Vec<MonthKey>,
    income: Vec<f64>,
    expenses: Vec<f64>,
}

impl MonthlyComparison {
    pub fn align(income: &MonthlySeries, expenses: &MonthlySeries) -> Self {
        let months: Vec<MonthKey> = income
            .entries
            .keys()
            .chain(expenses.entries.keys())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            income: months.iter().map(|key| income.get(key).unwrap_or(0.0)).collect(),
            expenses: months.iter().map(|key| expenses.get(key).unwrap_or(0.0)).collect(),
            months,
        }
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.months.iter().map(MonthKey::label).collect()
    }

    pub fn income(&self) -> &[f64] {
        &self.income
    }

    pub fn expenses(&self) -> &[f64] {
        &self.expenses
    }

    /// Income minus expenses per month; negative when a month overspent.
    pub fn savings(&self) -> Vec<f64> {
        self.income
            .iter()
            .zip(&self.expenses)
            .map(|(income, expense)| income - expense)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl HealthStatus {
    /// Bands on the savings rate in percent.
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 20.0 {
            HealthStatus::Excellent
        } else if rate >= 10.0 {
            HealthStatus::Good
        } else if rate >= 0.0 {
            HealthStatus::Fair
        } else {
            HealthStatus::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Excellent => "Excellent",
            HealthStatus::Good => "Good",
            HealthStatus::Fair => "Fair",
            HealthStatus::Poor => "Needs Attention",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavingsMetrics {
    pub total_income: f64,
    pub total_expenses: f64,
    pub total_savings: f64,
    pub avg_monthly_income: f64,
    pub avg_monthly_expenses: f64,
    /// Savings as a percentage of income; `None` without income.
    pub savings_rate: Option<f64>,
}

impl SavingsMetrics {
    pub fn health(&self) -> Option<HealthStatus> {
        self.savings_rate.map(HealthStatus::from_rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthAmount {
    pub key: MonthKey,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelData {
    Categories {
        breakdown: CategoryBreakdown,
        percentages: Vec<String>,
    },
    Monthly {
        series: MonthlySeries,
    },
    TopMonth {
        entry: Option<MonthAmount>,
    },
    CurrentMonth {
        entry: Option<MonthAmount>,
    },
    CategorySummary {
        total: f64,
        count: usize,
        top: Option<(String, f64)>,
        top_share: Option<String>,
    },
    MonthlySummary {
        total: f64,
        months: usize,
        average: f64,
    },
    Trend {
        comparison: MonthlyComparison,
    },
    SavingsHealth {
        metrics: SavingsMetrics,
    },
}

/// Request-scoped result of the derive phase, keyed by panel target.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub generated_for: NaiveDate,
    pub panels: BTreeMap<String, PanelData>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub message: String,
    pub retry: bool,
}

/// What one refresh cycle hands back to the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardView {
    pub ok: bool,
    pub status: Option<StatusMessage>,
    pub charts: Vec<ChartHandle>,
    pub texts: BTreeMap<String, String>,
    pub skipped: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsernameCheckRequest {
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpstreamUsernameResponse {
    #[serde(default)]
    pub username_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldState {
    pub invalid: bool,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub seq: u64,
    pub applied: bool,
    pub state: FieldState,
}
