use crate::config::{EndpointSpec, PanelBinding, PanelView, SeriesRef};
use crate::errors::DashboardError;
use crate::fetch::Fetched;
use crate::models::{
    CategoryBreakdown, DashboardSnapshot, MonthAmount, MonthKey, MonthlyComparison, MonthlySeries,
    PanelData, SavingsMetrics,
};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

pub fn build_snapshot_at(
    today: NaiveDate,
    endpoints: &[EndpointSpec],
    fetched: &[Fetched],
) -> DashboardSnapshot {
    let mut panels = BTreeMap::new();
    let mut warnings = Vec::new();

    for endpoint in endpoints {
        let Some(response) = fetched.iter().find(|item| item.name == endpoint.name) else {
            warnings.push(format!("no response collected for `{}`", endpoint.name));
            continue;
        };

        for binding in &endpoint.panels {
            match derive_panel(today, binding, &response.body, fetched, &mut warnings) {
                Ok(data) => {
                    panels.insert(binding.target.clone(), data);
                }
                Err(err) => warnings.push(format!("{}: {err}", binding.target)),
            }
        }
    }

    for message in &warnings {
        warn!("{message}");
    }

    DashboardSnapshot {
        generated_for: today,
        panels,
        warnings,
    }
}

fn derive_panel(
    today: NaiveDate,
    binding: &PanelBinding,
    body: &Value,
    fetched: &[Fetched],
    warnings: &mut Vec<String>,
) -> Result<PanelData, DashboardError> {
    let data = match &binding.view {
        PanelView::Categories { .. } => {
            let breakdown = category_breakdown(body, &binding.field, warnings)?;
            PanelData::Categories {
                percentages: percentages(&breakdown),
                breakdown,
            }
        }
        PanelView::CategorySummary => {
            let breakdown = category_breakdown(body, &binding.field, warnings)?;
            let total = breakdown.total();
            let top = top_category(&breakdown);
            PanelData::CategorySummary {
                total,
                count: breakdown.len(),
                top_share: top
                    .as_ref()
                    .filter(|_| total > 0.0)
                    .map(|(_, amount)| format_percentage(amount / total)),
                top,
            }
        }
        PanelView::Monthly { .. } => PanelData::Monthly {
            series: monthly_series(body, &binding.field, warnings)?,
        },
        PanelView::TopMonth => PanelData::TopMonth {
            entry: top_month(&monthly_series(body, &binding.field, warnings)?),
        },
        PanelView::CurrentMonth => PanelData::CurrentMonth {
            entry: current_month_at(today, &monthly_series(body, &binding.field, warnings)?),
        },
        PanelView::MonthlySummary => {
            let series = monthly_series(body, &binding.field, warnings)?;
            let total = series.total();
            let months = series.len();
            let average = if months == 0 { 0.0 } else { total / months as f64 };
            PanelData::MonthlySummary {
                total,
                months,
                average,
            }
        }
        PanelView::IncomeVsExpenses { income } | PanelView::NetSavings { income } => {
            PanelData::Trend {
                comparison: comparison(body, &binding.field, income, fetched, warnings)?,
            }
        }
        PanelView::SavingsHealth { income } => {
            let comparison = comparison(body, &binding.field, income, fetched, warnings)?;
            PanelData::SavingsHealth {
                metrics: savings_metrics(&comparison),
            }
        }
    };

    Ok(data)
}

fn comparison(
    body: &Value,
    field: &str,
    income: &SeriesRef,
    fetched: &[Fetched],
    warnings: &mut Vec<String>,
) -> Result<MonthlyComparison, DashboardError> {
    let expenses = monthly_series(body, field, warnings)?;
    let Some(source) = fetched.iter().find(|item| item.name == income.endpoint) else {
        let message = format!("no response from `{}`", income.endpoint);
        return Err(DashboardError::data_shape(&income.field, message));
    };
    let income = monthly_series(&source.body, &income.field, warnings)?;
    Ok(MonthlyComparison::align(&income, &expenses))
}

/// Totals and averages over the compared months, plus the savings rate.
pub fn savings_metrics(comparison: &MonthlyComparison) -> SavingsMetrics {
    let total_income: f64 = comparison.income().iter().sum();
    let total_expenses: f64 = comparison.expenses().iter().sum();
    let total_savings = total_income - total_expenses;
    let months = comparison.len() as f64;
    let average = |total: f64| if months > 0.0 { total / months } else { 0.0 };

    SavingsMetrics {
        total_income,
        total_expenses,
        total_savings,
        avg_monthly_income: average(total_income),
        avg_monthly_expenses: average(total_expenses),
        savings_rate: (total_income > 0.0).then(|| total_savings / total_income * 100.0),
    }
}

/// Follows a dotted path such as `this_year_income_data.months`.
pub fn lookup<'a>(body: &'a Value, field: &str) -> Option<&'a Value> {
    field
        .split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(body, |value, segment| value.get(segment))
}

fn object_at<'a>(body: &'a Value, field: &str) -> Result<&'a Map<String, Value>, DashboardError> {
    match lookup(body, field) {
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(DashboardError::data_shape(
            field,
            format!("expected an object, found {}", kind_of(other)),
        )),
        None => Err(DashboardError::data_shape(field, "field is missing")),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Amounts arrive as numbers or as decimal strings.
pub fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (amount.is_finite() && amount >= 0.0).then_some(amount)
}

pub fn category_breakdown(
    body: &Value,
    field: &str,
    warnings: &mut Vec<String>,
) -> Result<CategoryBreakdown, DashboardError> {
    let mut breakdown = CategoryBreakdown::default();
    for (label, raw) in object_at(body, field)? {
        match parse_amount(raw) {
            Some(amount) => breakdown.insert(label.as_str(), amount),
            None => warnings.push(format!("{field}: dropped `{label}` with amount {raw}")),
        }
    }
    Ok(breakdown)
}

pub fn monthly_series(
    body: &Value,
    field: &str,
    warnings: &mut Vec<String>,
) -> Result<MonthlySeries, DashboardError> {
    let mut series = MonthlySeries::default();
    for (raw_key, raw) in object_at(body, field)? {
        let key = match raw_key.parse::<MonthKey>() {
            Ok(key) => key,
            Err(err) => {
                warnings.push(format!("{field}: dropped key `{raw_key}`: {err}"));
                continue;
            }
        };
        match parse_amount(raw) {
            Some(amount) => {
                if series.insert(key, amount).is_some() {
                    warnings.push(format!("{field}: `{raw_key}` repeats month {key}"));
                }
            }
            None => warnings.push(format!("{field}: dropped `{raw_key}` with amount {raw}")),
        }
    }
    Ok(series)
}

/// Share of each slice, one decimal place, in breakdown order.
pub fn percentages(breakdown: &CategoryBreakdown) -> Vec<String> {
    let total = breakdown.total();
    breakdown
        .iter()
        .map(|(_, amount)| {
            let share = if total > 0.0 { amount / total } else { 0.0 };
            format_percentage(share)
        })
        .collect()
}

pub fn format_percentage(share: f64) -> String {
    format!("{:.1}%", share * 100.0)
}

pub fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}

/// Greatest month; ties go to the chronologically first key.
pub fn top_month(series: &MonthlySeries) -> Option<MonthAmount> {
    series
        .iter()
        .fold(None, |best: Option<MonthAmount>, (key, amount)| match best {
            Some(current) if current.amount >= amount => Some(current),
            _ => Some(MonthAmount { key, amount }),
        })
}

pub fn current_month_at(today: NaiveDate, series: &MonthlySeries) -> Option<MonthAmount> {
    series
        .iter()
        .find(|(key, _)| key.matches(today))
        .map(|(key, amount)| MonthAmount { key, amount })
}

fn top_category(breakdown: &CategoryBreakdown) -> Option<(String, f64)> {
    breakdown
        .iter()
        .fold(None, |best: Option<(&str, f64)>, (label, amount)| match best {
            Some(current) if current.1 >= amount => Some(current),
            _ => Some((label, amount)),
        })
        .map(|(label, amount)| (label.to_string(), amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_endpoints;
    use crate::fetch::Origin;
    use crate::models::HealthStatus;
    use serde_json::json;

    fn series_from(body: Value) -> MonthlySeries {
        monthly_series(&body, "months", &mut Vec::new()).unwrap()
    }

    #[test]
    fn category_chart_inputs_follow_response_order() {
        let body = json!({ "expense_category_data": { "Food": 120.5, "Transport": 40.0 } });
        let breakdown =
            category_breakdown(&body, "expense_category_data", &mut Vec::new()).unwrap();
        assert_eq!(breakdown.labels(), vec!["Food", "Transport"]);
        assert_eq!(breakdown.values(), vec![120.5, 40.0]);
        assert_eq!(percentages(&breakdown), vec!["75.1%", "24.9%"]);
        assert_eq!(breakdown.total(), 160.5);
    }

    #[test]
    fn percentages_use_one_decimal() {
        let breakdown: CategoryBreakdown =
            [("Food", 120.0), ("Transport", 40.0)].into_iter().collect();
        assert_eq!(percentages(&breakdown), vec!["75.0%", "25.0%"]);
        let empty: CategoryBreakdown = [("Food", 0.0)].into_iter().collect();
        assert_eq!(percentages(&empty), vec!["0.0%"]);
    }

    #[test]
    fn slices_sum_to_input_total() {
        let body = json!({ "data": { "Rent": "950.00", "Food": 210.25, "Fun": 19.75, "Gym": 30 } });
        let breakdown = category_breakdown(&body, "data", &mut Vec::new()).unwrap();
        let rendered: f64 = breakdown.values().iter().sum();
        assert_eq!(rendered, 950.0 + 210.25 + 19.75 + 30.0);
        assert_eq!(breakdown.len(), 4);
    }

    #[test]
    fn malformed_amounts_are_dropped_with_warning() {
        let body = json!({ "data": { "Food": "lots", "Rent": -5, "Fun": 10 } });
        let mut warnings = Vec::new();
        let breakdown = category_breakdown(&body, "data", &mut warnings).unwrap();
        assert_eq!(breakdown.labels(), vec!["Fun"]);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn missing_or_wrong_fields_are_data_shape_errors() {
        let body = json!({ "this_year_expenses_data": {} });
        let err = monthly_series(&body, "this_year_expenses_data.months", &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, DashboardError::DataShape { .. }));

        let body = json!({ "monthly_data": [1, 2] });
        let err = monthly_series(&body, "monthly_data", &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn top_month_ignores_input_order() {
        let forward = json!({ "months": { "1": 10.0, "2": 80.0, "3": 80.0, "4": 5.0 } });
        let reversed = json!({ "months": { "4": 5.0, "3": 80.0, "2": 80.0, "1": 10.0 } });
        let (forward, reversed) = (series_from(forward), series_from(reversed));
        let expected = Some(MonthAmount {
            key: MonthKey::Month(2),
            amount: 80.0,
        });
        assert_eq!(top_month(&forward), expected);
        assert_eq!(top_month(&reversed), expected);
        assert_eq!(top_month(&MonthlySeries::default()), None);
    }

    #[test]
    fn current_month_matches_calendar_month() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let series = series_from(json!({ "months": { "2": 10.0, "3": 42.0 } }));
        assert_eq!(
            current_month_at(today, &series),
            Some(MonthAmount {
                key: MonthKey::Month(3),
                amount: 42.0
            })
        );

        let dated = series_from(json!({ "months": { "2025-03": 1.0, "2026-02": 2.0 } }));
        assert_eq!(current_month_at(today, &dated), None);

        let dated = series_from(json!({ "months": { "2025-03": 1.0, "2026-03": 7.5 } }));
        assert_eq!(
            current_month_at(today, &dated),
            Some(MonthAmount {
                key: MonthKey::YearMonth {
                    year: 2026,
                    month: 3
                },
                amount: 7.5
            })
        );
    }

    #[test]
    fn savings_metrics_sum_compared_months() {
        let income = series_from(json!({ "months": { "1": 3000.0, "2": 3000.0 } }));
        let expenses = series_from(json!({ "months": { "1": 2000.0, "2": 2500.0 } }));
        let metrics = savings_metrics(&MonthlyComparison::align(&income, &expenses));

        assert_eq!(metrics.total_income, 6000.0);
        assert_eq!(metrics.total_expenses, 4500.0);
        assert_eq!(metrics.total_savings, 1500.0);
        assert_eq!(metrics.avg_monthly_income, 3000.0);
        assert_eq!(metrics.avg_monthly_expenses, 2250.0);
        assert_eq!(metrics.savings_rate, Some(25.0));
        assert_eq!(metrics.health(), Some(HealthStatus::Excellent));
    }

    #[test]
    fn savings_without_income_have_no_rate() {
        let expenses = series_from(json!({ "months": { "1": 400.0 } }));
        let comparison = MonthlyComparison::align(&MonthlySeries::default(), &expenses);
        assert_eq!(comparison.savings(), vec![-400.0]);

        let metrics = savings_metrics(&comparison);
        assert_eq!(metrics.total_savings, -400.0);
        assert_eq!(metrics.savings_rate, None);
        assert_eq!(metrics.health(), None);
    }

    #[test]
    fn snapshot_derives_every_configured_panel() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let endpoints = default_endpoints();
        let body = |name: &str, body: Value| Fetched {
            name: name.to_string(),
            origin: Origin::Live,
            body,
        };
        let fetched = vec![
            body(
                "expense_categories",
                json!({ "expense_category_data": { "Food": 120.0, "Transport": 40.0 } }),
            ),
            body("monthly_expenses", json!({ "monthly_data": { "2026-01": 100.0 } })),
            body(
                "expense_summary",
                json!({ "this_year_expenses_data": { "months": { "1": 100.0, "3": 300.0 } } }),
            ),
            body("income_sources", json!({ "income_sources_data": {} })),
            body("income_summary", json!({ "this_year_income_data": {} })),
        ];

        let snapshot = build_snapshot_at(today, &endpoints, &fetched);

        assert_eq!(
            snapshot.panels.get("expense-top-month"),
            Some(&PanelData::TopMonth {
                entry: Some(MonthAmount {
                    key: MonthKey::Month(3),
                    amount: 300.0
                })
            })
        );
        assert_eq!(
            snapshot.panels.get("expense-average"),
            Some(&PanelData::MonthlySummary {
                total: 400.0,
                months: 2,
                average: 200.0
            })
        );
        assert_eq!(
            snapshot.panels.get("expense-summary"),
            Some(&PanelData::CategorySummary {
                total: 160.0,
                count: 2,
                top: Some(("Food".to_string(), 120.0)),
                top_share: Some("75.0%".to_string()),
            })
        );
        assert!(!snapshot.panels.contains_key("income-top-month"));
        assert!(!snapshot.panels.contains_key("income-this-month"));
        assert!(!snapshot.panels.contains_key("savings-chart"));
        assert_eq!(snapshot.warnings.len(), 5);
    }

    #[test]
    fn income_fallback_compares_against_empty_months() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let endpoints = default_endpoints();
        let fetched = vec![
            Fetched {
                name: "expense_summary".to_string(),
                origin: Origin::Live,
                body: json!({
                    "this_year_expenses_data": { "months": { "1": 250.0, "2": 310.0 } }
                }),
            },
            Fetched {
                name: "income_summary".to_string(),
                origin: Origin::Fallback,
                body: json!({ "this_year_income_data": { "months": {} } }),
            },
        ];

        let snapshot = build_snapshot_at(today, &endpoints, &fetched);

        let Some(PanelData::Trend { comparison }) = snapshot.panels.get("savings-chart") else {
            panic!("savings chart was not derived: {:?}", snapshot.warnings);
        };
        assert_eq!(comparison.income(), &[0.0, 0.0]);
        assert_eq!(comparison.savings(), vec![-250.0, -310.0]);
        assert!(matches!(
            snapshot.panels.get("savings-health"),
            Some(PanelData::SavingsHealth { metrics }) if metrics.savings_rate.is_none()
        ));
    }
}
