//! Mock upstream serving the summary endpoints the dashboard reads.
#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
};
use serde_json::{Value, json};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

pub const CATEGORIES: &str = "/expense_category_summary/";
pub const MONTHLY: &str = "/monthly_expense_summary/";
pub const EXPENSE_SUMMARY: &str = "/expense_summary_rest/";
pub const INCOME_SOURCES: &str = "/income/income_sources_data/";
pub const INCOME_SUMMARY: &str = "/income/income_summary_rest/";
pub const VALIDATE_USERNAME: &str = "/authentication/validate-username/";

#[derive(Debug, Clone)]
pub struct Seen {
    pub method: Method,
    pub path: String,
    pub csrf: Option<String>,
}

#[derive(Clone, Default)]
struct Shared {
    routes: Arc<Mutex<HashMap<String, (StatusCode, Value)>>>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

pub struct MockUpstream {
    pub base_url: String,
    shared: Shared,
}

impl MockUpstream {
    /// Starts on a free port with every summary endpoint answering normally.
    pub async fn start() -> Self {
        let shared = Shared::default();
        let app = Router::new().fallback(answer).with_state(shared.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mock = Self {
            base_url: format!("http://{addr}"),
            shared,
        };
        for (path, body) in standard_bodies() {
            mock.respond(path, StatusCode::OK, body).await;
        }
        mock
    }

    pub async fn respond(&self, path: &str, status: StatusCode, body: Value) {
        self.shared
            .routes
            .lock()
            .await
            .insert(path.to_string(), (status, body));
    }

    pub async fn remove(&self, path: &str) {
        self.shared.routes.lock().await.remove(path);
    }

    pub async fn seen(&self) -> Vec<Seen> {
        self.shared.seen.lock().await.clone()
    }
}

async fn answer(
    State(shared): State<Shared>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
) -> (StatusCode, Json<Value>) {
    shared.seen.lock().await.push(Seen {
        method,
        path: uri.path().to_string(),
        csrf: headers
            .get("x-csrftoken")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    });

    match shared.routes.lock().await.get(uri.path()) {
        Some((status, body)) => (*status, Json(body.clone())),
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "not found" }))),
    }
}

pub fn standard_bodies() -> Vec<(&'static str, Value)> {
    vec![
        (
            CATEGORIES,
            json!({ "expense_category_data": { "Food": 120.5, "Transport": 40.0 } }),
        ),
        (
            MONTHLY,
            json!({ "monthly_data": { "2026-02": 310.0, "2026-01": 250.0 } }),
        ),
        (
            EXPENSE_SUMMARY,
            json!({ "this_year_expenses_data": { "months": { "1": 250.0, "2": "310.00", "3": 160.5 } } }),
        ),
        (
            INCOME_SOURCES,
            json!({ "income_sources_data": { "Salary": 3000.0, "Freelance": 500.0 } }),
        ),
        (
            INCOME_SUMMARY,
            json!({ "this_year_income_data": { "months": { "1": 3500.0, "2": 3500.0, "3": 3000.0 } } }),
        ),
        (VALIDATE_USERNAME, json!({ "username_valid": true })),
    ]
}
