mod common;

use axum::http::StatusCode;
use common::{CATEGORIES, MockUpstream, VALIDATE_USERNAME};
use expense_dashboard::models::{DashboardView, StatusKind, ValidationResponse};
use reqwest::Client;
use serde_json::json;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::time::sleep;

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(unix)]
mod cleanup {
    use once_cell::sync::Lazy;
    use std::sync::{Mutex, Once};

    static REGISTER: Once = Once::new();
    static PIDS: Lazy<Mutex<Vec<i32>>> = Lazy::new(|| Mutex::new(Vec::new()));

    pub fn register(pid: u32) {
        PIDS.lock().unwrap().push(pid as i32);
        REGISTER.call_once(|| unsafe {
            libc::atexit(on_exit);
        });
    }

    extern "C" fn on_exit() {
        if let Ok(pids) = PIDS.lock() {
            for pid in pids.iter().filter(|pid| **pid > 0) {
                unsafe {
                    libc::kill(*pid, libc::SIGTERM);
                }
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server(upstream: &MockUpstream) -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_expense_dashboard"))
        .env("PORT", port.to_string())
        .env("SUMMARY_BASE_URL", &upstream.base_url)
        .env_remove("DASHBOARD_CONFIG_PATH")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

#[tokio::test]
async fn http_index_declares_panels() {
    let upstream = MockUpstream::start().await;
    let server = spawn_server(&upstream).await;

    let html = Client::new()
        .get(format!("{}/", server.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(html.contains(r#"id="expense-chart" data-panel"#));
    assert!(html.contains(r#"id="income-this-month-value""#));
}

#[tokio::test]
async fn http_dashboard_returns_rendered_view() {
    let upstream = MockUpstream::start().await;
    let server = spawn_server(&upstream).await;

    let response = Client::new()
        .get(format!("{}/api/dashboard", server.base_url))
        .query(&[("targets", "expense-chart,expense-top-month")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let view: DashboardView = response.json().await.unwrap();
    assert!(view.ok);
    assert_eq!(view.charts.len(), 1);
    assert_eq!(view.charts[0].spec.labels, vec!["Food", "Transport"]);
    assert_eq!(view.texts["expense-top-month"], "Feb");
}

#[tokio::test]
async fn http_dashboard_surfaces_mandatory_failure() {
    let upstream = MockUpstream::start().await;
    upstream
        .respond(CATEGORIES, StatusCode::INTERNAL_SERVER_ERROR, json!({}))
        .await;
    let server = spawn_server(&upstream).await;

    let response = Client::new()
        .get(format!("{}/api/dashboard", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let view: DashboardView = response.json().await.unwrap();
    assert!(!view.ok);
    assert!(view.charts.is_empty());
    assert_eq!(view.status.map(|s| s.kind), Some(StatusKind::Error));
}

#[tokio::test]
async fn http_validate_username_requires_csrf_token() {
    let upstream = MockUpstream::start().await;
    let server = spawn_server(&upstream).await;

    let response = Client::new()
        .post(format!("{}/api/validate-username", server.base_url))
        .json(&json!({ "username": "alice" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn http_validate_username_forwards_token_and_verdict() {
    let upstream = MockUpstream::start().await;
    upstream
        .respond(
            VALIDATE_USERNAME,
            StatusCode::CONFLICT,
            json!({ "username_error": "Username is already taken. Choose another one." }),
        )
        .await;
    let server = spawn_server(&upstream).await;
    let client = Client::new();

    let taken: ValidationResponse = client
        .post(format!("{}/api/validate-username", server.base_url))
        .header("X-CSRFToken", "form-1")
        .json(&json!({ "username": "alice" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(taken.applied);
    assert_eq!(taken.seq, 1);
    assert!(taken.state.invalid);
    assert_eq!(
        taken.state.feedback.as_deref(),
        Some("Username is already taken. Choose another one.")
    );

    let seen = upstream.seen().await;
    let check = seen
        .iter()
        .find(|request| request.path == VALIDATE_USERNAME)
        .expect("validation request reached upstream");
    assert_eq!(check.csrf.as_deref(), Some("form-1"));

    let cleared: ValidationResponse = client
        .post(format!("{}/api/validate-username", server.base_url))
        .header("X-CSRFToken", "form-1")
        .json(&json!({ "username": "" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(cleared.applied);
    assert_eq!(cleared.seq, 2);
    assert!(!cleared.state.invalid);
}
