use crate::config::{EndpointSpec, Requiredness};
use crate::errors::DashboardError;
use crate::models::{UpstreamUsernameResponse, UsernameCheckRequest};
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Live,
    Fallback,
}

/// Response body of one summary endpoint, or its substituted default.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub name: String,
    pub origin: Origin,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct SummaryClient {
    http: reqwest::Client,
    base_url: String,
}

impl SummaryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DashboardError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                DashboardError::Config(format!("failed to build summary http client: {err}"))
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub async fn get_json(&self, path: &str) -> Result<Value, DashboardError> {
        let url = self.url(path);
        debug!("GET {url}");

        let res = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| DashboardError::transport(path, err))?;

        let status = res.status();
        if !status.is_success() {
            return Err(DashboardError::transport(path, format!("HTTP {status}")));
        }

        res.json::<Value>()
            .await
            .map_err(|err| DashboardError::transport(path, err))
    }

    /// Asks the upstream whether `username` is available.
    ///
    /// `Ok(Some(message))` is a rejection, `Ok(None)` an accepted name. Upstream
    /// 4xx answers that carry `username_error` are verdicts, not failures.
    pub async fn check_username(
        &self,
        path: &str,
        csrf_header: &str,
        csrf_token: &str,
        username: &str,
    ) -> Result<Option<String>, DashboardError> {
        let res = self
            .http
            .post(self.url(path))
            .header(csrf_header, csrf_token)
            .json(&UsernameCheckRequest {
                username: username.to_string(),
            })
            .send()
            .await
            .map_err(|err| DashboardError::transport(path, err))?;

        let status = res.status();
        let body = match res.json::<UpstreamUsernameResponse>().await {
            Ok(body) => body,
            Err(err) if status.is_success() => return Err(DashboardError::transport(path, err)),
            Err(_) => return Err(DashboardError::transport(path, format!("HTTP {status}"))),
        };

        if !status.is_success() && body.username_error.is_none() {
            return Err(DashboardError::transport(path, format!("HTTP {status}")));
        }

        Ok(body.username_error)
    }
}

/// Fetches every endpoint concurrently and waits for the whole set.
///
/// Optional endpoints that fail resolve to their configured fallback body. The
/// first failing mandatory endpoint, in declaration order, fails the call.
pub async fn fetch_all(
    client: &SummaryClient,
    endpoints: &[EndpointSpec],
) -> Result<Vec<Fetched>, DashboardError> {
    let mut tasks = JoinSet::new();
    for (index, endpoint) in endpoints.iter().enumerate() {
        let client = client.clone();
        let path = endpoint.path.clone();
        tasks.spawn(async move { (index, client.get_json(&path).await) });
    }

    let mut outcomes: Vec<Option<Result<Value, DashboardError>>> =
        endpoints.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => {
                if let Some(slot) = outcomes.get_mut(index) {
                    *slot = Some(outcome);
                }
            }
            Err(err) => error!("summary fetch task failed: {err}"),
        }
    }

    let mut fetched = Vec::with_capacity(endpoints.len());
    for (endpoint, outcome) in endpoints.iter().zip(outcomes) {
        let outcome = outcome.unwrap_or_else(|| {
            Err(DashboardError::transport(&endpoint.path, "fetch task aborted"))
        });

        match (outcome, endpoint.required) {
            (Ok(body), _) => fetched.push(Fetched {
                name: endpoint.name.clone(),
                origin: Origin::Live,
                body,
            }),
            (Err(err), Requiredness::Mandatory) => return Err(err),
            (Err(err), Requiredness::Optional) => {
                warn!(endpoint = %endpoint.name, "{err}; using empty default");
                fetched.push(Fetched {
                    name: endpoint.name.clone(),
                    origin: Origin::Fallback,
                    body: endpoint.fallback.clone(),
                });
            }
        }
    }

    Ok(fetched)
}
