use crate::errors::DashboardError;
use crate::models::{FieldState, ValidationResponse};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const GENERIC_FEEDBACK: &str = "There was an error validating the username. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    seq: u64,
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Default)]
struct Applied {
    seq: u64,
    state: FieldState,
}

/// Availability check for one form field.
///
/// Every input takes a ticket from a monotonic counter; a response only lands
/// when its ticket is still the latest one issued.
#[derive(Debug, Default)]
pub struct FieldValidator {
    issued: AtomicU64,
    applied: Mutex<Applied>,
}

impl FieldValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Ticket {
        Ticket {
            seq: self.issued.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    pub fn is_latest(&self, ticket: Ticket) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket.seq
    }

    /// Records the upstream verdict for `ticket`; returns whether it was applied.
    pub async fn complete(
        &self,
        ticket: Ticket,
        outcome: Result<Option<String>, DashboardError>,
    ) -> bool {
        let state = match outcome {
            Ok(None) => FieldState::default(),
            Ok(Some(message)) => FieldState {
                invalid: true,
                feedback: Some(message),
            },
            Err(err) => {
                warn!("username check failed: {err}");
                FieldState {
                    invalid: true,
                    feedback: Some(GENERIC_FEEDBACK.to_string()),
                }
            }
        };
        self.apply(ticket, state).await
    }

    /// Empty input: clear the invalid state without asking upstream.
    pub async fn clear(&self, ticket: Ticket) -> bool {
        self.apply(ticket, FieldState::default()).await
    }

    async fn apply(&self, ticket: Ticket, state: FieldState) -> bool {
        let mut applied = self.applied.lock().await;
        if !self.is_latest(ticket) || ticket.seq <= applied.seq {
            debug!(seq = ticket.seq, "discarding stale validation response");
            return false;
        }
        applied.seq = ticket.seq;
        applied.state = state;
        true
    }

    pub async fn state(&self) -> FieldState {
        self.applied.lock().await.state.clone()
    }

    pub async fn on_input<F, Fut>(&self, value: &str, check: F) -> ValidationResponse
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Option<String>, DashboardError>>,
    {
        let ticket = self.begin();
        let applied = if value.is_empty() {
            self.clear(ticket).await
        } else {
            let outcome = check(value.to_string()).await;
            self.complete(ticket, outcome).await
        };

        ValidationResponse {
            seq: ticket.seq,
            applied,
            state: self.state().await,
        }
    }
}
