//! Status Poller - Client-side Progress Tracking
//!
//! Storefront clients poll the orchestrator for a request's status and
//! render it as a stepper. The poller runs the jittered backoff schedule
//! (no fixed interval), publishes each observed step over a watch
//! channel, and stops on a terminal status or when the schedule's
//! elapsed budget runs out.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::domain::backoff::{BackoffPolicy, BackoffSchedule};
use crate::domain::status::{FlowKind, RequestStatus};
use crate::ports::status::StatusFetch;

/// One renderable step of a request's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressStep {
    /// The status this step reflects.
    pub status: RequestStatus,
    /// Zero-based position in the flow's stepper.
    pub step: usize,
    /// Total steps in the flow's happy path.
    pub total: usize,
    /// Human-readable label for the step.
    pub label: &'static str,
    /// Whether polling should stop here.
    pub terminal: bool,
}

impl ProgressStep {
    /// Map a status to its stepper slot for the given flow.
    ///
    /// `Failed` collapses onto the final slot with its own label, so the
    /// mapping stays monotone in status rank.
    pub fn for_status(flow: FlowKind, status: RequestStatus) -> Self {
        let path = flow.happy_path();
        let step = path
            .iter()
            .position(|s| *s == status)
            .unwrap_or(path.len() - 1);
        Self {
            status,
            step,
            total: path.len(),
            label: Self::label_for(status),
            terminal: status.is_terminal(),
        }
    }

    fn label_for(status: RequestStatus) -> &'static str {
        match status {
            RequestStatus::Pending => "Finding your trade bot",
            RequestStatus::FriendRequestSent => "Friend request sent",
            RequestStatus::FriendAccepted => "Friend request accepted",
            RequestStatus::Trading => "Trading in game",
            RequestStatus::Completed => "Trade complete",
            RequestStatus::PetReceived => "Pet received by bot",
            RequestStatus::CustodyComplete => "Pet secured in custody",
            RequestStatus::Failed => "Something went wrong",
        }
    }
}

/// Polls a request's status until it settles.
pub struct StatusPoller<F: StatusFetch> {
    /// Status lookup port.
    fetch: Arc<F>,
    /// Backoff parameters, including the total polling budget.
    policy: BackoffPolicy,
}

impl<F: StatusFetch> StatusPoller<F> {
    pub fn new(fetch: Arc<F>, policy: BackoffPolicy) -> Self {
        Self { fetch, policy }
    }

    /// Spawn a polling task, returning the step receiver and the handle.
    ///
    /// The receiver starts at the `Pending` step and observes every
    /// change until a terminal step arrives or the budget runs out.
    pub fn spawn(
        &self,
        flow: FlowKind,
        id: Uuid,
    ) -> (watch::Receiver<ProgressStep>, JoinHandle<Result<RequestStatus>>) {
        let (tx, rx) = watch::channel(ProgressStep::for_status(flow, RequestStatus::Pending));
        let fetch = Arc::clone(&self.fetch);
        let policy = self.policy;
        let handle =
            tokio::spawn(async move { poll_until_settled(fetch, policy, flow, id, tx).await });
        (rx, handle)
    }

    /// Poll inline, publishing steps to the given sender.
    pub async fn run(
        &self,
        flow: FlowKind,
        id: Uuid,
        tx: watch::Sender<ProgressStep>,
    ) -> Result<RequestStatus> {
        poll_until_settled(Arc::clone(&self.fetch), self.policy, flow, id, tx).await
    }
}

/// The polling loop shared by `spawn` and `run`.
///
/// Fetch errors are logged and charged against the schedule rather than
/// aborting: the server keeps its own authoritative timeout, so a flaky
/// connection must not fail the client early.
#[instrument(skip(fetch, policy, tx), fields(flow = %flow, request_id = %id))]
async fn poll_until_settled<F: StatusFetch>(
    fetch: Arc<F>,
    policy: BackoffPolicy,
    flow: FlowKind,
    id: Uuid,
    tx: watch::Sender<ProgressStep>,
) -> Result<RequestStatus> {
    let mut schedule = BackoffSchedule::new(policy);

    loop {
        match fetch.fetch(flow, id).await {
            Ok(view) => {
                let step = ProgressStep::for_status(flow, view.status);
                if *tx.borrow() != step {
                    debug!(status = %view.status, step = step.step, "Progress step");
                    let _ = tx.send(step);
                }
                if step.terminal {
                    return Ok(view.status);
                }
            }
            Err(e) => {
                warn!(error = %e, "Status fetch failed, will retry");
            }
        }

        match schedule.next_delay() {
            Some(delay) => tokio::time::sleep(delay).await,
            None => anyhow::bail!("polling budget exhausted for request {id}"),
        }
    }
}
