//! Background compute worker.
//!
//! A dedicated thread that runs the calculator off the async runtime. The
//! protocol is two request/response pairs; each job carries a sequence number
//! so the receiver can tell a stale answer from the latest one. The worker
//! keeps nothing between jobs.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use shared::{Category, ChartPoint, FinanceItem, FinanceTotals, HistoryEntry};
use std::thread;
use tokio::sync::mpsc;

use super::calculator;

/// Payload of a `CALCULATE_TOTALS` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalsInput {
    pub items: Vec<FinanceItem>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerRequest {
    CalculateTotals(TotalsInput),
    PrepareChartData(Vec<HistoryEntry>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerResponse {
    TotalsCalculated(FinanceTotals),
    ChartDataPrepared(Vec<ChartPoint>),
}

/// A request tagged with the sender's sequence number
#[derive(Debug, Clone)]
pub struct WorkerJob {
    pub seq: u64,
    pub request: WorkerRequest,
}

/// A response carrying the sequence number of the job that produced it
#[derive(Debug, Clone)]
pub struct WorkerReply {
    pub seq: u64,
    pub response: WorkerResponse,
}

/// Compute the response for one request
pub fn handle(request: WorkerRequest) -> WorkerResponse {
    match request {
        WorkerRequest::CalculateTotals(input) => {
            WorkerResponse::TotalsCalculated(calculator::calculate_totals(&input.items, &input.categories))
        }
        WorkerRequest::PrepareChartData(history) => {
            WorkerResponse::ChartDataPrepared(calculator::prepare_chart_data(&history))
        }
    }
}

/// Handle a `{ "type": ..., "payload": ... }` message.
///
/// Messages with an unrecognized type, or a payload that does not match
/// their type, are ignored and yield `None`.
pub fn handle_json(message: serde_json::Value) -> Option<serde_json::Value> {
    let request: WorkerRequest = match serde_json::from_value(message) {
        Ok(request) => request,
        Err(e) => {
            debug!("Ignoring worker message: {}", e);
            return None;
        }
    };
    serde_json::to_value(handle(request)).ok()
}

/// Sending half of the worker; cheap to clone
#[derive(Clone)]
pub struct WorkerHandle {
    jobs: mpsc::UnboundedSender<WorkerJob>,
}

impl WorkerHandle {
    /// Post a job. Returns false if the worker thread has gone away.
    pub fn post(&self, seq: u64, request: WorkerRequest) -> bool {
        match self.jobs.send(WorkerJob { seq, request }) {
            Ok(()) => true,
            Err(_) => {
                warn!("Compute worker is no longer running; dropped job {}", seq);
                false
            }
        }
    }
}

/// Start the worker thread.
///
/// The thread exits once every `WorkerHandle` is dropped. Replies arrive in
/// job order on the returned receiver.
pub fn spawn() -> std::io::Result<(WorkerHandle, mpsc::UnboundedReceiver<WorkerReply>)> {
    let (job_tx, mut job_rx) = mpsc::unbounded_channel::<WorkerJob>();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel::<WorkerReply>();

    thread::Builder::new()
        .name("finance-worker".to_string())
        .spawn(move || {
            while let Some(job) = job_rx.blocking_recv() {
                let response = handle(job.request);
                if reply_tx.send(WorkerReply { seq: job.seq, response }).is_err() {
                    break;
                }
            }
            debug!("Compute worker stopped");
        })?;

    Ok((WorkerHandle { jobs: job_tx }, reply_rx))
}
