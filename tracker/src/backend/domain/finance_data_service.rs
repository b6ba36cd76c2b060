//! # Finance Data Service
//!
//! Stateful coordinator between the UI-facing actions, the repository and the
//! compute worker.
//!
//! ## Resources
//!
//! Items, categories and history are cached separately. Each has a status
//! (`NotRequested → Loading → Ready | Errored`) and a generation counter that
//! every optimistic write bumps. A load that returns after the generation
//! moved on, or after the session changed, is discarded.
//!
//! ## Writes
//!
//! Mutations update the cache immediately and queue the repository call on a
//! single writer task, so writes reach the repository in the order they were
//! issued. Each queued write carries a [`PendingMutation`] holding the cache
//! contents before the change. When a write fails the failure is recorded and
//! the previous contents are restored, unless a later mutation has already
//! touched the same resource.
//!
//! Most writes replace a whole resource, so they are refused until that
//! resource has been loaded successfully in the current session.
//!
//! ## Derived data
//!
//! Totals and chart series are computed on the worker thread. Every request
//! gets a sequence number and only the answer to the latest request for each
//! kind is published on the [`DerivedState`] watch channel.

use anyhow::{anyhow, bail, Result};
use log::{debug, error, info, warn};
use shared::{Category, ChartPoint, FinanceItem, FinanceTotals, HistoryEntry, ItemRevision};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use super::calculator::{calculate_totals, create_snapshot, sort_history_newest_first};
use super::categories;
use super::worker::{self, TotalsInput, WorkerHandle, WorkerReply, WorkerRequest, WorkerResponse};
use crate::backend::storage::FinanceRepository;

const NEW_ITEM_NAME: &str = "New Item";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceStatus {
    NotRequested,
    Loading,
    Ready,
    Errored(String),
}

#[derive(Debug, Clone)]
pub struct Resource<T> {
    pub data: Vec<T>,
    pub status: ResourceStatus,
    generation: u64,
    /// The data mirrors the repository: the last load succeeded
    synced: bool,
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            status: ResourceStatus::NotRequested,
            generation: 0,
            synced: false,
        }
    }
}

impl<T> Resource<T> {
    pub fn is_ready(&self) -> bool {
        self.status == ResourceStatus::Ready
    }

    /// Replace the data after an optimistic write and supersede in-flight loads
    fn replace(&mut self, data: Vec<T>) -> u64 {
        self.data = data;
        self.generation += 1;
        self.generation
    }

    fn loaded(&mut self, data: Vec<T>) {
        self.data = data;
        self.status = ResourceStatus::Ready;
        self.synced = true;
    }

    fn failed(&mut self, message: String) {
        self.status = ResourceStatus::Errored(message);
        self.synced = false;
    }

    fn clear(&mut self) {
        self.data.clear();
        self.generation += 1;
        self.status = ResourceStatus::Ready;
        self.synced = false;
    }
}

/// Precondition for loading from the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionGate {
    /// Local storage: always loadable
    Always,
    /// Remote storage: only once logged in
    RequiresLogin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Items,
    Categories,
    History,
}

/// Cache contents captured before an optimistic write
#[derive(Debug, Clone)]
pub enum Snapshot {
    Items(Vec<FinanceItem>),
    Categories(Vec<Category>),
    History(Vec<HistoryEntry>),
}

impl Snapshot {
    fn kind(&self) -> ResourceKind {
        match self {
            Snapshot::Items(_) => ResourceKind::Items,
            Snapshot::Categories(_) => ResourceKind::Categories,
            Snapshot::History(_) => ResourceKind::History,
        }
    }
}

/// Record of a write that has been applied to the cache but not yet persisted
#[derive(Debug, Clone)]
pub struct PendingMutation {
    pub label: String,
    pub generation: u64,
    pub previous: Snapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationFailure {
    pub label: String,
    pub message: String,
}

#[derive(Debug, Clone)]
enum WriteOp {
    SaveItems(Vec<FinanceItem>),
    DeleteItem(String),
    SaveCategories(Vec<Category>),
    SaveHistory(Vec<HistoryEntry>),
    DeleteHistoryItem(String),
}

enum WriteJob {
    Mutation {
        op: WriteOp,
        pending: PendingMutation,
        ack: Option<oneshot::Sender<Result<()>>>,
    },
    Barrier(oneshot::Sender<()>),
}

/// Totals and chart series as last published by the worker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedState {
    pub totals: FinanceTotals,
    pub chart_data: Vec<ChartPoint>,
    pub totals_seq: u64,
    pub chart_seq: u64,
}

#[derive(Default)]
struct FinanceState {
    items: Resource<FinanceItem>,
    categories: Resource<Category>,
    history: Resource<HistoryEntry>,
    logged_in: bool,
    session_epoch: u64,
    failures: Vec<MutationFailure>,
}

impl FinanceState {
    fn generation(&self, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::Items => self.items.generation,
            ResourceKind::Categories => self.categories.generation,
            ResourceKind::History => self.history.generation,
        }
    }

    fn status(&self, kind: ResourceKind) -> &ResourceStatus {
        match kind {
            ResourceKind::Items => &self.items.status,
            ResourceKind::Categories => &self.categories.status,
            ResourceKind::History => &self.history.status,
        }
    }

    fn status_mut(&mut self, kind: ResourceKind) -> &mut ResourceStatus {
        match kind {
            ResourceKind::Items => &mut self.items.status,
            ResourceKind::Categories => &mut self.categories.status,
            ResourceKind::History => &mut self.history.status,
        }
    }

    fn restore(&mut self, previous: Snapshot) {
        match previous {
            Snapshot::Items(items) => self.items.data = items,
            Snapshot::Categories(categories) => self.categories.data = categories,
            Snapshot::History(history) => self.history.data = history,
        }
    }
}

struct Shared {
    state: Mutex<FinanceState>,
    gate: SessionGate,
    derived: watch::Sender<DerivedState>,
    totals_requested: AtomicU64,
    chart_requested: AtomicU64,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, FinanceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn gate_open(&self, state: &FinanceState) -> bool {
        match self.gate {
            SessionGate::Always => true,
            SessionGate::RequiresLogin => state.logged_in,
        }
    }

    fn request_totals(&self, worker: &WorkerHandle) {
        let (seq, input) = {
            let state = self.state();
            let input = TotalsInput {
                items: state.items.data.clone(),
                categories: state.categories.data.clone(),
            };
            (self.totals_requested.fetch_add(1, Ordering::SeqCst) + 1, input)
        };
        worker.post(seq, WorkerRequest::CalculateTotals(input));
    }

    fn request_chart(&self, worker: &WorkerHandle) {
        let (seq, history) = {
            let state = self.state();
            (
                self.chart_requested.fetch_add(1, Ordering::SeqCst) + 1,
                state.history.data.clone(),
            )
        };
        worker.post(seq, WorkerRequest::PrepareChartData(history));
    }

    fn request_derived(&self, kind: ResourceKind, worker: &WorkerHandle) {
        match kind {
            ResourceKind::Items | ResourceKind::Categories => self.request_totals(worker),
            ResourceKind::History => self.request_chart(worker),
        }
    }

    /// Publish a worker reply if it answers the latest request of its kind
    fn apply_reply(&self, reply: WorkerReply) {
        let seq = reply.seq;
        self.derived.send_if_modified(|derived| match reply.response {
            WorkerResponse::TotalsCalculated(totals) => {
                if seq != self.totals_requested.load(Ordering::SeqCst) {
                    debug!("Discarding stale totals (seq {})", seq);
                    return false;
                }
                derived.totals = totals;
                derived.totals_seq = seq;
                true
            }
            WorkerResponse::ChartDataPrepared(chart_data) => {
                if seq != self.chart_requested.load(Ordering::SeqCst) {
                    debug!("Discarding stale chart data (seq {})", seq);
                    return false;
                }
                derived.chart_data = chart_data;
                derived.chart_seq = seq;
                true
            }
        });
    }
}

/// Runs queued writes one at a time, in issue order
async fn run_writer(
    shared: Arc<Shared>,
    repository: Arc<dyn FinanceRepository>,
    worker: WorkerHandle,
    mut jobs: mpsc::UnboundedReceiver<WriteJob>,
) {
    while let Some(job) = jobs.recv().await {
        let (op, pending, ack) = match job {
            WriteJob::Barrier(done) => {
                let _ = done.send(());
                continue;
            }
            WriteJob::Mutation { op, pending, ack } => (op, pending, ack),
        };

        let result = match &op {
            WriteOp::SaveItems(items) => repository.save_items(items).await,
            WriteOp::DeleteItem(id) => repository.delete_item(id).await,
            WriteOp::SaveCategories(categories) => repository.save_categories(categories).await,
            WriteOp::SaveHistory(history) => repository.save_history(history).await,
            WriteOp::DeleteHistoryItem(id) => repository.delete_history_item(id).await,
        };

        if let Err(e) = &result {
            let message = format!("{:#}", e);
            error!("{} failed: {}", pending.label, message);

            let kind = pending.previous.kind();
            let rolled_back = {
                let mut state = shared.state();
                state.failures.push(MutationFailure {
                    label: pending.label.clone(),
                    message,
                });
                if state.generation(kind) == pending.generation {
                    state.restore(pending.previous);
                    true
                } else {
                    false
                }
            };

            if rolled_back {
                info!("Rolled back {}", pending.label);
                shared.request_derived(kind, &worker);
            } else {
                warn!("Not rolling back {}: superseded by a later change", pending.label);
            }
        }

        if let Some(ack) = ack {
            let _ = ack.send(result);
        }
    }
    debug!("Finance writer stopped");
}

async fn run_applier(shared: Arc<Shared>, mut replies: mpsc::UnboundedReceiver<WorkerReply>) {
    while let Some(reply) = replies.recv().await {
        shared.apply_reply(reply);
    }
}

/// Coordinates cached finance data, repository writes and derived values.
///
/// Must be created inside a Tokio runtime. Clones share the same state.
#[derive(Clone)]
pub struct FinanceDataService {
    shared: Arc<Shared>,
    repository: Arc<dyn FinanceRepository>,
    writes: mpsc::UnboundedSender<WriteJob>,
    worker: WorkerHandle,
}

impl FinanceDataService {
    pub fn new(repository: Arc<dyn FinanceRepository>, gate: SessionGate) -> Result<Self> {
        let (worker, replies) = worker::spawn()?;
        let (derived, _) = watch::channel(DerivedState::default());
        let shared = Arc::new(Shared {
            state: Mutex::new(FinanceState::default()),
            gate,
            derived,
            totals_requested: AtomicU64::new(0),
            chart_requested: AtomicU64::new(0),
        });

        let (writes, jobs) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(shared.clone(), repository.clone(), worker.clone(), jobs));
        tokio::spawn(run_applier(shared.clone(), replies));

        Ok(Self {
            shared,
            repository,
            writes,
            worker,
        })
    }

    fn enqueue(&self, op: WriteOp, pending: PendingMutation, ack: Option<oneshot::Sender<Result<()>>>) {
        debug!("Queueing {}", pending.label);
        if self.writes.send(WriteJob::Mutation { op, pending, ack }).is_err() {
            error!("Finance writer is not running; write dropped");
        }
    }

    // ---- Loading ----

    /// Load every resource concurrently
    pub async fn load(&self) {
        tokio::join!(self.load_items(), self.load_categories(), self.load_history());
    }

    /// Mark `kind` as loading, or as empty and ready when the gate is closed.
    /// Returns the epoch, generation and prior status to validate the result against.
    fn begin_load(&self, kind: ResourceKind) -> Option<(u64, u64, ResourceStatus)> {
        let mut state = self.shared.state();
        if !self.shared.gate_open(&state) {
            debug!("Not logged in; {:?} left empty", kind);
            match kind {
                ResourceKind::Items => state.items.clear(),
                ResourceKind::Categories => state.categories.clear(),
                ResourceKind::History => state.history.clear(),
            }
            return None;
        }
        let prior = std::mem::replace(state.status_mut(kind), ResourceStatus::Loading);
        Some((state.session_epoch, state.generation(kind), prior))
    }

    /// Whether a load started at `epoch`/`generation` may still be applied.
    /// When it may not, the status the load replaced is put back.
    fn accept_load(&self, state: &mut FinanceState, kind: ResourceKind, start: &(u64, u64, ResourceStatus)) -> bool {
        let (epoch, generation, prior) = start;
        if state.session_epoch != *epoch {
            debug!("Discarding {:?} loaded in a previous session", kind);
            return false;
        }
        if state.generation(kind) != *generation {
            debug!("Discarding {:?} load superseded by a local change", kind);
            if *state.status(kind) == ResourceStatus::Loading {
                *state.status_mut(kind) = prior.clone();
            }
            return false;
        }
        true
    }

    pub async fn load_items(&self) {
        let Some(start) = self.begin_load(ResourceKind::Items) else {
            self.shared.request_totals(&self.worker);
            return;
        };
        let result = self.repository.get_items().await;
        {
            let mut state = self.shared.state();
            if !self.accept_load(&mut state, ResourceKind::Items, &start) {
                return;
            }
            match result {
                Ok(items) => {
                    info!("Loaded {} items", items.len());
                    state.items.loaded(items);
                }
                Err(e) => {
                    error!("Failed to load items: {:#}", e);
                    state.items.failed(format!("{:#}", e));
                }
            }
        }
        self.shared.request_totals(&self.worker);
    }

    pub async fn load_categories(&self) {
        let Some(start) = self.begin_load(ResourceKind::Categories) else {
            self.shared.request_totals(&self.worker);
            return;
        };
        let result = self.repository.get_categories().await;
        {
            let mut state = self.shared.state();
            if !self.accept_load(&mut state, ResourceKind::Categories, &start) {
                return;
            }
            match result {
                Ok(categories) => {
                    info!("Loaded {} categories", categories.len());
                    state.categories.loaded(categories);
                }
                Err(e) => {
                    error!("Failed to load categories: {:#}", e);
                    state.categories.failed(format!("{:#}", e));
                }
            }
        }
        self.shared.request_totals(&self.worker);
    }

    pub async fn load_history(&self) {
        let Some(start) = self.begin_load(ResourceKind::History) else {
            self.shared.request_chart(&self.worker);
            return;
        };
        let result = self.repository.get_history().await;
        {
            let mut state = self.shared.state();
            if !self.accept_load(&mut state, ResourceKind::History, &start) {
                return;
            }
            match result {
                Ok(mut history) => {
                    info!("Loaded {} history entries", history.len());
                    sort_history_newest_first(&mut history);
                    state.history.loaded(history);
                }
                Err(e) => {
                    error!("Failed to load history: {:#}", e);
                    state.history.failed(format!("{:#}", e));
                }
            }
        }
        self.shared.request_chart(&self.worker);
    }

    /// Open or close the session gate.
    ///
    /// Logging out discards in-flight loads and empties every cache. Logging
    /// in reloads everything.
    pub async fn set_logged_in(&self, logged_in: bool) {
        {
            let mut state = self.shared.state();
            state.logged_in = logged_in;
            state.session_epoch += 1;
            if !logged_in {
                state.items.clear();
                state.categories.clear();
                state.history.clear();
            }
        }

        if logged_in {
            info!("Session started, loading finance data");
            self.load().await;
        } else {
            info!("Session ended, finance data cleared");
            self.shared.request_totals(&self.worker);
            self.shared.request_chart(&self.worker);
        }
    }

    // ---- Item actions ----

    /// Whether full-replace writes of `kind` are safe: the session is open and
    /// the cache holds what the repository holds.
    fn writable(&self, state: &FinanceState, kind: ResourceKind) -> bool {
        if !self.shared.gate_open(state) {
            warn!("Not logged in; {:?} change refused", kind);
            return false;
        }
        let synced = match kind {
            ResourceKind::Items => state.items.synced,
            ResourceKind::Categories => state.categories.synced,
            ResourceKind::History => state.history.synced,
        };
        if !synced {
            warn!("{:?} not loaded ({:?}); change refused", kind, state.status(kind));
            return false;
        }
        true
    }

    /// Add a new item named "New Item" with amount 0 to `category`.
    ///
    /// Returns `None` unless items are loaded.
    pub fn add_item(&self, category: &str) -> Option<FinanceItem> {
        let item = FinanceItem {
            id: Uuid::new_v4().to_string(),
            name: NEW_ITEM_NAME.to_string(),
            amount: 0.0,
            category: category.to_string(),
        };
        {
            let mut state = self.shared.state();
            if !self.writable(&state, ResourceKind::Items) {
                return None;
            }
            let mut items = state.items.data.clone();
            items.push(item.clone());
            self.write_items(&mut state, items, format!("Add item {}", item.id));
        }
        self.shared.request_totals(&self.worker);
        Some(item)
    }

    /// Set the name and amount of an item; its category is kept.
    ///
    /// Returns false if items are not loaded or there is no such item.
    pub fn update_item(&self, id: &str, name: &str, amount: f64) -> bool {
        {
            let mut state = self.shared.state();
            if !self.writable(&state, ResourceKind::Items) {
                return false;
            }
            let mut items = state.items.data.clone();
            let Some(slot) = items.iter_mut().find(|i| i.id == id) else {
                warn!("Cannot update unknown item {}", id);
                return false;
            };
            slot.name = name.to_string();
            slot.amount = amount;
            self.write_items(&mut state, items, format!("Update item {}", id));
        }
        self.shared.request_totals(&self.worker);
        true
    }

    /// Replace the cached items and queue the save, under the caller's lock
    fn write_items(&self, state: &mut FinanceState, items: Vec<FinanceItem>, label: String) {
        let previous = Snapshot::Items(state.items.data.clone());
        let generation = state.items.replace(items.clone());
        let pending = PendingMutation {
            label,
            generation,
            previous,
        };
        self.enqueue(WriteOp::SaveItems(items), pending, None);
    }

    /// Permanently delete an item. Returns false if items are not loaded.
    pub fn delete_item(&self, id: &str) -> bool {
        {
            let mut state = self.shared.state();
            if !self.writable(&state, ResourceKind::Items) {
                return false;
            }
            let previous = Snapshot::Items(state.items.data.clone());
            let remaining: Vec<FinanceItem> = state.items.data.iter().filter(|i| i.id != id).cloned().collect();
            let generation = state.items.replace(remaining);
            let pending = PendingMutation {
                label: format!("Delete item {}", id),
                generation,
                previous,
            };
            self.enqueue(WriteOp::DeleteItem(id.to_string()), pending, None);
        }
        self.shared.request_totals(&self.worker);
        true
    }

    // ---- History actions ----

    /// Record the current totals as a new history entry.
    ///
    /// Returns false without doing anything unless items, categories and
    /// history are all loaded.
    pub fn snapshot_history(&self) -> bool {
        {
            let mut state = self.shared.state();
            if !self.writable(&state, ResourceKind::History) {
                return false;
            }
            if !state.items.is_ready() || !state.categories.is_ready() {
                warn!("Snapshot skipped: items or categories not loaded");
                return false;
            }
            let totals = calculate_totals(&state.items.data, &state.categories.data);
            let entry = create_snapshot(&totals);
            info!("Recording snapshot {} (balance {:.2})", entry.id, entry.balance);

            let previous = Snapshot::History(state.history.data.clone());
            let mut history = Vec::with_capacity(state.history.data.len() + 1);
            history.push(entry.clone());
            history.extend(state.history.data.iter().cloned());
            let generation = state.history.replace(history.clone());
            let pending = PendingMutation {
                label: format!("Snapshot {}", entry.id),
                generation,
                previous,
            };
            self.enqueue(WriteOp::SaveHistory(history), pending, None);
        }
        self.shared.request_chart(&self.worker);
        true
    }

    /// Permanently delete a history entry. Returns false if history is not loaded.
    pub fn delete_history_item(&self, id: &str) -> bool {
        {
            let mut state = self.shared.state();
            if !self.writable(&state, ResourceKind::History) {
                return false;
            }
            let previous = Snapshot::History(state.history.data.clone());
            let remaining: Vec<HistoryEntry> = state.history.data.iter().filter(|h| h.id != id).cloned().collect();
            let generation = state.history.replace(remaining);
            let pending = PendingMutation {
                label: format!("Delete history entry {}", id),
                generation,
                previous,
            };
            self.enqueue(WriteOp::DeleteHistoryItem(id.to_string()), pending, None);
        }
        self.shared.request_chart(&self.worker);
        true
    }

    /// Revisions of one item, straight from the repository
    pub async fn get_item_history(&self, item_id: &str) -> Result<Vec<ItemRevision>> {
        self.repository.get_item_history(item_id).await
    }

    // ---- Category actions ----

    pub async fn add_category(&self, category: Category) -> Result<()> {
        let label = format!("Add category {}", category.id);
        self.write_categories(label, |list, _| categories::add_category(list, category))
            .await
    }

    pub async fn update_category(&self, category: Category) -> Result<()> {
        let label = format!("Update category {}", category.id);
        self.write_categories(label, |list, _| categories::update_category(list, category))
            .await
    }

    /// Delete a category. Fails with `CategoryError::InUse` while items still reference it.
    pub async fn delete_category(&self, id: &str) -> Result<()> {
        let label = format!("Delete category {}", id);
        self.write_categories(label, |list, items| {
            categories::delete_category(list, items, id).map(|_| ())
        })
        .await
    }

    /// Apply `change` to a copy of the categories, then persist and await the write
    async fn write_categories<F>(&self, label: String, change: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Category>, &[FinanceItem]) -> Result<(), categories::CategoryError>,
    {
        let (ack, done) = oneshot::channel();
        {
            let mut state = self.shared.state();
            if !self.writable(&state, ResourceKind::Categories) {
                bail!("Categories are not loaded");
            }
            let mut next = state.categories.data.clone();
            change(&mut next, &state.items.data)?;

            let previous = Snapshot::Categories(state.categories.data.clone());
            let generation = state.categories.replace(next.clone());
            let pending = PendingMutation {
                label,
                generation,
                previous,
            };
            self.enqueue(WriteOp::SaveCategories(next), pending, Some(ack));
        }
        self.shared.request_totals(&self.worker);
        done.await.map_err(|_| anyhow!("Finance writer stopped before saving categories"))?
    }

    // ---- Accessors ----

    pub fn items(&self) -> Vec<FinanceItem> {
        self.shared.state().items.data.clone()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.shared.state().categories.data.clone()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.shared.state().history.data.clone()
    }

    pub fn status(&self, kind: ResourceKind) -> ResourceStatus {
        self.shared.state().status(kind).clone()
    }

    pub fn failures(&self) -> Vec<MutationFailure> {
        self.shared.state().failures.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.state().failures.last().map(|f| f.message.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<DerivedState> {
        self.shared.derived.subscribe()
    }

    pub fn totals(&self) -> FinanceTotals {
        self.shared.derived.borrow().totals
    }

    pub fn chart_data(&self) -> Vec<ChartPoint> {
        self.shared.derived.borrow().chart_data.clone()
    }

    /// Wait until every write queued so far has been attempted
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.writes.send(WriteJob::Barrier(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Wait for queued writes and for the latest derived values
    pub async fn settle(&self) {
        self.flush().await;
        let shared = self.shared.clone();
        let mut derived = self.subscribe();
        let _ = derived
            .wait_for(|d| {
                d.totals_seq >= shared.totals_requested.load(Ordering::SeqCst)
                    && d.chart_seq >= shared.chart_requested.load(Ordering::SeqCst)
            })
            .await;
    }
}
