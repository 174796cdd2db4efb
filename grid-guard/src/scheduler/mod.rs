//! Debounced, concurrency-limited validation of edited cells.
//!
//! Every `(row, column)` key moves through a small state machine:
//!
//! ```text
//!            edit                timer fires               report sent
//!   Idle ───────────▶ Pending ─────────────────▶ Running ───────────────▶ Idle
//!                      │   ▲                        │
//!                      └───┘ edit: timer re-armed   │ edit: new Pending entry; the
//!                            (coalesced)            │ running one keeps the key busy
//!                                                   ▼ until it finishes or is cancelled
//! ```
//!
//! A burst of edits to one cell therefore produces a single evaluation using
//! the value present after the last edit. Evaluations of different cells run
//! concurrently, at most `max_concurrent_validations` at a time; the rest
//! wait in FIFO order for a slot.
//!
//! Each evaluation carries a generation number. A report is handed to the
//! sink only if no newer generation of the same cell has reported already,
//! so a slow superseded evaluation never overwrites a fresher result.
//!
//! Editing a column read by a cross-row rule also re-validates the cells of
//! other rows that rule may now judge differently: the rows the rule's
//! [`RowScope`](crate::core::RowScope) selects in the fresh snapshot, plus
//! the rows whose last reported result for that column was a failure.

pub mod limiter;

pub use limiter::ConcurrencyLimiter;

use crate::core::{CellReport, GridReport, RowSet, RuleSet, RuleStatus};
use crate::error::{GridError, Result};
use crate::grid::{DataAccessor, NotificationSink};
use crate::logging::{truncate_field, LogConfig};
use crate::{log_debug, log_rule, log_scheduler};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Identifies one cell of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub row: usize,
    pub column: String,
}

impl CellKey {
    pub fn new(row: usize, column: impl Into<String>) -> Self {
        Self {
            row,
            column: column.into(),
        }
    }
}

/// Snapshot of the scheduler's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Cell evaluations requested (edited cells plus their dependents)
    pub scheduled: u64,
    /// Armed timers replaced by a newer edit before firing
    pub coalesced: u64,
    /// Cell reports delivered to the sink
    pub evaluated: u64,
    /// Evaluations abandoned after they started
    pub cancelled: u64,
    /// Finished evaluations discarded because a newer one of the same cell
    /// had already reported
    pub stale: u64,
    /// Rule outcomes that were validator faults
    pub faults: u64,
    /// Evaluations that failed to read the grid
    pub errors: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    scheduled: AtomicU64,
    coalesced: AtomicU64,
    evaluated: AtomicU64,
    cancelled: AtomicU64,
    stale: AtomicU64,
    faults: AtomicU64,
    errors: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            evaluated: self.evaluated.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Running,
}

#[derive(Debug)]
struct CellSlot {
    generation: u64,
    token: CancellationToken,
    phase: Phase,
    /// Edited columns whose cross-row peers are scheduled after this
    /// evaluation reports
    fan_out: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct CellState {
    /// Newest requested evaluation, until it finishes
    current: Option<CellSlot>,
    /// Older evaluations that were running when superseded and have not
    /// finished yet
    superseded_running: usize,
    /// Generation of the newest report handed to the sink
    delivered: Option<u64>,
}

impl CellState {
    fn is_idle(&self) -> bool {
        self.current.is_none() && self.superseded_running == 0
    }
}

struct SchedulerInner {
    rule_set: Arc<RuleSet>,
    accessor: Arc<dyn DataAccessor>,
    sink: Arc<dyn NotificationSink>,
    limiter: ConcurrencyLimiter,
    log_config: LogConfig,
    cells: Mutex<HashMap<CellKey, CellState>>,
    /// Cells whose latest delivered result is a failure
    flagged: Mutex<HashSet<CellKey>>,
    /// Serializes generation checks with the sink call that follows them
    deliveries: Mutex<()>,
    next_generation: AtomicU64,
    stats: StatsCounters,
    idle: Notify,
    shutdown: CancellationToken,
}

/// Schedules validation of edited cells against a rule set.
///
/// The scheduler owns its timer map and limiter; cloning it yields another
/// handle to the same scheduler.
///
/// # Examples
///
/// ```rust
/// use grid_guard::grid::{CollectingSink, InMemoryGrid};
/// use grid_guard::prelude::*;
/// use std::sync::Arc;
///
/// # async fn example() -> grid_guard::prelude::Result<()> {
/// let rules = RuleSet::builder("people")
///     .add_required("Name")
///     .throttling(ThrottlingConfig::default().with_debounce_ms(50))
///     .build()?;
///
/// let grid = Arc::new(InMemoryGrid::new(["Name"]).with_row([("Name", "Ada")]));
/// let sink = Arc::new(CollectingSink::new());
/// let scheduler = ValidationScheduler::new(rules, grid.clone(), sink.clone())?;
///
/// grid.set_cell(0, "Name", "")?;
/// scheduler.cell_edited(0, "Name").await?;
/// scheduler.wait_idle().await;
///
/// assert!(sink.latest(0, "Name").is_some_and(|r| r.is_failure()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ValidationScheduler {
    inner: Arc<SchedulerInner>,
}

impl ValidationScheduler {
    /// Creates a scheduler. Fails if the rule set's throttling configuration
    /// is invalid.
    pub fn new(
        rule_set: impl Into<Arc<RuleSet>>,
        accessor: Arc<dyn DataAccessor>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        Self::with_log_config(rule_set, accessor, sink, LogConfig::default())
    }

    /// Creates a scheduler with explicit logging settings.
    pub fn with_log_config(
        rule_set: impl Into<Arc<RuleSet>>,
        accessor: Arc<dyn DataAccessor>,
        sink: Arc<dyn NotificationSink>,
        log_config: LogConfig,
    ) -> Result<Self> {
        let rule_set = rule_set.into();
        rule_set.throttling().validate()?;
        let limiter = ConcurrencyLimiter::new(rule_set.throttling().max_concurrent_validations);

        Ok(Self {
            inner: Arc::new(SchedulerInner {
                rule_set,
                accessor,
                sink,
                limiter,
                log_config,
                cells: Mutex::new(HashMap::new()),
                flagged: Mutex::new(HashSet::new()),
                deliveries: Mutex::new(()),
                next_generation: AtomicU64::new(0),
                stats: StatsCounters::default(),
                idle: Notify::new(),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.inner.rule_set
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.inner.limiter
    }

    /// Notifies the scheduler that a cell was edited.
    ///
    /// The cell and every column of the same row whose rules read it are
    /// scheduled. With `enable_async` off they are evaluated before this
    /// returns; otherwise each is debounced and evaluated in the background.
    /// Once a cell whose cross-row rules read `column` has reported, its
    /// peers in other rows are scheduled too.
    pub async fn cell_edited(&self, row: usize, column: &str) -> Result<()> {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return Err(GridError::SchedulerClosed);
        }

        let mut columns = vec![column.to_string()];
        columns.extend(inner.rule_set.dependent_columns(column));
        columns.retain(|column| !inner.rule_set.rules_for_column(column).is_empty());

        if !inner.rule_set.throttling().enable_async {
            for target in columns {
                inner.stats.scheduled.fetch_add(1, Ordering::Relaxed);
                inner.evaluate_now(CellKey::new(row, target), column).await?;
            }
            return Ok(());
        }

        for target in columns {
            let fan_out = BTreeSet::from([column.to_string()]);
            SchedulerInner::schedule(inner, CellKey::new(row, target), fan_out);
        }
        Ok(())
    }

    /// Validates every target cell of every row, delivering each cell's
    /// result to the sink, and returns the aggregated report.
    #[instrument(skip(self), fields(rule_set.name = %self.inner.rule_set.name()))]
    pub async fn validate_all_rows(&self) -> Result<GridReport> {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return Err(GridError::SchedulerClosed);
        }

        let start_time = Instant::now();
        let limiter = inner
            .rule_set
            .throttling()
            .enable_async
            .then_some(&inner.limiter);
        let token = inner.shutdown.child_token();
        let cells = inner
            .rule_set
            .evaluate_all_rows(inner.accessor.as_ref(), limiter, &token)
            .await?;

        for cell in &cells {
            inner.deliver(cell);
        }
        Ok(inner
            .rule_set
            .summarize(inner.accessor.row_count(), &cells, start_time))
    }

    /// Number of cells with an armed timer or a running evaluation,
    /// superseded ones included.
    pub fn pending_count(&self) -> usize {
        self.inner.lock_cells().len()
    }

    /// Returns true if `cell` has an armed timer or a running evaluation.
    pub fn is_pending(&self, cell: &CellKey) -> bool {
        self.inner.lock_cells().contains_key(cell)
    }

    /// Waits until no cell is pending.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.pending_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.inner.stats.snapshot()
    }

    /// Cancels every armed timer and running evaluation and refuses further
    /// work.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        inner.shutdown.cancel();
        inner.limiter.close();
        let abandoned = {
            let mut cells = inner.lock_cells();
            let abandoned = cells.len();
            cells.clear();
            abandoned
        };
        inner.idle.notify_waiters();
        info!(
            rule_set.name = %inner.rule_set.name(),
            cells.abandoned = abandoned,
            "Validation scheduler shut down"
        );
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

impl SchedulerInner {
    fn lock_cells(&self) -> MutexGuard<'_, HashMap<CellKey, CellState>> {
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_flagged(&self) -> MutexGuard<'_, HashSet<CellKey>> {
        self.flagged.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arms (or re-arms) the debounce timer of a cell.
    fn schedule(self: &Arc<Self>, key: CellKey, fan_out: BTreeSet<String>) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = self.shutdown.child_token();
        let cancel_superseded = self.rule_set.throttling().cancel_superseded;

        let previous = {
            let mut cells = self.lock_cells();
            let state = cells.entry(key.clone()).or_default();
            let mut slot = CellSlot {
                generation,
                token: token.clone(),
                phase: Phase::Pending,
                fan_out,
            };
            let previous = state.current.take();
            match &previous {
                Some(old) if old.phase == Phase::Pending => {
                    slot.fan_out.extend(old.fan_out.iter().cloned());
                }
                Some(_) => state.superseded_running += 1,
                None => {}
            }
            state.current = Some(slot);
            previous.map(|old| (old.phase, old.token))
        };
        self.stats.scheduled.fetch_add(1, Ordering::Relaxed);

        match previous {
            Some((Phase::Pending, old_token)) => {
                old_token.cancel();
                self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                log_scheduler!(
                    self.log_config,
                    cell.row = key.row,
                    cell.column = %key.column,
                    "Debounce timer re-armed"
                );
            }
            Some((Phase::Running, old_token)) if cancel_superseded => {
                old_token.cancel();
                log_scheduler!(
                    self.log_config,
                    cell.row = key.row,
                    cell.column = %key.column,
                    "Cancelling superseded evaluation"
                );
            }
            Some((Phase::Running, _)) => {
                log_scheduler!(
                    self.log_config,
                    cell.row = key.row,
                    cell.column = %key.column,
                    "Edit during evaluation, scheduling another pass"
                );
            }
            None => {
                log_scheduler!(
                    self.log_config,
                    cell.row = key.row,
                    cell.column = %key.column,
                    debounce_ms = self.rule_set.throttling().debounce_ms,
                    "Debounce timer armed"
                );
            }
        }

        tokio::spawn(Arc::clone(self).run_cell(key, generation, token));
    }

    async fn run_cell(self: Arc<Self>, key: CellKey, generation: u64, token: CancellationToken) {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(self.rule_set.throttling().debounce()) => {}
        }

        let fan_out = {
            let mut cells = self.lock_cells();
            match cells.get_mut(&key).and_then(|state| state.current.as_mut()) {
                Some(slot) if slot.generation == generation => {
                    slot.phase = Phase::Running;
                    std::mem::take(&mut slot.fan_out)
                }
                _ => return,
            }
        };

        let permit = tokio::select! {
            _ = token.cancelled() => None,
            permit = self.limiter.acquire() => permit.ok(),
        };
        let Some(permit) = permit else {
            self.abandon(&key, generation);
            return;
        };

        let outcome = self
            .rule_set
            .evaluate_cell_with_rows(self.accessor.as_ref(), key.row, &key.column, &token)
            .await;
        drop(permit);

        match outcome {
            Ok((report, rows)) if !token.is_cancelled() => {
                if self.deliver_if_newest(&key, generation, &report) {
                    for peer in self.peers(&key, fan_out.iter().map(String::as_str), &rows) {
                        Self::schedule(&self, peer, BTreeSet::new());
                    }
                }
            }
            Ok(_) | Err(GridError::Cancelled) => self.abandoned(&key),
            Err(err) => self.failed(&key, &err),
        }
        self.finish(&key, generation);
    }

    /// Evaluates an edited cell on the caller's task, then its cross-row
    /// peers.
    async fn evaluate_now(&self, key: CellKey, edited: &str) -> Result<()> {
        let Some(rows) = self.evaluate_once(&key).await? else {
            return Ok(());
        };
        for peer in self.peers(&key, [edited], &rows) {
            self.stats.scheduled.fetch_add(1, Ordering::Relaxed);
            self.evaluate_once(&peer).await?;
        }
        Ok(())
    }

    async fn evaluate_once(&self, key: &CellKey) -> Result<Option<RowSet>> {
        let token = self.shutdown.child_token();
        match self
            .rule_set
            .evaluate_cell_with_rows(self.accessor.as_ref(), key.row, &key.column, &token)
            .await
        {
            Ok((report, rows)) => {
                self.deliver(&report);
                Ok(Some(rows))
            }
            Err(GridError::Cancelled) => {
                self.abandoned(key);
                Ok(None)
            }
            Err(err) => {
                self.failed(key, &err);
                Err(err)
            }
        }
    }

    /// Cells of other rows to re-validate after `key` reported, for edits
    /// of the `edited` columns.
    fn peers<'a>(
        &self,
        key: &CellKey,
        edited: impl IntoIterator<Item = &'a str>,
        rows: &RowSet,
    ) -> Vec<CellKey> {
        let mut peers = BTreeSet::new();
        for column in edited {
            if !self.rule_set.cross_row_targets(column).contains(&key.column) {
                continue;
            }
            peers.extend(
                self.rule_set
                    .cross_row_peers(key.row, column, &key.column, rows),
            );
            peers.extend(
                self.lock_flagged()
                    .iter()
                    .filter(|cell| cell.column == key.column)
                    .map(|cell| cell.row),
            );
        }
        peers.remove(&key.row);

        let row_count = self.accessor.row_count();
        if !peers.is_empty() {
            log_scheduler!(
                self.log_config,
                cell.row = key.row,
                cell.column = %key.column,
                peers = peers.len(),
                "Re-validating cross-row peers"
            );
        }
        peers
            .into_iter()
            .filter(|row| *row < row_count)
            .map(|row| CellKey::new(row, key.column.clone()))
            .collect()
    }

    /// Delivers `report` unless a newer generation of the cell has already
    /// reported. Returns true if it was delivered.
    fn deliver_if_newest(&self, key: &CellKey, generation: u64, report: &CellReport) -> bool {
        let _ordered = self.deliveries.lock().unwrap_or_else(PoisonError::into_inner);
        let newest = {
            let mut cells = self.lock_cells();
            match cells.get_mut(key) {
                Some(state) if !matches!(state.delivered, Some(seen) if seen > generation) => {
                    state.delivered = Some(generation);
                    true
                }
                _ => false,
            }
        };

        if newest {
            self.deliver(report);
        } else {
            self.stats.stale.fetch_add(1, Ordering::Relaxed);
            log_scheduler!(
                self.log_config,
                cell.row = key.row,
                cell.column = %key.column,
                generation,
                "Newer result already reported, discarding"
            );
        }
        newest
    }

    fn deliver(&self, report: &CellReport) {
        self.sink
            .report_cell_validation(report.row, &report.column, &report.result);
        self.stats.evaluated.fetch_add(1, Ordering::Relaxed);

        {
            let key = CellKey::new(report.row, report.column.clone());
            let mut flagged = self.lock_flagged();
            if report.result.is_failure() {
                flagged.insert(key);
            } else {
                flagged.remove(&key);
            }
        }

        let faults = report
            .outcomes
            .iter()
            .filter(|outcome| outcome.status == RuleStatus::Faulted)
            .count() as u64;
        self.stats.faults.fetch_add(faults, Ordering::Relaxed);

        for outcome in &report.outcomes {
            log_rule!(
                self.log_config,
                rule.name = %outcome.rule_name,
                rule.status = ?outcome.status,
                cell.row = report.row,
                cell.column = %report.column,
                "Rule outcome"
            );
        }

        if report.result.is_error() {
            warn!(
                rule_set.name = %self.rule_set.name(),
                cell.row = report.row,
                cell.column = %report.column,
                failure.message = %truncate_field(
                    report.result.message(),
                    self.log_config.max_field_length
                ),
                "Cell failed validation"
            );
        } else {
            log_debug!(
                self.log_config,
                cell.row = report.row,
                cell.column = %report.column,
                cell.valid = report.is_valid(),
                "Cell validated"
            );
        }
    }

    fn abandoned(&self, key: &CellKey) {
        self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
        log_scheduler!(
            self.log_config,
            cell.row = key.row,
            cell.column = %key.column,
            "Evaluation abandoned, result discarded"
        );
    }

    fn failed(&self, key: &CellKey, err: &GridError) {
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        error!(
            rule_set.name = %self.rule_set.name(),
            cell.row = key.row,
            cell.column = %key.column,
            error = %err,
            "Cell evaluation failed"
        );
    }

    /// Marks the evaluation `generation` of a cell as finished, clearing the
    /// cell's entry once nothing is pending or running for it.
    fn finish(&self, key: &CellKey, generation: u64) {
        let now_idle = {
            let mut cells = self.lock_cells();
            if let Some(state) = cells.get_mut(key) {
                if state
                    .current
                    .as_ref()
                    .is_some_and(|slot| slot.generation == generation)
                {
                    state.current = None;
                } else {
                    state.superseded_running = state.superseded_running.saturating_sub(1);
                }
                if state.is_idle() {
                    cells.remove(key);
                }
            }
            cells.is_empty()
        };
        if now_idle {
            self.idle.notify_waiters();
        }
    }

    fn abandon(&self, key: &CellKey, generation: u64) {
        self.finish(key, generation);
        self.abandoned(key);
    }
}
