//! The organization engine.
//!
//! An [`Organizer`] owns one [`Configuration`] and drives a run through its
//! states: it scans the source folders, plans every move without touching the
//! filesystem, and then either stops (dry run) or executes the plan file by
//! file. Only one run may be active per organizer at a time.
//!
//! ```no_run
//! use dirsort::{Configuration, Organizer};
//! use std::path::PathBuf;
//!
//! let config = Configuration::new(vec![PathBuf::from("/home/me/Downloads")], "/home/me/Sorted");
//! let organizer = Organizer::new(config);
//!
//! let handle = organizer.start()?;
//! let report = handle.join()?;
//! println!("moved {} files", report.moved);
//!
//! let undo = organizer.undo(&report)?;
//! println!("restored {} files", undo.restored);
//! # Ok::<(), dirsort::OrganizeError>(())
//! ```

use crate::config::{CompiledFilters, Configuration, DuplicateStrategy};
use crate::duplicates::{DuplicateResolver, Resolution};
use crate::error::{ErrorKind, FileError, OrganizeError, OrganizeResult};
use crate::events::{self, Event, EventSender, FileOutcome};
use crate::file_category::{Category, Classifier, FileRecord, category_dir};
use crate::hash;
use crate::mover::Mover;
use crate::undo::{HISTORY_FILE, UndoReport, UndoStack};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Scanning,
    Planning,
    /// A dry run finished planning.
    Previewing,
    Executing,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    /// True while a run is scanning, planning, or executing.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RunState::Scanning | RunState::Planning | RunState::Executing
        )
    }
}

/// What the executor will do with one planned file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    /// Move to a free destination.
    Move,
    /// Overwrite the file at the destination.
    Replace,
    /// Leave the file where it is.
    Skip { reason: String },
    /// Planning failed for this file; it is reported, not moved.
    Unresolved(FileError),
}

impl PlanAction {
    pub fn is_move(&self) -> bool {
        matches!(self, PlanAction::Move | PlanAction::Replace)
    }
}

/// One file of a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    pub record: FileRecord,
    /// Final path after duplicate resolution. Equals the source for skips.
    pub destination: PathBuf,
    pub action: PlanAction,
}

/// The ordered list of moves a run will perform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganizationPlan {
    pub entries: Vec<PlanEntry>,
    /// Scanned files with identical content, filled when `find_duplicates` is set.
    pub duplicate_groups: Vec<Vec<PathBuf>>,
}

impl OrganizationPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of every inspected file.
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().filter_map(|e| e.record.size).sum()
    }

    /// Number of files per category label.
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.record.category.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn junk_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.record.category == Category::Junk.dir_name())
            .count()
    }

    pub fn move_count(&self) -> usize {
        self.entries.iter().filter(|e| e.action.is_move()).count()
    }

    pub fn skip_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.action, PlanAction::Skip { .. }))
            .count()
    }

    /// Files refused because they lie inside a protected folder.
    pub fn protected_count(&self) -> usize {
        self.unresolved()
            .filter(|error| error.kind == ErrorKind::Permission)
            .count()
    }

    pub fn duplicate_group_count(&self) -> usize {
        self.duplicate_groups.len()
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &FileError> {
        self.entries.iter().filter_map(|e| match &e.action {
            PlanAction::Unresolved(error) => Some(error),
            _ => None,
        })
    }
}

/// A point-in-time copy of the progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub processed: usize,
    pub moved: usize,
    pub skipped: usize,
    pub errored: usize,
}

/// Per-file counters updated by the worker.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    total: AtomicUsize,
    processed: AtomicUsize,
    moved: AtomicUsize,
    skipped: AtomicUsize,
    errored: AtomicUsize,
}

impl ProgressCounters {
    fn reset(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
        self.moved.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);
        self.errored.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            moved: self.moved.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
        }
    }
}

/// Cooperative cancellation flag, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Outcome of an executed (or previewed) run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Completed, Cancelled, or Previewing for dry runs.
    pub state: RunState,
    pub dry_run: bool,
    /// Files scanned.
    pub total: usize,
    pub moved: usize,
    pub skipped: usize,
    pub errored: usize,
    pub errors: Vec<FileError>,
    /// Empty folders removed from the sources.
    pub removed_dirs: usize,
    pub elapsed: Duration,
    /// The moves performed, for undo.
    pub undo: UndoStack,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.moved + self.skipped + self.errored
    }

    pub fn was_cancelled(&self) -> bool {
        self.state == RunState::Cancelled
    }

    /// Turns a cancelled report into [`OrganizeError::Cancelled`].
    pub fn completed(self) -> OrganizeResult<Self> {
        if self.was_cancelled() {
            Err(OrganizeError::Cancelled)
        } else {
            Ok(self)
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<RunState>,
    active: AtomicBool,
    cancel: CancelToken,
    progress: ProgressCounters,
}

impl Shared {
    fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: RunState, events: &EventSender) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        debug!(?state, "Run state changed");
        events.send(Event::StateChanged(state));
    }
}

/// Marks the organizer busy until dropped.
struct RunGuard {
    shared: Arc<Shared>,
}

impl RunGuard {
    fn acquire(shared: &Arc<Shared>) -> OrganizeResult<Self> {
        shared
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| OrganizeError::RunInProgress)?;
        Ok(Self {
            shared: Arc::clone(shared),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.shared.active.store(false, Ordering::Release);
    }
}

/// Drives classification, planning, moving, and undo for one configuration.
#[derive(Debug)]
pub struct Organizer {
    config: Configuration,
    shared: Arc<Shared>,
    events: EventSender,
}

impl Organizer {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(RunState::Idle),
                active: AtomicBool::new(false),
                cancel: CancelToken::new(),
                progress: ProgressCounters::default(),
            }),
            events: events::null_sender(),
        }
    }

    /// Publishes progress events to `events`.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.shared.state()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.shared.progress.snapshot()
    }

    /// Requests that the active run stop before its next file.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    /// Computes the plan without touching the filesystem.
    pub fn plan(&self) -> OrganizeResult<OrganizationPlan> {
        let _guard = RunGuard::acquire(&self.shared)?;
        let run = Run::new(&self.config, &self.shared, &self.events);
        let plan = run.prepare()?;
        self.shared.set_state(RunState::Previewing, &self.events);
        Ok(plan)
    }

    /// Runs on the calling thread until the run completes or is cancelled.
    pub fn execute(&self) -> OrganizeResult<RunReport> {
        let _guard = RunGuard::acquire(&self.shared)?;
        self.shared.cancel.reset();
        Run::new(&self.config, &self.shared, &self.events).execute()
    }

    /// Starts the run on a background worker.
    ///
    /// Fails with [`OrganizeError::RunInProgress`] while another run is active.
    pub fn start(&self) -> OrganizeResult<RunHandle> {
        let guard = RunGuard::acquire(&self.shared)?;
        self.shared.cancel.reset();

        let config = self.config.clone();
        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();

        let worker = thread::Builder::new()
            .name("dirsort-worker".to_string())
            .spawn(move || {
                let _guard = guard;
                Run::new(&config, &shared, &events).execute()
            })
            .map_err(|e| OrganizeError::io("spawn worker for", Path::new("."), e))?;

        Ok(RunHandle {
            worker,
            cancel: self.shared.cancel.clone(),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Reverses the moves of `report`, newest first.
    pub fn undo(&self, report: &RunReport) -> OrganizeResult<UndoReport> {
        let _guard = RunGuard::acquire(&self.shared)?;
        info!(actions = report.undo.len(), "Undoing run");
        Ok(report.undo.undo_all())
    }

    /// Removes empty folders under the sources without organizing anything.
    ///
    /// Only the sources must be valid; the target, when set, is left alone.
    pub fn cleanup_empty_dirs(&self) -> OrganizeResult<usize> {
        let _guard = RunGuard::acquire(&self.shared)?;
        self.config.validate_sources()?;

        let sources = absolute_sources(&self.config);
        let target = (!self.config.target.as_os_str().is_empty())
            .then(|| absolute(&self.config.target));
        let mover = Mover::new(&self.config.protected_dirs);

        let removed = remove_empty_dirs(&sources, target.as_deref(), &mover);
        info!(removed, "Empty folder cleanup finished");
        Ok(removed)
    }
}

/// A run executing on the background worker.
#[derive(Debug)]
pub struct RunHandle {
    worker: JoinHandle<OrganizeResult<RunReport>>,
    cancel: CancelToken,
    shared: Arc<Shared>,
}

impl RunHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.shared.progress.snapshot()
    }

    pub fn state(&self) -> RunState {
        self.shared.state()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Waits for the worker and returns its report.
    pub fn join(self) -> OrganizeResult<RunReport> {
        self.worker
            .join()
            .map_err(|_| OrganizeError::WorkerPanicked)?
    }
}

/// One pass over a configuration.
struct Run<'a> {
    config: &'a Configuration,
    shared: &'a Shared,
    events: &'a EventSender,
    mover: Mover,
}

impl<'a> Run<'a> {
    fn new(config: &'a Configuration, shared: &'a Shared, events: &'a EventSender) -> Self {
        Self {
            config,
            shared,
            events,
            mover: Mover::new(&config.protected_dirs),
        }
    }

    fn emit(&self, event: Event) {
        self.events.send(event);
    }

    fn set_state(&self, state: RunState) {
        self.shared.set_state(state, self.events);
    }

    /// Validates, scans, and plans.
    fn prepare(&self) -> OrganizeResult<OrganizationPlan> {
        let filters = match self
            .config
            .validate()
            .and_then(|()| {
                self.config
                    .compile_filters()
                    .map_err(OrganizeError::from)
            })
        {
            Ok(filters) => filters,
            Err(e) => {
                self.set_state(RunState::Failed);
                return Err(e);
            }
        };

        let sources = absolute_sources(self.config);
        let target = absolute(&self.config.target);
        let classifier = Classifier::new(self.config.mode, self.config.junk_threshold);

        self.set_state(RunState::Scanning);
        let records = self.scan(&sources, &target, &filters, &classifier);
        info!(files = records.len(), "Scan complete");
        self.emit(Event::ScanCompleted {
            files: records.len(),
        });

        self.set_state(RunState::Planning);
        let mut plan = self.build_plan(records, &target);
        if self.config.find_duplicates {
            let sized: Vec<(PathBuf, u64)> = plan
                .entries
                .iter()
                .filter_map(|e| e.record.size.map(|size| (e.record.path.clone(), size)))
                .collect();
            plan.duplicate_groups = hash::find_duplicate_groups(&sized);
        }
        info!(
            entries = plan.len(),
            moves = plan.move_count(),
            skips = plan.skip_count(),
            protected = plan.protected_count(),
            duplicate_groups = plan.duplicate_group_count(),
            "Plan ready"
        );
        self.emit(Event::PlanReady {
            entries: plan.len(),
        });
        Ok(plan)
    }

    fn scan(
        &self,
        sources: &[PathBuf],
        target: &Path,
        filters: &CompiledFilters,
        classifier: &Classifier,
    ) -> Vec<FileRecord> {
        let max_depth = if self.config.recursive { usize::MAX } else { 1 };
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for source in sources {
            let skip_target = target.starts_with(source) && target != source.as_path();

            let walker = WalkDir::new(source)
                .min_depth(1)
                .max_depth(max_depth)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| {
                    if !e.file_type().is_dir() {
                        return true;
                    }
                    if skip_target && e.path() == target {
                        return false;
                    }
                    let relative = e.path().strip_prefix(source).unwrap_or(e.path());
                    filters.should_descend(relative)
                });

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(source = %source.display(), error = %e, "Skipping unreadable entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() || entry.file_name() == HISTORY_FILE {
                    continue;
                }

                let path = entry.path();
                let relative = path.strip_prefix(source).unwrap_or(path);
                if !filters.should_include(relative) {
                    debug!(path = %path.display(), "Excluded by filters");
                    continue;
                }
                if seen.insert(path.to_path_buf()) {
                    records.push(classifier.inspect(path));
                }
            }
        }

        records
    }

    fn build_plan(&self, records: Vec<FileRecord>, target: &Path) -> OrganizationPlan {
        let resolver = DuplicateResolver::new(self.config.duplicates, target);
        let renamer = DuplicateResolver::new(DuplicateStrategy::Rename, target);
        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut entries = Vec::with_capacity(records.len());

        for record in records {
            let computed = category_dir(target, &record.category).join(record.file_name());

            let (destination, action) = if self.mover.is_protected(&record.path) {
                let refusal = OrganizeError::protected(&record.path);
                let error = FileError::new(&record.path, &refusal);
                debug!(path = %record.path.display(), "File is inside a protected folder");
                (record.path.clone(), PlanAction::Unresolved(error))
            } else if computed == record.path {
                (
                    record.path.clone(),
                    PlanAction::Skip {
                        reason: "already in place".to_string(),
                    },
                )
            } else {
                let is_taken = |p: &Path| claimed.contains(p) || p.exists();
                // Replace only overwrites files that were there before the run
                let resolver = if resolver.strategy() == DuplicateStrategy::Replace
                    && claimed.contains(&computed)
                {
                    &renamer
                } else {
                    &resolver
                };
                if is_taken(&computed) {
                    match resolver.resolve(&computed, is_taken) {
                        Ok(Resolution::MoveTo(path)) => (path, PlanAction::Move),
                        Ok(Resolution::Replace(path)) => (path, PlanAction::Replace),
                        Ok(Resolution::Skip) => (
                            record.path.clone(),
                            PlanAction::Skip {
                                reason: "destination already exists".to_string(),
                            },
                        ),
                        Err(e) => {
                            warn!(path = %record.path.display(), error = %e, "Could not resolve collision");
                            let error = FileError::new(&record.path, &e);
                            (computed, PlanAction::Unresolved(error))
                        }
                    }
                } else {
                    (computed, PlanAction::Move)
                }
            };

            if action.is_move() {
                claimed.insert(destination.clone());
            }
            debug!(
                path = %record.path.display(),
                destination = %destination.display(),
                ?action,
                "Planned file"
            );
            entries.push(PlanEntry {
                record,
                destination,
                action,
            });
        }

        OrganizationPlan {
            entries,
            duplicate_groups: Vec::new(),
        }
    }

    fn execute(&self) -> OrganizeResult<RunReport> {
        let started = Instant::now();
        let plan = self.prepare()?;
        let progress = &self.shared.progress;
        progress.reset(plan.len());

        if self.config.dry_run {
            self.set_state(RunState::Previewing);
            let errors: Vec<FileError> = plan.unresolved().cloned().collect();
            return Ok(RunReport {
                state: RunState::Previewing,
                dry_run: true,
                total: plan.len(),
                moved: plan.move_count(),
                skipped: plan.skip_count(),
                errored: errors.len(),
                errors,
                removed_dirs: 0,
                elapsed: started.elapsed(),
                undo: UndoStack::new(),
            });
        }

        self.set_state(RunState::Executing);
        let mut undo = UndoStack::new();
        let mut errors = Vec::new();
        let mut cancelled = false;

        for entry in &plan.entries {
            if self.shared.cancel.is_cancelled() {
                info!("Run cancelled, stopping before next file");
                cancelled = true;
                break;
            }

            let source = &entry.record.path;
            let outcome = match &entry.action {
                PlanAction::Skip { .. } => {
                    progress.skipped.fetch_add(1, Ordering::Relaxed);
                    FileOutcome::Skipped
                }
                PlanAction::Unresolved(error) => {
                    progress.errored.fetch_add(1, Ordering::Relaxed);
                    errors.push(error.clone());
                    FileOutcome::Failed {
                        message: error.message.clone(),
                    }
                }
                PlanAction::Move | PlanAction::Replace => {
                    let overwrite = entry.action == PlanAction::Replace;
                    match self.mover.move_file(source, &entry.destination, overwrite) {
                        Ok(action) => {
                            undo.record(action);
                            progress.moved.fetch_add(1, Ordering::Relaxed);
                            FileOutcome::Moved {
                                destination: entry.destination.clone(),
                            }
                        }
                        Err(e) => {
                            warn!(path = %source.display(), error = %e, "Failed to move file");
                            let error = FileError::new(source, &e);
                            let message = error.message.clone();
                            errors.push(error);
                            progress.errored.fetch_add(1, Ordering::Relaxed);
                            FileOutcome::Failed { message }
                        }
                    }
                }
            };

            progress.processed.fetch_add(1, Ordering::Relaxed);
            self.emit(Event::FileProcessed {
                path: source.clone(),
                outcome,
                progress: progress.snapshot(),
            });
        }

        let removed_dirs = if self.config.remove_empty_dirs && !cancelled {
            let sources = absolute_sources(self.config);
            let target = absolute(&self.config.target);
            remove_empty_dirs(&sources, Some(&target), &self.mover)
        } else {
            0
        };

        let state = if cancelled {
            RunState::Cancelled
        } else {
            RunState::Completed
        };
        self.set_state(state);
        self.emit(Event::RunFinished { state });

        let snapshot = progress.snapshot();
        let report = RunReport {
            state,
            dry_run: false,
            total: plan.len(),
            moved: snapshot.moved,
            skipped: snapshot.skipped,
            errored: snapshot.errored,
            errors,
            removed_dirs,
            elapsed: started.elapsed(),
            undo,
        };
        info!(
            ?state,
            moved = report.moved,
            skipped = report.skipped,
            errored = report.errored,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Run finished"
        );
        Ok(report)
    }
}

/// Removes folders left empty under `sources`, deepest first.
///
/// Never removes a source root, the target or anything inside or above it, or
/// anything inside a protected folder.
fn remove_empty_dirs(sources: &[PathBuf], target: Option<&Path>, mover: &Mover) -> usize {
    let mut removed = 0;

    for source in sources {
        let walker = WalkDir::new(source)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_entry(|e| !mover.is_protected(e.path()));

        for entry in walker.filter_map(Result::ok) {
            let path = entry.path();
            if !entry.file_type().is_dir() {
                continue;
            }
            if let Some(target) = target
                && (path.starts_with(target) || target.starts_with(path))
            {
                continue;
            }
            if fs::remove_dir(path).is_ok() {
                debug!(path = %path.display(), "Removed empty folder");
                removed += 1;
            }
        }
    }

    removed
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn absolute_sources(config: &Configuration) -> Vec<PathBuf> {
    config.sources.iter().map(PathBuf::as_path).map(absolute).collect()
}
