//! Undo support for reverting a run.
//!
//! An [`UndoStack`] holds the moves of one run in execution order. Undoing
//! replays them newest first, moving each file back to where it came from.
//! Undo is best-effort: a file that cannot be restored is reported and the
//! remaining actions still run.

use crate::error::{OrganizeError, OrganizeResult};
use crate::mover::{self, MoveAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the saved history inside the target folder.
pub const HISTORY_FILE: &str = ".dirsort_history.json";

/// A file that could not be moved back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoFailure {
    /// Where the file was expected to be.
    pub path: PathBuf,
    /// Where it should have gone.
    pub original_path: PathBuf,
    pub reason: String,
}

/// Represents the result of an undo operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoReport {
    /// Number of files successfully restored.
    pub restored: usize,
    pub failures: Vec<UndoFailure>,
}

impl UndoReport {
    /// Returns the total number of actions processed.
    pub fn total_processed(&self) -> usize {
        self.restored + self.failures.len()
    }

    /// Returns true if every action was restored.
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The moves performed by one run, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoStack {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    actions: Vec<MoveAction>,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoStack {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            actions: Vec::new(),
        }
    }

    /// Appends a performed move.
    pub fn record(&mut self, action: MoveAction) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[MoveAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Moves every recorded file back, newest first.
    ///
    /// A file whose original location is occupied, or that is no longer at
    /// its final path, is reported as a failure and left alone.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dirsort::undo::UndoStack;
    /// use std::path::Path;
    ///
    /// if let Some(stack) = UndoStack::load(Path::new("/path/to/target")).unwrap() {
    ///     let report = stack.undo_all();
    ///     println!("Restored {} files", report.restored);
    /// }
    /// ```
    pub fn undo_all(&self) -> UndoReport {
        let mut report = UndoReport::default();

        for action in self.actions.iter().rev() {
            match Self::restore(action) {
                Ok(()) => report.restored += 1,
                Err(reason) => {
                    warn!(
                        path = %action.final_path.display(),
                        %reason,
                        "Could not restore file"
                    );
                    report.failures.push(UndoFailure {
                        path: action.final_path.clone(),
                        original_path: action.original_path.clone(),
                        reason,
                    });
                }
            }
        }

        info!(
            restored = report.restored,
            failed = report.failures.len(),
            "Undo finished"
        );
        report
    }

    fn restore(action: &MoveAction) -> Result<(), String> {
        if !action.final_path.exists() {
            return Err("file not found at its organized location".to_string());
        }
        if action.original_path.exists() {
            return Err("original location is occupied".to_string());
        }
        mover::relocate(&action.final_path, &action.original_path, false).map_err(|e| e.to_string())
    }

    /// Returns the path to the history file for a target folder.
    pub fn history_file_path(target: &Path) -> PathBuf {
        target.join(HISTORY_FILE)
    }

    /// Writes this stack as the history of `target`.
    pub fn save(&self, target: &Path) -> OrganizeResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| OrganizeError::History(format!("JSON serialization failed: {}", e)))?;

        fs::create_dir_all(target).map_err(|e| OrganizeError::io("create", target, e))?;
        let history_path = Self::history_file_path(target);
        fs::write(&history_path, json).map_err(|e| OrganizeError::io("write", &history_path, e))
    }

    /// Loads the saved history of `target`, if any.
    pub fn load(target: &Path) -> OrganizeResult<Option<Self>> {
        let history_path = Self::history_file_path(target);
        if !history_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&history_path)
            .map_err(|e| OrganizeError::io("read", &history_path, e))?;
        let stack = serde_json::from_str(&json)
            .map_err(|e| OrganizeError::History(format!("JSON parse error: {}", e)))?;
        Ok(Some(stack))
    }

    /// Deletes the saved history of `target`.
    pub fn delete(target: &Path) -> OrganizeResult<()> {
        let history_path = Self::history_file_path(target);
        if history_path.exists() {
            fs::remove_file(&history_path)
                .map_err(|e| OrganizeError::io("remove", &history_path, e))?;
        }
        Ok(())
    }
}
