//! dirsort - a file organization engine
//!
//! Classifies the files of one or more source folders (by type, date, size, or
//! extension), plans where each one goes under a target folder, resolves name
//! collisions, moves the files, and can undo the whole run afterwards.

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod events;
pub mod file_category;
pub mod hash;
pub mod logging;
pub mod mover;
pub mod organizer;
pub mod output;
pub mod undo;

pub use config::{Configuration, ConfigError, DuplicateStrategy, OrganizationMode};
pub use duplicates::{DuplicateResolver, Resolution};
pub use error::{ErrorKind, FileError, OrganizeError, OrganizeResult};
pub use events::{Event, EventReceiver, EventSender, FileOutcome};
pub use file_category::{Category, Classifier, FileMapper, FileRecord};
pub use mover::{MoveAction, Mover};
pub use organizer::{
    CancelToken, OrganizationPlan, Organizer, PlanAction, PlanEntry, ProgressSnapshot, RunHandle,
    RunReport, RunState,
};
pub use undo::{UndoReport, UndoStack};
