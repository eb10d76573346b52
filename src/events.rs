//! Progress events published by a running organizer.
//!
//! The worker sends events through a crossbeam channel so any caller (the
//! CLI, a GUI, a test) can follow along without sharing state with the run.

use crate::organizer::{ProgressSnapshot, RunState};
use crossbeam_channel::{Receiver, Sender, bounded as bounded_channel, unbounded};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileOutcome {
    Moved { destination: PathBuf },
    Skipped,
    Failed { message: String },
}

/// All events emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// The organizer entered a new state.
    StateChanged(RunState),
    /// Scanning found this many files.
    ScanCompleted { files: usize },
    /// The plan is ready.
    PlanReady { entries: usize },
    /// One file has been handled.
    FileProcessed {
        path: PathBuf,
        outcome: FileOutcome,
        progress: ProgressSnapshot,
    },
    /// The run reached a final state.
    RunFinished { state: RunState },
}

/// Sends events from the organizer.
#[derive(Clone, Debug)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Send an event. A dropped receiver is ignored.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }
}

/// Receives events from the organizer.
#[derive(Debug)]
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Block until the next event, `None` once every sender is gone.
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    pub fn try_recv(&self) -> Option<Event> {
        self.inner.try_recv().ok()
    }

    /// Wait at most `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        self.inner.recv_timeout(timeout).ok()
    }

    /// Iterates until every sender is dropped.
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

/// Creates a connected sender and receiver.
pub fn channel() -> (EventSender, EventReceiver) {
    let (sender, receiver) = unbounded();
    (
        EventSender { inner: sender },
        EventReceiver { inner: receiver },
    )
}

/// Creates a channel holding at most `capacity` events.
///
/// The worker blocks once it is full, so a capacity of zero keeps it in lock
/// step with the receiver.
pub fn bounded(capacity: usize) -> (EventSender, EventReceiver) {
    let (sender, receiver) = bounded_channel(capacity);
    (
        EventSender { inner: sender },
        EventReceiver { inner: receiver },
    )
}

/// A sender whose events go nowhere.
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = channel();
    sender
}
