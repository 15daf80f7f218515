//! Debounced draft autosave.
//!
//! [`DraftAutosave`] keeps a [`crate::storage::DraftStore`] in sync with
//! in-memory edits without saving on every keystroke:
//! - trailing-edge debounce: each qualifying change cancels any pending
//!   deadline and arms a fresh one, so the save fires only after a full
//!   quiet window
//! - guarded save path: blank drafts and drafts identical to the last
//!   persisted snapshot are never written
//! - a final save attempt is issued when the editing session ends, whether
//!   through an explicit [`DraftAutosave::flush`] or by dropping the handle
//!
//! A single worker task owns the draft, the deadline slot, and the last
//! persisted snapshot. Saves are awaited inline by the worker, so a manual
//! save and a debounce expiry can never overlap; commands arriving while a
//! save is in flight queue up and act on the post-save state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::domain::Draft;
use crate::storage::DraftStore;

/// Default debounce window between the last edit and the autosave.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_millis(2000);

/// Autosave tuning.
#[derive(Debug, Clone)]
pub struct AutosaveConfig {
    /// Quiet period required after the last qualifying change before the
    /// draft is persisted.
    pub interval: Duration,
}

impl AutosaveConfig {
    /// Config with a custom debounce window.
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_AUTOSAVE_INTERVAL,
        }
    }
}

/// Result of one pass through the guarded save path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The draft was persisted.
    Saved,
    /// Nothing to do: the draft is blank or matches the last persisted
    /// snapshot.
    SkippedClean,
    /// The store rejected the save; the error was logged and the draft kept.
    Failed(String),
}

/// Observable controller state for UI feedback.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AutosaveStatus {
    /// A save is currently in flight.
    pub saving: bool,
    /// A debounce deadline is armed.
    pub pending: bool,
    /// Completion time of the most recent successful save.
    pub last_saved_at: Option<DateTime<Utc>>,
}

enum Command {
    Update(Draft),
    SaveNow(oneshot::Sender<SaveOutcome>),
    Snapshot(oneshot::Sender<Draft>),
    MarkDelivered,
    Flush(oneshot::Sender<SaveOutcome>),
    Discard,
}

/// Handle to a running autosave worker.
///
/// Cloning is cheap; all clones drive the same worker. When the last handle
/// drops, the worker issues one final guarded save and exits, so an edit in
/// progress survives an unmount without the host awaiting anything.
#[derive(Clone)]
pub struct DraftAutosave {
    tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<AutosaveStatus>,
}

impl DraftAutosave {
    /// Spawns a worker owning `draft`, persisting through `store`.
    ///
    /// A draft that has already been persisted (`last_saved_at` set) starts
    /// clean; a fresh draft starts with no snapshot and becomes dirty on the
    /// first non-blank content.
    pub fn spawn<S>(draft: Draft, store: Arc<S>, config: AutosaveConfig) -> Self
    where
        S: DraftStore + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(AutosaveStatus::default());

        let last_persisted = draft.last_saved_at.is_some().then(|| draft.clone());
        let worker = Worker {
            rx,
            status_tx,
            store,
            config,
            draft,
            last_persisted,
            deadline: None,
        };
        tokio::spawn(worker.run());

        Self { tx, status_rx }
    }

    /// Replaces the draft snapshot.
    ///
    /// Only a true content change (value inequality ignoring the save
    /// timestamp) re-arms the debounce deadline; replacing the draft with an
    /// identical value neither arms nor cancels anything.
    pub fn update_draft(&self, draft: Draft) {
        let _ = self.tx.send(Command::Update(draft));
    }

    /// Saves immediately, bypassing the debounce window.
    ///
    /// Runs the same guarded path as the timer, so a clean or blank draft
    /// still skips. Any pending deadline is cancelled.
    pub async fn save_now(&self) -> SaveOutcome {
        self.request(Command::SaveNow).await.unwrap_or_else(|| {
            SaveOutcome::Failed("autosave controller is closed".to_string())
        })
    }

    /// Returns a copy of the current draft, or None after teardown.
    pub async fn snapshot(&self) -> Option<Draft> {
        self.request(Command::Snapshot).await
    }

    /// Marks the current content as settled (sent), cancelling any pending
    /// deadline. Autosave re-arms only on a fresh content change.
    pub fn mark_delivered(&self) {
        let _ = self.tx.send(Command::MarkDelivered);
    }

    /// End-of-session save: cancels any pending deadline and issues exactly
    /// one final save attempt if the draft is dirty. The worker stays alive,
    /// so editing can resume afterwards.
    pub async fn flush(&self) -> SaveOutcome {
        self.request(Command::Flush).await.unwrap_or_else(|| {
            SaveOutcome::Failed("autosave controller is closed".to_string())
        })
    }

    /// Tears the worker down without a final save. Pending deadlines never
    /// fire after this.
    pub fn discard(&self) {
        let _ = self.tx.send(Command::Discard);
    }

    /// Current status snapshot.
    pub fn status(&self) -> AutosaveStatus {
        self.status_rx.borrow().clone()
    }

    /// Watch channel for status changes (saving flag, last-saved time).
    pub fn watch_status(&self) -> watch::Receiver<AutosaveStatus> {
        self.status_rx.clone()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(make(tx)).ok()?;
        rx.await.ok()
    }
}

struct Worker<S> {
    rx: mpsc::UnboundedReceiver<Command>,
    status_tx: watch::Sender<AutosaveStatus>,
    store: Arc<S>,
    config: AutosaveConfig,
    draft: Draft,
    last_persisted: Option<Draft>,
    deadline: Option<Instant>,
}

impl<S: DraftStore> Worker<S> {
    async fn run(mut self) {
        loop {
            let event = match self.deadline {
                Some(deadline) => tokio::select! {
                    cmd = self.rx.recv() => Some(cmd),
                    () = sleep_until(deadline) => None,
                },
                None => Some(self.rx.recv().await),
            };

            match event {
                // Debounce window elapsed with no further edits.
                None => {
                    self.clear_deadline();
                    self.save().await;
                }
                Some(Some(cmd)) => {
                    if !self.handle(cmd).await {
                        return;
                    }
                }
                // Every handle dropped: one best-effort final save.
                Some(None) => {
                    self.clear_deadline();
                    self.save().await;
                    debug!(draft = %self.draft.id, "autosave worker stopped");
                    return;
                }
            }
        }
    }

    /// Processes one command; returns false when the worker should stop.
    async fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Update(mut new) => {
                // The worker owns the save timestamp; hosts echo back stale
                // values when they replace the draft wholesale.
                new.last_saved_at = self.draft.last_saved_at;
                if !new.content_eq(&self.draft) {
                    self.draft = new;
                    if self.is_dirty() {
                        self.arm_deadline();
                    } else {
                        self.clear_deadline();
                    }
                }
            }
            Command::SaveNow(respond) => {
                self.clear_deadline();
                let outcome = self.save().await;
                let _ = respond.send(outcome);
            }
            Command::Snapshot(respond) => {
                let _ = respond.send(self.draft.clone());
            }
            Command::MarkDelivered => {
                self.clear_deadline();
                self.last_persisted = Some(self.draft.clone());
                debug!(draft = %self.draft.id, "draft content settled after send");
            }
            Command::Flush(respond) => {
                self.clear_deadline();
                let outcome = self.save().await;
                let _ = respond.send(outcome);
            }
            Command::Discard => {
                self.clear_deadline();
                debug!(draft = %self.draft.id, "draft discarded, no final save");
                return false;
            }
        }
        true
    }

    fn is_dirty(&self) -> bool {
        if self.draft.is_blank() {
            return false;
        }
        match &self.last_persisted {
            Some(snapshot) => !self.draft.content_eq(snapshot),
            None => true,
        }
    }

    fn arm_deadline(&mut self) {
        self.deadline = Some(Instant::now() + self.config.interval);
        self.status_tx.send_modify(|s| s.pending = true);
        debug!(
            draft = %self.draft.id,
            interval_ms = self.config.interval.as_millis() as u64,
            "autosave deadline armed"
        );
    }

    fn clear_deadline(&mut self) {
        if self.deadline.take().is_some() {
            self.status_tx.send_modify(|s| s.pending = false);
        }
    }

    /// The guarded save path shared by the timer, manual save, and flush.
    async fn save(&mut self) -> SaveOutcome {
        if !self.is_dirty() {
            return SaveOutcome::SkippedClean;
        }

        self.status_tx.send_modify(|s| s.saving = true);

        let mut candidate = self.draft.clone();
        let saved_at = Utc::now();
        candidate.last_saved_at = Some(saved_at);

        match self.store.save_draft(&candidate).await {
            Ok(()) => {
                self.draft = candidate.clone();
                self.last_persisted = Some(candidate);
                self.status_tx.send_modify(|s| {
                    s.saving = false;
                    s.last_saved_at = Some(saved_at);
                });
                info!(draft = %self.draft.id, "draft autosaved");
                SaveOutcome::Saved
            }
            Err(err) => {
                // The held draft keeps its previous timestamp; the user can
                // keep typing or retry manually.
                self.status_tx.send_modify(|s| s.saving = false);
                warn!(draft = %self.draft.id, error = %err, "draft save failed");
                SaveOutcome::Failed(err.to_string())
            }
        }
    }
}
