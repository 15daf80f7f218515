//! Compose orchestration: validation and the send path.
//!
//! [`Composer`] wraps a [`DraftAutosave`] handle together with a [`Mailer`]
//! seam. Sending snapshots the current draft (priority, read receipt, and
//! schedule are already fields on it), validates, and hands the whole draft
//! to the transport as one unit. On success the autosave content is marked
//! delivered so the debounce never re-arms for the sent text; on failure the
//! draft is retained, dirty state intact, and the error is returned for a
//! user-facing alert.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::info;

use crate::domain::Draft;
use crate::services::autosave_service::{AutosaveConfig, AutosaveStatus, DraftAutosave, SaveOutcome};
use crate::storage::DraftStore;

/// Delivery seam supplied by the host.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    /// Attempts delivery of the draft as one unit.
    async fn send(&self, draft: &Draft) -> Result<()>;
}

/// Pre-send validation findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
    /// No address in To, Cc, or Bcc. Always blocks the send.
    NoRecipients,
    /// Empty subject line. Sendable once the user confirms.
    EmptySubject,
}

impl ValidationIssue {
    /// Whether the issue blocks sending outright.
    pub fn is_blocking(&self) -> bool {
        matches!(self, ValidationIssue::NoRecipients)
    }

    /// Human-readable message for the host UI.
    pub fn message(&self) -> &'static str {
        match self {
            ValidationIssue::NoRecipients => "add at least one recipient",
            ValidationIssue::EmptySubject => "subject is empty",
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Validates a draft for sending.
///
/// Validation never travels through the save path; autosave happily persists
/// drafts that would fail here.
pub fn validate(draft: &Draft) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if draft.recipient_count() == 0 {
        issues.push(ValidationIssue::NoRecipients);
    }
    if draft.subject.trim().is_empty() {
        issues.push(ValidationIssue::EmptySubject);
    }
    issues
}

/// Why a send did not happen.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// A blocking validation issue.
    #[error("cannot send: {0}")]
    Invalid(ValidationIssue),
    /// A confirmable issue the user has not accepted yet; retry with
    /// [`Composer::send_confirmed`] once they have.
    #[error("confirmation required: {0}")]
    NeedsConfirmation(ValidationIssue),
    /// The transport rejected the message; the draft is retained.
    #[error("delivery failed: {0}")]
    Transport(#[source] anyhow::Error),
    /// The composer was discarded or torn down.
    #[error("composer is closed")]
    Closed,
}

/// Compose session: autosaved draft custody plus the send path.
pub struct Composer<M: Mailer> {
    autosave: DraftAutosave,
    mailer: Arc<M>,
}

impl<M: Mailer> Composer<M> {
    /// Starts a compose session around `draft`.
    pub fn new<S>(draft: Draft, store: Arc<S>, mailer: Arc<M>, config: AutosaveConfig) -> Self
    where
        S: DraftStore + 'static,
    {
        Self {
            autosave: DraftAutosave::spawn(draft, store, config),
            mailer,
        }
    }

    /// The underlying autosave handle, for status watching.
    pub fn autosave(&self) -> &DraftAutosave {
        &self.autosave
    }

    /// Replaces the draft after an edit. See [`DraftAutosave::update_draft`].
    pub fn update_draft(&self, draft: Draft) {
        self.autosave.update_draft(draft);
    }

    /// Explicit "Save Draft": immediate guarded save, no debounce wait.
    pub async fn save_now(&self) -> SaveOutcome {
        self.autosave.save_now().await
    }

    /// Returns a copy of the current draft.
    pub async fn draft(&self) -> Option<Draft> {
        self.autosave.snapshot().await
    }

    /// Current autosave status (saving flag, last-saved time).
    pub fn status(&self) -> AutosaveStatus {
        self.autosave.status()
    }

    /// Sends the current draft. Confirmable issues (empty subject) are
    /// treated as unaccepted and returned as
    /// [`SendError::NeedsConfirmation`].
    pub async fn send(&self) -> Result<(), SendError> {
        self.send_inner(false).await
    }

    /// Sends the current draft with confirmable issues accepted by the user.
    pub async fn send_confirmed(&self) -> Result<(), SendError> {
        self.send_inner(true).await
    }

    async fn send_inner(&self, confirmed: bool) -> Result<(), SendError> {
        let draft = self.autosave.snapshot().await.ok_or(SendError::Closed)?;

        for issue in validate(&draft) {
            if issue.is_blocking() {
                return Err(SendError::Invalid(issue));
            }
            if !confirmed {
                return Err(SendError::NeedsConfirmation(issue));
            }
        }

        self.mailer
            .send(&draft)
            .await
            .map_err(SendError::Transport)?;

        self.autosave.mark_delivered();
        info!(draft = %draft.id, recipients = draft.recipient_count(), "draft sent");
        Ok(())
    }

    /// End-of-session save; see [`DraftAutosave::flush`].
    pub async fn flush(&self) -> SaveOutcome {
        self.autosave.flush().await
    }

    /// Discards the draft: tears the session down without a final save.
    pub fn discard(self) {
        self.autosave.discard();
    }
}

/// In-memory [`Mailer`] for tests and embedding hosts.
#[derive(Default)]
pub struct MemoryOutbox {
    sent: RwLock<Vec<Draft>>,
}

impl MemoryOutbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drafts delivered so far, in send order.
    pub async fn sent(&self) -> Vec<Draft> {
        self.sent.read().await.clone()
    }

    /// Number of delivered drafts.
    pub async fn len(&self) -> usize {
        self.sent.read().await.len()
    }

    /// Whether nothing has been delivered.
    pub async fn is_empty(&self) -> bool {
        self.sent.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl Mailer for MemoryOutbox {
    async fn send(&self, draft: &Draft) -> Result<()> {
        self.sent.write().await.push(draft.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EmailAddress, Priority, RecipientField};
    use crate::storage::MemoryDraftStore;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct FailingMailer;

    #[async_trait::async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _draft: &Draft) -> Result<()> {
            anyhow::bail!("smtp 451: try again later")
        }
    }

    fn addr(s: &str) -> EmailAddress {
        EmailAddress::parse(s).unwrap()
    }

    fn sendable_draft() -> Draft {
        let mut draft = Draft::new();
        draft.add_recipient(RecipientField::To, addr("a@example.com"));
        draft.subject = "Status update".to_string();
        draft.body = "All green.".to_string();
        draft
    }

    fn composer<M: Mailer>(draft: Draft, mailer: Arc<M>) -> (Composer<M>, Arc<MemoryDraftStore>) {
        let store = Arc::new(MemoryDraftStore::new());
        let composer = Composer::new(draft, Arc::clone(&store), mailer, AutosaveConfig::default());
        (composer, store)
    }

    #[test]
    fn validation_findings() {
        let mut draft = Draft::new();
        assert_eq!(
            validate(&draft),
            vec![ValidationIssue::NoRecipients, ValidationIssue::EmptySubject]
        );
        assert!(ValidationIssue::NoRecipients.is_blocking());
        assert!(!ValidationIssue::EmptySubject.is_blocking());

        draft.add_recipient(RecipientField::Bcc, addr("a@example.com"));
        assert_eq!(validate(&draft), vec![ValidationIssue::EmptySubject]);

        draft.subject = "hi".to_string();
        assert!(validate(&draft).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn send_without_recipients_is_blocked() {
        let outbox = Arc::new(MemoryOutbox::new());
        let mut draft = Draft::new();
        draft.subject = "orphan".to_string();
        let (composer, _store) = composer(draft, Arc::clone(&outbox));

        let err = composer.send().await.unwrap_err();
        assert!(matches!(err, SendError::Invalid(ValidationIssue::NoRecipients)));
        assert!(outbox.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_subject_requires_confirmation() {
        let outbox = Arc::new(MemoryOutbox::new());
        let mut draft = Draft::new();
        draft.add_recipient(RecipientField::To, addr("a@example.com"));
        draft.body = "no subject, sorry".to_string();
        let (composer, _store) = composer(draft, Arc::clone(&outbox));

        let err = composer.send().await.unwrap_err();
        assert!(matches!(
            err,
            SendError::NeedsConfirmation(ValidationIssue::EmptySubject)
        ));
        assert!(outbox.is_empty().await);

        composer.send_confirmed().await.unwrap();
        assert_eq!(outbox.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_send_settles_autosave() {
        let outbox = Arc::new(MemoryOutbox::new());
        let mut draft = sendable_draft();
        draft.priority = Priority::High;
        draft.read_receipt = true;
        let (composer, store) = composer(draft, Arc::clone(&outbox));

        composer.send().await.unwrap();

        let sent = outbox.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].priority, Priority::High);
        assert!(sent[0].read_receipt);

        // Nothing dirty remains: flush has nothing to persist.
        assert_eq!(composer.flush().await, SaveOutcome::SkippedClean);
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_retains_the_draft() {
        let (composer, store) = composer(sendable_draft(), Arc::new(FailingMailer));

        let err = composer.send().await.unwrap_err();
        assert!(matches!(err, SendError::Transport(_)));

        // Draft intact and still dirty: the end-of-session flush persists it.
        let draft = composer.draft().await.unwrap();
        assert_eq!(draft.subject, "Status update");
        assert_eq!(composer.flush().await, SaveOutcome::Saved);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn discard_skips_the_final_save() {
        let outbox = Arc::new(MemoryOutbox::new());
        let (composer, store) = composer(sendable_draft(), outbox);

        composer.discard();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(store.is_empty().await);
    }
}
