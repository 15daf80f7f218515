//! quillpad — draft lifecycle and autosave engine for an email client.
//!
//! The compose side of a mail client, host-UI agnostic:
//! - [`domain`]: the [`domain::Draft`] record and its value types
//! - [`services`]: the debounced [`services::DraftAutosave`] controller and
//!   the [`services::Composer`] send path
//! - [`storage`]: the [`storage::DraftStore`] seam plus memory and SQLite
//!   implementations
//!
//! The host supplies persistence and delivery through traits and replaces
//! the draft wholesale on every edit; quillpad decides when (and whether)
//! anything is actually written.

pub mod domain;
pub mod services;
pub mod storage;

pub use domain::{
    AddressError, Attachment, AttachmentId, Draft, DraftId, EmailAddress, Priority,
    RecipientField,
};
pub use services::{
    AutosaveConfig, AutosaveStatus, Composer, DraftAutosave, Mailer, MemoryOutbox, SaveOutcome,
    SendError, ValidationIssue, DEFAULT_AUTOSAVE_INTERVAL,
};
pub use storage::{DraftStore, MemoryDraftStore, SqliteDraftStore};
