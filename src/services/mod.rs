//! Services coordinating drafts between the host UI and its seams.

pub mod autosave_service;
pub mod composer_service;

pub use autosave_service::{
    AutosaveConfig, AutosaveStatus, DraftAutosave, SaveOutcome, DEFAULT_AUTOSAVE_INTERVAL,
};
pub use composer_service::{
    validate, Composer, Mailer, MemoryOutbox, SendError, ValidationIssue,
};
