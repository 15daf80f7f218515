//! Domain types for the compose side of the client.
//!
//! The only entity here with real lifecycle semantics is [`Draft`]: it is
//! created empty (or hydrated from storage), mutated wholesale on every edit,
//! persisted through a [`crate::storage::DraftStore`], and finally sent or
//! discarded. Everything else is value types carried by the draft.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a draft.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftId(String);

impl DraftId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DraftId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DraftId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentId(String);

impl AttachmentId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AttachmentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AttachmentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error raised when parsing an email address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// The address is empty or whitespace.
    #[error("address is empty")]
    Empty,
    /// The address has no `@`, or more than one.
    #[error("address must contain exactly one '@': {0}")]
    MissingAt(String),
    /// Nothing before the `@`.
    #[error("address has an empty local part: {0}")]
    EmptyLocal(String),
    /// The domain is empty, has no dot, or contains whitespace.
    #[error("address has an invalid domain: {0}")]
    InvalidDomain(String),
}

/// A validated email address.
///
/// Construction goes through [`EmailAddress::parse`]; the inner string is
/// guaranteed to have a non-empty local part and a dotted domain. Comparison
/// is case-insensitive on the domain only, per the usual convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parses and validates an address.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }

        let mut parts = trimmed.splitn(2, '@');
        let local = parts.next().unwrap_or_default();
        let domain = match parts.next() {
            Some(d) => d,
            None => return Err(AddressError::MissingAt(trimmed.to_string())),
        };

        if local.is_empty() {
            return Err(AddressError::EmptyLocal(trimmed.to_string()));
        }
        if domain.contains('@') {
            return Err(AddressError::MissingAt(trimmed.to_string()));
        }
        if domain.is_empty()
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
            || domain.chars().any(char::is_whitespace)
        {
            return Err(AddressError::InvalidDomain(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Returns the full address.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the part before the `@`.
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }

    /// Returns the part after the `@`.
    pub fn domain(&self) -> &str {
        self.0.rsplit('@').next().unwrap_or_default()
    }
}

impl PartialEq for EmailAddress {
    fn eq(&self, other: &Self) -> bool {
        self.local_part() == other.local_part()
            && self.domain().eq_ignore_ascii_case(other.domain())
    }
}

impl Eq for EmailAddress {}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which recipient list an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecipientField {
    /// Primary recipients.
    To,
    /// Carbon copy.
    Cc,
    /// Blind carbon copy.
    Bcc,
}

/// Attachment metadata carried by a draft.
///
/// Only metadata lives here; the bytes themselves are the host's concern and
/// are referenced by [`Attachment::id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Unique ID referencing the stored bytes.
    pub id: AttachmentId,
    /// Original file name.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// MIME type, e.g. `application/pdf`.
    pub mime_type: String,
}

impl Attachment {
    /// Creates attachment metadata with a fresh id.
    pub fn new(name: impl Into<String>, size_bytes: u64, mime_type: impl Into<String>) -> Self {
        Self {
            id: AttachmentId::generate(),
            name: name.into(),
            size_bytes,
            mime_type: mime_type.into(),
        }
    }
}

/// Message priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    /// Normal delivery.
    #[default]
    Normal,
    /// Flagged as high priority.
    High,
}

/// The mutable in-progress message record being edited.
///
/// A draft is replaced wholesale on each edit (copy-on-write style) rather
/// than mutated behind shared references, so the autosave controller can
/// compare snapshots by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    /// Opaque identity, generated once at composer creation or supplied
    /// externally when reopening a stored draft.
    pub id: DraftId,
    /// Primary recipients, ordered, no duplicates.
    pub to: Vec<EmailAddress>,
    /// Cc recipients, ordered, no duplicates.
    pub cc: Vec<EmailAddress>,
    /// Bcc recipients, ordered, no duplicates.
    pub bcc: Vec<EmailAddress>,
    /// Subject line.
    pub subject: String,
    /// Message body text.
    pub body: String,
    /// Attachment metadata.
    pub attachments: Vec<Attachment>,
    /// Delivery priority.
    pub priority: Priority,
    /// Whether a read receipt is requested.
    pub read_receipt: bool,
    /// Optional scheduled-send time.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When the draft was last persisted; None until the first save.
    pub last_saved_at: Option<DateTime<Utc>>,
}

impl Draft {
    /// Creates an empty draft with a fresh id.
    pub fn new() -> Self {
        Self::with_id(DraftId::generate())
    }

    /// Creates an empty draft with the given id (hydration from storage).
    pub fn with_id(id: DraftId) -> Self {
        Self {
            id,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: String::new(),
            body: String::new(),
            attachments: Vec::new(),
            priority: Priority::default(),
            read_receipt: false,
            scheduled_at: None,
            last_saved_at: None,
        }
    }

    /// Returns the recipient list for a field.
    pub fn recipients(&self, field: RecipientField) -> &[EmailAddress] {
        match field {
            RecipientField::To => &self.to,
            RecipientField::Cc => &self.cc,
            RecipientField::Bcc => &self.bcc,
        }
    }

    fn recipients_mut(&mut self, field: RecipientField) -> &mut Vec<EmailAddress> {
        match field {
            RecipientField::To => &mut self.to,
            RecipientField::Cc => &mut self.cc,
            RecipientField::Bcc => &mut self.bcc,
        }
    }

    /// Appends an address to a recipient field.
    ///
    /// Returns false without modifying the draft if the address is already
    /// present in that field (duplicates are allowed across fields).
    pub fn add_recipient(&mut self, field: RecipientField, address: EmailAddress) -> bool {
        let list = self.recipients_mut(field);
        if list.contains(&address) {
            return false;
        }
        list.push(address);
        true
    }

    /// Removes an address from a recipient field; returns whether it was
    /// present.
    pub fn remove_recipient(&mut self, field: RecipientField, address: &EmailAddress) -> bool {
        let list = self.recipients_mut(field);
        let before = list.len();
        list.retain(|a| a != address);
        list.len() != before
    }

    /// Total recipient count across all three fields.
    pub fn recipient_count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    /// Whether the draft has no recipients, no subject, and no body.
    ///
    /// Blank drafts are never autosaved, so opening a composer and closing it
    /// untouched persists nothing. Attachments and settings alone do not make
    /// a draft non-blank.
    pub fn is_blank(&self) -> bool {
        self.recipient_count() == 0
            && self.subject.trim().is_empty()
            && self.body.trim().is_empty()
    }

    /// Structural content equality, ignoring `last_saved_at`.
    ///
    /// This is the dirty-check primitive: two snapshots compare equal exactly
    /// when no user-visible edit separates them, even if one of them has been
    /// persisted in the meantime.
    pub fn content_eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.to == other.to
            && self.cc == other.cc
            && self.bcc == other.bcc
            && self.subject == other.subject
            && self.body == other.body
            && self.attachments == other.attachments
            && self.priority == other.priority
            && self.read_receipt == other.read_receipt
            && self.scheduled_at == other.scheduled_at
    }
}

impl Default for Draft {
    fn default() -> Self {
        Self::new()
    }
}
