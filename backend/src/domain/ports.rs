//! Ports through which the domain reaches the outside world.
//!
//! Handlers and validators depend on these traits; the concrete store and
//! mail adapters live under `outbound` and are wired in at startup.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::record::{Record, Rid};
use super::schema::EntityKind;

/// Failures surfaced by the document store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("store returned an unreadable response: {0}")]
    Malformed(String),
    #[error("store credentials were rejected")]
    Unauthorized,
}

/// Failures surfaced by the mail adapter.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to compose message: {0}")]
    Compose(String),
    #[error("failed to send message: {0}")]
    Transport(String),
}

/// Optional list-shaping parameters taken from the request query string.
///
/// `filter_fields` is a comma list of field names combined with OR against a
/// case-insensitive prefix match on `filter_value`; `condition` is an extra
/// boolean expression AND-ed onto the scope; `fields` restricts the
/// projection (defaults to all declared fields).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListOptions {
    pub condition: Option<String>,
    pub filter_fields: Option<String>,
    pub filter_value: Option<String>,
    pub order: Option<String>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub fields: Option<String>,
}

/// An outgoing mail message. `attachment` carries a PDF payload with its
/// file name when a generated report is mailed out.
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<(String, Vec<u8>)>,
}

/// Read-side checks the validator needs against live data.
#[async_trait]
pub trait RecordLookup: Send + Sync {
    /// Whether any record of `kind` matches every `(field, value)` pair in
    /// `conditions`, excluding `exclude_uid` (the record being updated) and
    /// scoped to `owner` for owner-scoped entities.
    async fn exists_matching(
        &self,
        kind: EntityKind,
        conditions: &[(&str, String)],
        exclude_uid: Option<&Rid>,
        owner: Option<&Rid>,
    ) -> Result<bool, StoreError>;

    /// Whether a record of `kind` with the given identifier exists and is
    /// visible to `owner`.
    async fn exists_uid(
        &self,
        kind: EntityKind,
        rid: &Rid,
        owner: Option<&Rid>,
    ) -> Result<bool, StoreError>;
}

/// The document store port. One implementation speaks the store's REST
/// dialect; the test fake keeps everything in memory.
#[async_trait]
pub trait StorePort: RecordLookup {
    /// Records of `kind` visible to `owner`, shaped by `options`.
    async fn list(
        &self,
        kind: EntityKind,
        owner: Option<&Rid>,
        options: &ListOptions,
    ) -> Result<Vec<Record>, StoreError>;

    /// Count under the same condition set as [`Self::list`].
    async fn count(
        &self,
        kind: EntityKind,
        owner: Option<&Rid>,
        options: &ListOptions,
    ) -> Result<u64, StoreError>;

    /// A single record by identifier, or `None` when absent or invisible.
    async fn get(
        &self,
        kind: EntityKind,
        rid: &Rid,
        owner: Option<&Rid>,
    ) -> Result<Option<Record>, StoreError>;

    /// Insert a new record; returns it with the assigned identifier.
    async fn insert(
        &self,
        kind: EntityKind,
        record: &Record,
        owner: Option<&Rid>,
    ) -> Result<Record, StoreError>;

    /// Merge-update an existing record.
    async fn update(
        &self,
        kind: EntityKind,
        rid: &Rid,
        record: &Record,
        owner: Option<&Rid>,
    ) -> Result<(), StoreError>;

    /// Delete the given records, clearing inbound references first.
    /// Returns the number of records actually removed.
    async fn delete(
        &self,
        kind: EntityKind,
        rids: &[Rid],
        owner: Option<&Rid>,
    ) -> Result<u64, StoreError>;

    /// First record of `kind` carrying `value` in `field`, unscoped.
    async fn find_by_field(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>, StoreError>;

    /// Resolve credentials to the matching active user record.
    async fn authenticate(
        &self,
        name: &str,
        password_hash: &str,
    ) -> Result<Option<Record>, StoreError>;

    /// Invoke a server-side stored procedure by path; returns its result
    /// rows as raw JSON (report aggregation, reference cleanup).
    async fn call_function(&self, path: &str) -> Result<Vec<serde_json::Value>, StoreError>;
}

/// Outbound mail port.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}
