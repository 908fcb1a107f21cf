//! Test utilities shared by unit tests (in `src/`) and integration tests
//! (in `tests/`). Compiled only with the `test-support` feature.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::domain::ports::{
    ListOptions, MailError, MailMessage, Mailer, RecordLookup, StoreError, StorePort,
};
use crate::domain::record::{Record, Rid};
use crate::domain::schema::EntityKind;

struct StoredRecord {
    rid: Rid,
    owner: Option<Rid>,
    record: Record,
}

#[derive(Default)]
struct Inner {
    next_position: i64,
    records: HashMap<EntityKind, Vec<StoredRecord>>,
    function_rows: Vec<Value>,
    function_calls: Vec<String>,
}

/// In-memory [`StorePort`] implementation.
///
/// Honours owner scoping, uniqueness probes, prefix filtering, paging, and
/// identifier assignment; the raw `condition` option is not interpreted.
/// Stored-procedure calls return rows scripted via
/// [`FakeStore::script_function_rows`] and are recorded for inspection.
#[derive(Default)]
pub struct FakeStore {
    inner: Mutex<Inner>,
}

fn cluster_of(kind: EntityKind) -> i64 {
    match kind {
        EntityKind::Company => 11,
        EntityKind::Account => 12,
        EntityKind::Income => 13,
        EntityKind::Spending => 14,
        EntityKind::Report => 15,
        EntityKind::User => 16,
    }
}

fn visible(kind: EntityKind, stored: &StoredRecord, owner: Option<&Rid>) -> bool {
    if !kind.owner_scoped() {
        return true;
    }
    match owner {
        Some(owner) => stored.owner.as_ref() == Some(owner),
        None => false,
    }
}

fn matches_filter(record: &Record, options: &ListOptions) -> bool {
    let (Some(fields), Some(value)) = (
        options.filter_fields.as_deref(),
        options.filter_value.as_deref(),
    ) else {
        return true;
    };
    if value.trim().is_empty() {
        return true;
    }
    let needle = value.trim().to_lowercase();
    fields.split(',').map(str::trim).any(|field| {
        record
            .text(field)
            .is_some_and(|text| text.to_lowercase().starts_with(&needle))
    })
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a record directly, bypassing validation. Returns the
    /// assigned identifier.
    pub fn insert_direct(&self, kind: EntityKind, owner: Option<&Rid>, record: Record) -> Rid {
        let mut inner = self.lock();
        inner.next_position += 1;
        let token = format!("{}_{}", cluster_of(kind), inner.next_position);
        let Some(rid) = Rid::parse(&token) else {
            unreachable!("generated identifier is well-formed");
        };
        let mut stored = record;
        stored.set_uid(&rid);
        inner.records.entry(kind).or_default().push(StoredRecord {
            rid,
            owner: owner.copied(),
            record: stored,
        });
        rid
    }

    /// Script the rows returned by [`StorePort::call_function`].
    pub fn script_function_rows(&self, rows: Vec<Value>) {
        self.lock().function_rows = rows;
    }

    /// The function paths invoked so far, in order.
    pub fn function_calls(&self) -> Vec<String> {
        self.lock().function_calls.clone()
    }

    fn selected(
        &self,
        kind: EntityKind,
        owner: Option<&Rid>,
        options: &ListOptions,
    ) -> Vec<Record> {
        let inner = self.lock();
        inner
            .records
            .get(&kind)
            .map(|stored| {
                stored
                    .iter()
                    .filter(|entry| visible(kind, entry, owner))
                    .filter(|entry| matches_filter(&entry.record, options))
                    .map(|entry| entry.record.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordLookup for FakeStore {
    async fn exists_matching(
        &self,
        kind: EntityKind,
        conditions: &[(&str, String)],
        exclude_uid: Option<&Rid>,
        owner: Option<&Rid>,
    ) -> Result<bool, StoreError> {
        let inner = self.lock();
        let Some(stored) = inner.records.get(&kind) else {
            return Ok(false);
        };
        Ok(stored.iter().any(|entry| {
            if !visible(kind, entry, owner) {
                return false;
            }
            if exclude_uid == Some(&entry.rid) {
                return false;
            }
            conditions.iter().all(|(field, value)| {
                entry.record.text(field).as_deref() == Some(value.as_str())
            })
        }))
    }

    async fn exists_uid(
        &self,
        kind: EntityKind,
        rid: &Rid,
        owner: Option<&Rid>,
    ) -> Result<bool, StoreError> {
        Ok(self.get(kind, rid, owner).await?.is_some())
    }
}

#[async_trait]
impl StorePort for FakeStore {
    async fn list(
        &self,
        kind: EntityKind,
        owner: Option<&Rid>,
        options: &ListOptions,
    ) -> Result<Vec<Record>, StoreError> {
        let mut records = self.selected(kind, owner, options);
        if let Some(order) = options.order.as_deref() {
            let field = order.split_whitespace().next().unwrap_or_default().to_owned();
            records.sort_by_key(|record| record.text(&field).unwrap_or_default());
            if order.to_lowercase().ends_with("desc") {
                records.reverse();
            }
        }
        let skip = options.skip.unwrap_or(0) as usize;
        let mut records: Vec<Record> = records.into_iter().skip(skip).collect();
        if let Some(limit) = options.limit {
            records.truncate(limit as usize);
        }
        Ok(records)
    }

    async fn count(
        &self,
        kind: EntityKind,
        owner: Option<&Rid>,
        options: &ListOptions,
    ) -> Result<u64, StoreError> {
        Ok(self.selected(kind, owner, options).len() as u64)
    }

    async fn get(
        &self,
        kind: EntityKind,
        rid: &Rid,
        owner: Option<&Rid>,
    ) -> Result<Option<Record>, StoreError> {
        let inner = self.lock();
        Ok(inner.records.get(&kind).and_then(|stored| {
            stored
                .iter()
                .find(|entry| entry.rid == *rid && visible(kind, entry, owner))
                .map(|entry| entry.record.clone())
        }))
    }

    async fn insert(
        &self,
        kind: EntityKind,
        record: &Record,
        owner: Option<&Rid>,
    ) -> Result<Record, StoreError> {
        let rid = self.insert_direct(kind, owner, record.clone());
        let mut created = record.clone();
        created.set_uid(&rid);
        Ok(created)
    }

    async fn update(
        &self,
        kind: EntityKind,
        rid: &Rid,
        record: &Record,
        owner: Option<&Rid>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(stored) = inner.records.get_mut(&kind) {
            for entry in stored.iter_mut() {
                if entry.rid == *rid && visible(kind, entry, owner) {
                    entry.record.merge(record.clone());
                    entry.record.set_uid(rid);
                }
            }
        }
        Ok(())
    }

    async fn delete(
        &self,
        kind: EntityKind,
        rids: &[Rid],
        owner: Option<&Rid>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        let Some(stored) = inner.records.get_mut(&kind) else {
            return Ok(0);
        };
        let before = stored.len();
        stored.retain(|entry| !(rids.contains(&entry.rid) && visible(kind, entry, owner)));
        Ok((before - stored.len()) as u64)
    }

    async fn find_by_field(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>, StoreError> {
        let inner = self.lock();
        Ok(inner.records.get(&kind).and_then(|stored| {
            stored
                .iter()
                .find(|entry| entry.record.text(field).as_deref() == Some(value))
                .map(|entry| entry.record.clone())
        }))
    }

    async fn authenticate(
        &self,
        name: &str,
        password_hash: &str,
    ) -> Result<Option<Record>, StoreError> {
        let inner = self.lock();
        Ok(inner.records.get(&EntityKind::User).and_then(|stored| {
            stored
                .iter()
                .find(|entry| {
                    entry.record.text("name").as_deref() == Some(name)
                        && entry.record.text("password").as_deref() == Some(password_hash)
                        && entry.record.text("active").as_deref() == Some("1")
                })
                .map(|entry| entry.record.clone())
        }))
    }

    async fn call_function(&self, path: &str) -> Result<Vec<Value>, StoreError> {
        let mut inner = self.lock();
        inner.function_calls.push(path.to_owned());
        Ok(inner.function_rows.clone())
    }
}

/// Records every message instead of sending it; can be switched to fail.
#[derive(Default)]
pub struct FakeMailer {
    pub fail: bool,
    sent: Mutex<Vec<MailMessage>>,
}

impl FakeMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Transport("scripted failure".to_owned()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }
}
