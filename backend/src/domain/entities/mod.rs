//! Per-entity validation rules, composed from the shared primitives.

mod account;
mod company;
mod income;
mod report;
mod spending;
mod user;

use std::collections::BTreeMap;

use super::ports::{RecordLookup, StoreError};
use super::record::{Record, Rid};
use super::schema::EntityKind;

/// Validate `record` against the rules of its entity. Returns the per-field
/// error map; an empty map means the record may be persisted.
///
/// `exclude_uid` names the record being updated so it does not collide with
/// itself in uniqueness checks; `owner` scopes store lookups for
/// owner-scoped entities.
pub async fn validate(
    kind: EntityKind,
    record: &Record,
    lookup: &dyn RecordLookup,
    owner: Option<&Rid>,
    exclude_uid: Option<&Rid>,
) -> Result<BTreeMap<String, String>, StoreError> {
    match kind {
        EntityKind::Company => company::validate(record, lookup, owner, exclude_uid).await,
        EntityKind::Account => account::validate(record, lookup, owner, exclude_uid).await,
        EntityKind::Income => income::validate(record, lookup, owner, exclude_uid).await,
        EntityKind::Spending => spending::validate(record, lookup, owner, exclude_uid).await,
        EntityKind::Report => report::validate(record, lookup, owner, exclude_uid).await,
        EntityKind::User => user::validate(record, lookup, owner, exclude_uid).await,
    }
}

#[cfg(test)]
pub(crate) mod test_lookup {
    use async_trait::async_trait;
    use std::collections::HashSet;

    use crate::domain::ports::{RecordLookup, StoreError};
    use crate::domain::record::Rid;
    use crate::domain::schema::EntityKind;

    /// Scriptable lookup: `existing_uids` answers link checks and
    /// `taken` answers uniqueness checks, keyed by `field=value` pairs
    /// joined with `&`.
    #[derive(Default)]
    pub struct ScriptedLookup {
        pub existing_uids: HashSet<String>,
        pub taken: HashSet<String>,
    }

    #[async_trait]
    impl RecordLookup for ScriptedLookup {
        async fn exists_matching(
            &self,
            _kind: EntityKind,
            conditions: &[(&str, String)],
            _exclude_uid: Option<&Rid>,
            _owner: Option<&Rid>,
        ) -> Result<bool, StoreError> {
            let key = conditions
                .iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect::<Vec<_>>()
                .join("&");
            Ok(self.taken.contains(&key))
        }

        async fn exists_uid(
            &self,
            _kind: EntityKind,
            rid: &Rid,
            _owner: Option<&Rid>,
        ) -> Result<bool, StoreError> {
            Ok(self.existing_uids.contains(&rid.external()))
        }
    }
}
