//! HTTP adapter for the document store's REST command interface.
//!
//! Every data operation becomes a single POST against
//! `/command/<database>/sql/<limit>` carrying the query and its bound
//! parameters; stored procedures are invoked through
//! `/function/<database><path>`. Both endpoints use Basic auth with the
//! configured service login.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::domain::ports::{ListOptions, RecordLookup, StoreError, StorePort};
use crate::domain::record::{record_from_row, Record, Rid};
use crate::domain::schema::EntityKind;
use crate::server::config::DbConfig;

use super::query::{self, SqlStatement};

/// Result-set ceiling passed in the command URL; -1 disables it so paging
/// is controlled by the query itself.
const COMMAND_LIMIT: i64 = -1;

#[derive(Debug, Clone)]
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
    database: String,
    login: String,
    password: String,
}

impl HttpDocumentStore {
    pub fn new(config: &DbConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_owned(),
            database: config.name.clone(),
            login: config.login.clone(),
            password: config.password.clone(),
        }
    }

    #[instrument(skip(self, statement), fields(query = %statement.text))]
    async fn command(&self, statement: &SqlStatement) -> Result<Vec<Value>, StoreError> {
        let url = format!(
            "{}/command/{}/sql/{}",
            self.base_url, self.database, COMMAND_LIMIT
        );
        let body = json!({
            "command": statement.text,
            "parameters": statement.parameters,
        });
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.login, Some(&self.password))
            .json(&body)
            .send()
            .await?;
        Self::result_rows(response).await
    }

    #[instrument(skip(self))]
    async fn function(&self, path: &str) -> Result<Vec<Value>, StoreError> {
        let url = format!("{}/function/{}{}", self.base_url, self.database, path);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.login, Some(&self.password))
            .send()
            .await?;
        Self::result_rows(response).await
    }

    async fn result_rows(response: reqwest::Response) -> Result<Vec<Value>, StoreError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(StoreError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "store rejected command");
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|err| StoreError::Malformed(err.to_string()))?;
        let rows = payload
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| StoreError::Malformed("response carries no result array".to_owned()))?;
        Ok(rows.clone())
    }

    /// First numeric scalar in a count-style result set.
    fn scalar(rows: &[Value]) -> u64 {
        rows.first()
            .and_then(|row| {
                row.get("count")
                    .or_else(|| row.get("value"))
                    .and_then(Value::as_u64)
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl RecordLookup for HttpDocumentStore {
    async fn exists_matching(
        &self,
        kind: EntityKind,
        conditions: &[(&str, String)],
        exclude_uid: Option<&Rid>,
        owner: Option<&Rid>,
    ) -> Result<bool, StoreError> {
        let Some(statement) = query::exists(kind, conditions, exclude_uid, owner) else {
            return Ok(false);
        };
        let rows = self.command(&statement).await?;
        Ok(Self::scalar(&rows) > 0)
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
impl StorePort for HttpDocumentStore {
    async fn list(
        &self,
        kind: EntityKind,
        owner: Option<&Rid>,
        options: &ListOptions,
    ) -> Result<Vec<Record>, StoreError> {
        let Some(statement) = query::select(kind, owner, options) else {
            return Ok(Vec::new());
        };
        let fields = query::projected_fields(kind, options);
        let rows = self.command(&statement).await?;
        debug!(entity = kind.table_name(), rows = rows.len(), "listed records");
        Ok(rows
            .iter()
            .map(|row| record_from_row(kind, &fields, row))
            .collect())
    }

    async fn count(
        &self,
        kind: EntityKind,
        owner: Option<&Rid>,
        options: &ListOptions,
    ) -> Result<u64, StoreError> {
        let Some(statement) = query::count(kind, owner, options) else {
            return Ok(0);
        };
        let rows = self.command(&statement).await?;
        Ok(Self::scalar(&rows))
    }

    async fn get(
        &self,
        kind: EntityKind,
        rid: &Rid,
        owner: Option<&Rid>,
    ) -> Result<Option<Record>, StoreError> {
        let Some(statement) = query::by_rid(kind, rid, owner) else {
            return Ok(None);
        };
        let fields = kind.field_names();
        let rows = self.command(&statement).await?;
        Ok(rows.first().map(|row| record_from_row(kind, &fields, row)))
    }

    async fn insert(
        &self,
        kind: EntityKind,
        record: &Record,
        owner: Option<&Rid>,
    ) -> Result<Record, StoreError> {
        let statement = query::insert(kind, &record.to_store_json(owner));
        let rows = self.command(&statement).await?;
        let assigned = rows
            .first()
            .and_then(|row| row.get("@rid"))
            .and_then(Value::as_str)
            .and_then(Rid::parse)
            .ok_or_else(|| {
                StoreError::Malformed("insert response carries no identifier".to_owned())
            })?;
        let mut created = record.clone();
        created.set_uid(&assigned);
        Ok(created)
    }

    async fn update(
        &self,
        kind: EntityKind,
        rid: &Rid,
        record: &Record,
        owner: Option<&Rid>,
    ) -> Result<(), StoreError> {
        let Some(statement) = query::update(kind, rid, &record.to_store_json(None), owner) else {
            return Ok(());
        };
        self.command(&statement).await?;
        Ok(())
    }

    async fn delete(
        &self,
        kind: EntityKind,
        rids: &[Rid],
        owner: Option<&Rid>,
    ) -> Result<u64, StoreError> {
        // Two-phase: clear inbound references per record, then remove the
        // rows in one statement. Not transactional; a failure between the
        // phases leaves references cleaned but rows present.
        for rid in rids {
            self.function(&format!("/deleteReferences/{}", rid.external()))
                .await?;
        }
        let Some(statement) = query::delete(kind, rids, owner) else {
            return Ok(0);
        };
        let rows = self.command(&statement).await?;
        Ok(Self::scalar(&rows))
    }

    async fn find_by_field(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>, StoreError> {
        let Some(statement) = query::find_by_field(kind, field, value) else {
            return Ok(None);
        };
        let fields = kind.field_names();
        let rows = self.command(&statement).await?;
        Ok(rows.first().map(|row| record_from_row(kind, &fields, row)))
    }

    async fn authenticate(
        &self,
        name: &str,
        password_hash: &str,
    ) -> Result<Option<Record>, StoreError> {
        let statement = query::authenticate(name, password_hash);
        let fields = EntityKind::User.field_names();
        let rows = self.command(&statement).await?;
        Ok(rows
            .first()
            .map(|row| record_from_row(EntityKind::User, &fields, row)))
    }

    async fn call_function(&self, path: &str) -> Result<Vec<Value>, StoreError> {
        self.function(path).await
    }
}
