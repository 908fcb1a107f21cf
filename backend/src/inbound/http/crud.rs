//! Generic CRUD handlers shared by every owner-scoped entity.
//!
//! Each entity gets the same route set under `/api/<entity>`:
//! list, count, get, create, update, and delete over a comma-separated
//! identifier list. The entity kind travels as scope data so one handler
//! set serves all entities.

use actix_web::{web, HttpResponse};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{error, info};

use crate::domain::entities;
use crate::domain::ports::{ListOptions, StoreError};
use crate::domain::record::{Record, Rid};
use crate::domain::schema::EntityKind;

use super::auth::Authenticated;
use super::envelope;
use super::state::AppState;

const MSG_STORAGE: &str = "Storage unavailable";
const MSG_NOT_FOUND: &str = "Not found";
const MSG_BAD_ID: &str = "Incorrect identifier";
const MSG_NOTHING_DELETED: &str = "No items to delete";

/// Routes for one entity. `/count` is registered ahead of `/{id}` so the
/// literal segment wins.
pub fn crud_scope(kind: EntityKind) -> actix_web::Scope {
    crud_routes(web::scope(&format!("/{}", kind.route())).app_data(web::Data::new(kind)))
}

/// CORS preflights answer 200 without touching the auth boundary.
pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// Append the standard route set to a prepared scope; lets an entity add
/// literal routes of its own ahead of `/{id}`.
pub fn crud_routes(scope: actix_web::Scope) -> actix_web::Scope {
    scope
        .route("", web::get().to(list))
        .route("", web::post().to(create))
        .route("", web::method(actix_web::http::Method::OPTIONS).to(preflight))
        .route("/count", web::get().to(count))
        .route("/{id}", web::get().to(get))
        .route("/{id}", web::put().to(update))
        .route("/{id}", web::delete().to(delete))
        .route(
            "/{id}",
            web::method(actix_web::http::Method::OPTIONS).to(preflight),
        )
}

/// Create/update bodies arrive either as JSON or as a query string
/// (`a=1&b=2`); the latter is lifted into a JSON object of strings and the
/// schema's type table coerces from there.
pub fn parse_body(bytes: &web::Bytes) -> Option<Value> {
    if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
        if value.is_object() {
            return Some(value);
        }
    }
    // Reject invalid UTF-8 outright; the urlencoded parser would otherwise
    // decode raw bytes into replacement characters.
    let text = std::str::from_utf8(bytes).ok()?;
    let pairs: BTreeMap<String, String> = serde_urlencoded::from_str(text).ok()?;
    if pairs.is_empty() {
        return None;
    }
    Some(Value::Object(
        pairs
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
    ))
}

fn store_failed(err: &StoreError) -> HttpResponse {
    error!(error = %err, "store operation failed");
    envelope::general_error(MSG_STORAGE)
}

async fn list(
    state: web::Data<AppState>,
    kind: web::Data<EntityKind>,
    auth: Authenticated,
    options: web::Query<ListOptions>,
) -> HttpResponse {
    let owner = auth.uid();
    match state.store.list(**kind, owner.as_ref(), &options).await {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(err) => store_failed(&err),
    }
}

async fn count(
    state: web::Data<AppState>,
    kind: web::Data<EntityKind>,
    auth: Authenticated,
    options: web::Query<ListOptions>,
) -> HttpResponse {
    let owner = auth.uid();
    match state.store.count(**kind, owner.as_ref(), &options).await {
        Ok(total) => HttpResponse::Ok().json(total),
        Err(err) => store_failed(&err),
    }
}

async fn get(
    state: web::Data<AppState>,
    kind: web::Data<EntityKind>,
    auth: Authenticated,
    path: web::Path<String>,
) -> HttpResponse {
    let Some(rid) = Rid::parse(&path) else {
        return envelope::general_error(MSG_BAD_ID);
    };
    let owner = auth.uid();
    match state.store.get(**kind, &rid, owner.as_ref()).await {
        Ok(Some(record)) => HttpResponse::Ok().json(record),
        Ok(None) => envelope::general_error(MSG_NOT_FOUND),
        Err(err) => store_failed(&err),
    }
}

async fn create(
    state: web::Data<AppState>,
    kind: web::Data<EntityKind>,
    auth: Authenticated,
    body: web::Bytes,
) -> HttpResponse {
    let Some(payload) = parse_body(&body) else {
        return envelope::general_error("Incorrect request");
    };
    let record = Record::from_json(**kind, &payload);
    let owner = auth.uid();
    let errors = match entities::validate(**kind, &record, state.store.as_ref(), owner.as_ref(), None)
        .await
    {
        Ok(errors) => errors,
        Err(err) => return store_failed(&err),
    };
    if !errors.is_empty() {
        return envelope::field_errors(&errors);
    }
    match state.store.insert(**kind, &record, owner.as_ref()).await {
        Ok(created) => {
            info!(entity = kind.table_name(), uid = ?created.uid(), "record created");
            envelope::ok(created)
        }
        Err(err) => store_failed(&err),
    }
}

async fn update(
    state: web::Data<AppState>,
    kind: web::Data<EntityKind>,
    auth: Authenticated,
    path: web::Path<String>,
    body: web::Bytes,
) -> HttpResponse {
    let Some(rid) = Rid::parse(&path) else {
        return envelope::general_error(MSG_BAD_ID);
    };
    let Some(payload) = parse_body(&body) else {
        return envelope::general_error("Incorrect request");
    };
    let owner = auth.uid();
    let mut merged = match state.store.get(**kind, &rid, owner.as_ref()).await {
        Ok(Some(existing)) => existing,
        Ok(None) => return envelope::general_error(MSG_NOT_FOUND),
        Err(err) => return store_failed(&err),
    };
    merged.merge(Record::from_json(**kind, &payload));
    merged.set_uid(&rid);
    let errors = match entities::validate(
        **kind,
        &merged,
        state.store.as_ref(),
        owner.as_ref(),
        Some(&rid),
    )
    .await
    {
        Ok(errors) => errors,
        Err(err) => return store_failed(&err),
    };
    if !errors.is_empty() {
        return envelope::field_errors(&errors);
    }
    match state.store.update(**kind, &rid, &merged, owner.as_ref()).await {
        Ok(()) => envelope::ok(merged),
        Err(err) => store_failed(&err),
    }
}

async fn delete(
    state: web::Data<AppState>,
    kind: web::Data<EntityKind>,
    auth: Authenticated,
    path: web::Path<String>,
) -> HttpResponse {
    let rids: Vec<Rid> = path.split(',').filter_map(Rid::parse).collect();
    if rids.is_empty() {
        return envelope::general_error(MSG_BAD_ID);
    }
    let owner = auth.uid();
    match state.store.delete(**kind, &rids, owner.as_ref()).await {
        Ok(0) => envelope::general_error(MSG_NOTHING_DELETED),
        Ok(deleted) => {
            info!(entity = kind.table_name(), deleted, "records deleted");
            envelope::ok(serde_json::json!({"deleted": deleted}))
        }
        Err(err) => store_failed(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_accepts_json_objects() {
        let bytes = web::Bytes::from_static(br#"{"name": "Acme", "type": 2}"#);
        let parsed = parse_body(&bytes).unwrap();
        assert_eq!(parsed, json!({"name": "Acme", "type": 2}));
    }

    #[test]
    fn body_accepts_query_string_form() {
        let bytes = web::Bytes::from_static(b"name=Acme&type=2&kpp=");
        let parsed = parse_body(&bytes).unwrap();
        assert_eq!(parsed, json!({"name": "Acme", "type": "2", "kpp": ""}));
    }

    #[test]
    fn garbage_body_is_rejected() {
        let bytes = web::Bytes::from_static(b"\xff\xfe");
        assert!(parse_body(&bytes).is_none());
    }
}
