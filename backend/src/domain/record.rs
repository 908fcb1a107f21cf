//! Records and store identifiers.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::field::{FieldType, FieldValue};
use super::schema::EntityKind;

/// Store record identifier.
///
/// The store's native syntax is `#<cluster>:<position>`; the external form
/// used in URLs and API payloads replaces the separator with an underscore
/// and drops the hash (`12_4`). The two translations are exact inverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rid {
    cluster: i64,
    position: i64,
}

impl Rid {
    /// Parse an identifier in either external (`12_4`) or native (`#12:4`)
    /// form. Returns `None` for anything else.
    pub fn parse(token: &str) -> Option<Self> {
        let trimmed = token.trim();
        let trimmed = trimmed.strip_prefix('#').unwrap_or(trimmed);
        let (cluster, position) = trimmed.split_once([':', '_'])?;
        Some(Self {
            cluster: cluster.parse().ok()?,
            position: position.parse().ok()?,
        })
    }

    /// Native store syntax, e.g. `#12:4`.
    pub fn native(&self) -> String {
        format!("#{}:{}", self.cluster, self.position)
    }

    /// External API syntax, e.g. `12_4`.
    pub fn external(&self) -> String {
        format!("{}_{}", self.cluster, self.position)
    }
}

impl std::fmt::Display for Rid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.external())
    }
}

/// One entity record: a mapping from declared field name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_owned(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.values.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Textual value of a field, if present.
    pub fn text(&self, name: &str) -> Option<String> {
        self.values.get(name).map(FieldValue::as_text)
    }

    /// The record's persistent identifier, once assigned by the store.
    pub fn uid(&self) -> Option<Rid> {
        self.text("uid").as_deref().and_then(Rid::parse)
    }

    pub fn set_uid(&mut self, rid: &Rid) {
        self.set("uid", FieldValue::Text(rid.external()));
    }

    /// Merge-by-field update: fields absent from `incoming` are preserved.
    pub fn merge(&mut self, incoming: Record) {
        for (name, value) in incoming.values {
            self.values.insert(name, value);
        }
    }

    /// Build a record from a JSON object through the entity's declared-fields
    /// table. Undeclared fields are dropped; a store-native `@rid` key takes
    /// precedence over any incoming `uid`.
    pub fn from_json(kind: EntityKind, payload: &Value) -> Self {
        let mut record = Self::new();
        let Some(object) = payload.as_object() else {
            return record;
        };
        for spec in kind.fields() {
            if let Some(value) = object.get(spec.name) {
                record.set(spec.name, FieldValue::from_json(value, &spec.ty));
            }
        }
        if let Some(rid) = object.get("@rid").and_then(Value::as_str).and_then(Rid::parse) {
            record.set_uid(&rid);
        }
        record
    }

    /// JSON payload for a store write. The identifier travels in the query,
    /// never in the content; the owner link is injected for scoped entities.
    pub fn to_store_json(&self, owner: Option<&Rid>) -> Value {
        let mut object = serde_json::Map::new();
        for (name, value) in &self.values {
            if name == "uid" {
                continue;
            }
            object.insert(name.clone(), value.to_store_json());
        }
        if let Some(owner) = owner {
            object.insert("user".to_owned(), Value::String(owner.native()));
        }
        Value::Object(object)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Record coercion for rows returned by list queries, which carry only the
/// projected fields.
pub fn record_from_row(kind: EntityKind, fields: &[String], row: &Value) -> Record {
    let mut record = Record::new();
    let Some(object) = row.as_object() else {
        return record;
    };
    for field in fields {
        let Some(value) = object.get(field) else {
            continue;
        };
        let ty = kind
            .field(field)
            .map_or(FieldType::Text, |spec| spec.ty);
        // Projected links are dereferenced to their display field, so they
        // come back as plain text rather than identifiers.
        let ty = match ty {
            FieldType::Link { .. } if field != "uid" => FieldType::Text,
            other => other,
        };
        record.set(field, FieldValue::from_json(value, &ty));
    }
    if let Some(rid) = object.get("uid").and_then(Value::as_str).and_then(Rid::parse) {
        record.set_uid(&rid);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("12_4")]
    #[case("0_1")]
    #[case("-2_33")]
    fn rid_round_trips_external_form(#[case] external: &str) {
        let rid = Rid::parse(external).unwrap();
        let native = rid.native();
        let back = Rid::parse(&native).unwrap();
        assert_eq!(back.external(), external);
    }

    #[rstest]
    #[case("#12:4", "12_4")]
    #[case("12:4", "12_4")]
    #[case("12_4", "12_4")]
    fn rid_accepts_all_boundary_forms(#[case] input: &str, #[case] external: &str) {
        assert_eq!(Rid::parse(input).unwrap().external(), external);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("#12")]
    #[case("12_x")]
    fn rid_rejects_malformed_tokens(#[case] input: &str) {
        assert!(Rid::parse(input).is_none());
    }

    #[test]
    fn from_json_keeps_declared_fields_only() {
        let record = Record::from_json(
            EntityKind::Company,
            &json!({"name": "Acme", "inn": "4324233", "bogus": "x"}),
        );
        assert_eq!(record.text("name").as_deref(), Some("Acme"));
        assert!(record.get("bogus").is_none());
    }

    #[test]
    fn native_rid_key_wins_over_uid() {
        let record = Record::from_json(
            EntityKind::Company,
            &json!({"uid": "1_1", "@rid": "#7:3", "name": "Acme"}),
        );
        assert_eq!(record.uid().unwrap().external(), "7_3");
    }

    #[test]
    fn merge_never_deletes_absent_fields() {
        let mut base = Record::from_json(
            EntityKind::Company,
            &json!({"name": "Acme", "address": "Addr", "inn": "42"}),
        );
        let partial = Record::from_json(EntityKind::Company, &json!({"name": "Acme Ltd"}));
        base.merge(partial);
        assert_eq!(base.text("name").as_deref(), Some("Acme Ltd"));
        assert_eq!(base.text("address").as_deref(), Some("Addr"));
    }

    #[test]
    fn store_json_excludes_uid_and_injects_owner() {
        let mut record = Record::from_json(EntityKind::Company, &json!({"name": "Acme"}));
        record.set_uid(&Rid::parse("5_1").unwrap());
        let owner = Rid::parse("9_0").unwrap();
        let payload = record.to_store_json(Some(&owner));
        assert!(payload.get("uid").is_none());
        assert_eq!(payload.get("user"), Some(&json!("#9:0")));
    }

    #[test]
    fn row_normalises_null_sentinel() {
        let fields = vec!["uid".to_owned(), "description".to_owned()];
        let record = record_from_row(
            EntityKind::Income,
            &fields,
            &json!({"uid": "#21:0", "description": "null"}),
        );
        assert_eq!(record.text("description").as_deref(), Some(""));
        assert_eq!(record.uid().unwrap().external(), "21_0");
    }
}
