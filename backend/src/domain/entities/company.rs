//! Company validation.
//!
//! Type code 1 is a sole proprietor, 2 a legal entity. Only legal entities
//! carry a KPP; the INN must be unique per owner.

use std::collections::BTreeMap;

use crate::domain::field::FieldValue;
use crate::domain::ports::{RecordLookup, StoreError};
use crate::domain::record::{Record, Rid};
use crate::domain::schema::EntityKind;
use crate::domain::validate::Validation;

pub async fn validate(
    record: &Record,
    lookup: &dyn RecordLookup,
    owner: Option<&Rid>,
    exclude_uid: Option<&Rid>,
) -> Result<BTreeMap<String, String>, StoreError> {
    let mut v = Validation::new(EntityKind::Company, record, lookup, owner).excluding(exclude_uid);
    v.require("name");
    v.require("address");
    v.require_numeric_text("inn");
    v.require_choice("type", &[1, 2]);

    let company_type = match record.get("type") {
        Some(FieldValue::Integer(n)) => Some(*n),
        _ => None,
    };
    match company_type {
        // Sole proprietors have no KPP; whatever was sent is ignored.
        Some(1) => {}
        Some(2) => v.require_numeric_text("kpp"),
        _ => v.numeric_text_if_present("kpp"),
    }

    v.require_unique("inn").await?;
    Ok(v.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::test_lookup::ScriptedLookup;
    use serde_json::json;

    fn record(payload: serde_json::Value) -> Record {
        Record::from_json(EntityKind::Company, &payload)
    }

    #[actix_rt::test]
    async fn sole_proprietor_needs_no_kpp() {
        let lookup = ScriptedLookup::default();
        let record = record(json!({
            "name": "ИП Иванов", "inn": "4324233", "type": 1, "address": "Москва"
        }));
        let errors = validate(&record, &lookup, None, None).await.unwrap();
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[actix_rt::test]
    async fn legal_entity_requires_kpp() {
        let lookup = ScriptedLookup::default();
        let record = record(json!({
            "name": "ООО Ромашка", "inn": "4324233", "type": 2, "address": "Москва"
        }));
        let errors = validate(&record, &lookup, None, None).await.unwrap();
        assert_eq!(errors.get("kpp").map(String::as_str), Some("Empty value"));
    }

    #[actix_rt::test]
    async fn duplicate_inn_is_reported() {
        let mut lookup = ScriptedLookup::default();
        lookup.taken.insert("inn=4324233".to_owned());
        let record = record(json!({
            "name": "ИП Иванов", "inn": "4324233", "type": 1, "address": "Москва"
        }));
        let errors = validate(&record, &lookup, None, None).await.unwrap();
        assert_eq!(errors.get("inn").map(String::as_str), Some("Duplicate value"));
    }

    #[actix_rt::test]
    async fn unknown_type_code_is_incorrect() {
        let lookup = ScriptedLookup::default();
        let record = record(json!({
            "name": "X", "inn": "42", "type": 5, "address": "Y"
        }));
        let errors = validate(&record, &lookup, None, None).await.unwrap();
        assert_eq!(errors.get("type").map(String::as_str), Some("Incorrect value"));
    }
}
