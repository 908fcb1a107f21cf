//! Bank account validation. The account number is unique per owner and the
//! company link must resolve.

use std::collections::BTreeMap;

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
    let mut v = Validation::new(EntityKind::Account, record, lookup, owner).excluding(exclude_uid);
    v.require("bank_name");
    v.require("number");
    v.require("ks");
    v.require_numeric_text("bik");
    v.require_link("company").await?;
    v.require_unique("number").await?;
    Ok(v.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::test_lookup::ScriptedLookup;
    use serde_json::json;

    #[actix_rt::test]
    async fn complete_account_passes() {
        let mut lookup = ScriptedLookup::default();
        lookup.existing_uids.insert("12_4".to_owned());
        let record = Record::from_json(
            EntityKind::Account,
            &json!({
                "bank_name": "Банк", "number": "40802810000000000001",
                "ks": "30101810400000000225", "bik": "44525225", "company": "12_4"
            }),
        );
        let errors = validate(&record, &lookup, None, None).await.unwrap();
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[actix_rt::test]
    async fn missing_company_link_is_incorrect() {
        let lookup = ScriptedLookup::default();
        let record = Record::from_json(
            EntityKind::Account,
            &json!({
                "bank_name": "Банк", "number": "1", "ks": "2",
                "bik": "44525225", "company": "12_4"
            }),
        );
        let errors = validate(&record, &lookup, None, None).await.unwrap();
        assert_eq!(errors.get("company").map(String::as_str), Some("Incorrect value"));
    }
}
