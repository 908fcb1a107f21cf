//! Income document validation.

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
    let mut v = Validation::new(EntityKind::Income, record, lookup, owner).excluding(exclude_uid);
    v.require_positive_integer("number");
    v.require_positive_integer("date");
    v.require("description");
    v.require_positive_decimal("amount");
    v.require_link("company").await?;
    Ok(v.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::test_lookup::ScriptedLookup;
    use rstest::rstest;
    use serde_json::json;

    #[actix_rt::test]
    async fn complete_income_passes() {
        let mut lookup = ScriptedLookup::default();
        lookup.existing_uids.insert("12_4".to_owned());
        let record = Record::from_json(
            EntityKind::Income,
            &json!({
                "number": 7, "date": 1_640_995_200, "description": "Оплата по договору",
                "amount": "120.55", "company": "12_4"
            }),
        );
        let errors = validate(&record, &lookup, None, None).await.unwrap();
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[rstest]
    #[case(json!("0"), "Incorrect value")]
    #[case(json!("-5"), "Incorrect value")]
    #[case(json!("12,5"), "Incorrect value")]
    #[case(json!(""), "Empty value")]
    #[actix_rt::test]
    async fn amount_must_be_a_positive_decimal(
        #[case] amount: serde_json::Value,
        #[case] expected: &str,
    ) {
        let mut lookup = ScriptedLookup::default();
        lookup.existing_uids.insert("12_4".to_owned());
        let record = Record::from_json(
            EntityKind::Income,
            &json!({
                "number": 1, "date": 1, "description": "x",
                "amount": amount, "company": "12_4"
            }),
        );
        let errors = validate(&record, &lookup, None, None).await.unwrap();
        assert_eq!(errors.get("amount").map(String::as_str), Some(expected));
    }
}
