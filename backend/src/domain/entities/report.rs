//! Report validation. A company has at most one report of a given type per
//! period, so the (type, period) pair is unique per company.

use std::collections::BTreeMap;

use crate::domain::ports::{RecordLookup, StoreError};
use crate::domain::record::{Record, Rid};
use crate::domain::schema::{EntityKind, REPORT_TYPES};
use crate::domain::validate::Validation;

pub async fn validate(
    record: &Record,
    lookup: &dyn RecordLookup,
    owner: Option<&Rid>,
    exclude_uid: Option<&Rid>,
) -> Result<BTreeMap<String, String>, StoreError> {
    let types: Vec<&str> = REPORT_TYPES.iter().map(|(key, _)| *key).collect();
    let mut v = Validation::new(EntityKind::Report, record, lookup, owner).excluding(exclude_uid);
    v.require_positive_integer("date");
    v.require_positive_integer("period");
    v.require_choice_text("type", &types);
    v.require_link("company").await?;
    // The duplicate message lands on the period field.
    v.require_unique_together(&["period", "type", "company"]).await?;
    Ok(v.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::test_lookup::ScriptedLookup;
    use serde_json::json;

    #[actix_rt::test]
    async fn second_report_for_same_company_and_period_is_a_duplicate() {
        let mut lookup = ScriptedLookup::default();
        lookup.existing_uids.insert("12_4".to_owned());
        lookup.taken.insert("period=2021&type=kudir&company=12_4".to_owned());
        let record = Record::from_json(
            EntityKind::Report,
            &json!({"date": 1, "period": 2021, "type": "kudir", "company": "12_4"}),
        );
        let errors = validate(&record, &lookup, None, None).await.unwrap();
        assert_eq!(errors.get("period").map(String::as_str), Some("Duplicate value"));
    }

    #[actix_rt::test]
    async fn another_company_may_file_the_same_period() {
        let mut lookup = ScriptedLookup::default();
        lookup.existing_uids.insert("12_4".to_owned());
        lookup.existing_uids.insert("12_9".to_owned());
        lookup.taken.insert("period=2021&type=kudir&company=12_4".to_owned());
        let record = Record::from_json(
            EntityKind::Report,
            &json!({"date": 1, "period": 2021, "type": "kudir", "company": "12_9"}),
        );
        let errors = validate(&record, &lookup, None, None).await.unwrap();
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[actix_rt::test]
    async fn unknown_report_type_is_incorrect() {
        let mut lookup = ScriptedLookup::default();
        lookup.existing_uids.insert("12_4".to_owned());
        let record = Record::from_json(
            EntityKind::Report,
            &json!({"date": 1, "period": 2021, "type": "balance", "company": "12_4"}),
        );
        let errors = validate(&record, &lookup, None, None).await.unwrap();
        assert_eq!(errors.get("type").map(String::as_str), Some("Incorrect value"));
    }
}
