//! Field validation primitives.
//!
//! Each entity composes these checks in [`super::entities`]; the result is a
//! per-field error map that travels back to the client unchanged. Format
//! checks are pure; uniqueness and link-existence checks consult the store
//! through [`RecordLookup`] and only run for fields that passed their format
//! checks.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::field::{FieldType, FieldValue};
use super::ports::{RecordLookup, StoreError};
use super::record::{Record, Rid};
use super::schema::EntityKind;

/// Outcome of a single field check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    EmptyValue,
    IncorrectValue,
    DuplicateValue,
}

impl Outcome {
    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::EmptyValue => "Empty value",
            Self::IncorrectValue => "Incorrect value",
            Self::DuplicateValue => "Duplicate value",
        }
    }
}

/// Per-field error accumulator for one record.
///
/// The first failure recorded for a field wins; later checks on the same
/// field are skipped so a blank field reports `Empty value` rather than a
/// cascade of follow-on errors.
pub struct Validation<'a> {
    kind: EntityKind,
    record: &'a Record,
    lookup: &'a dyn RecordLookup,
    owner: Option<&'a Rid>,
    exclude_uid: Option<&'a Rid>,
    errors: BTreeMap<String, String>,
}

impl<'a> Validation<'a> {
    pub fn new(
        kind: EntityKind,
        record: &'a Record,
        lookup: &'a dyn RecordLookup,
        owner: Option<&'a Rid>,
    ) -> Self {
        Self {
            kind,
            record,
            lookup,
            owner,
            exclude_uid: None,
            errors: BTreeMap::new(),
        }
    }

    /// Exclude the record being updated from uniqueness checks.
    pub fn excluding(mut self, uid: Option<&'a Rid>) -> Self {
        self.exclude_uid = uid;
        self
    }

    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        self.record.get(field)
    }

    fn passed(&self, field: &str) -> bool {
        !self.errors.contains_key(field)
    }

    pub fn flag(&mut self, field: &str, outcome: Outcome) {
        if outcome != Outcome::Ok && self.passed(field) {
            self.errors.insert(field.to_owned(), outcome.message().to_owned());
        }
    }

    fn is_present(&self, field: &str) -> bool {
        self.value(field).is_some_and(|value| !value.is_blank())
    }

    /// The field must carry non-blank text.
    pub fn require(&mut self, field: &str) {
        if !self.is_present(field) {
            self.flag(field, Outcome::EmptyValue);
        }
    }

    /// The field must carry a whole number greater than zero.
    pub fn require_positive_integer(&mut self, field: &str) {
        let outcome = match self.value(field) {
            None => Outcome::EmptyValue,
            Some(value) if value.is_blank() => Outcome::EmptyValue,
            Some(FieldValue::Integer(n)) if *n > 0 => Outcome::Ok,
            Some(_) => Outcome::IncorrectValue,
        };
        self.flag(field, outcome);
    }

    /// The field must carry an exact decimal greater than zero.
    pub fn require_positive_decimal(&mut self, field: &str) {
        let outcome = match self.value(field) {
            None => Outcome::EmptyValue,
            Some(value) if value.is_blank() => Outcome::EmptyValue,
            Some(FieldValue::Decimal(d)) if *d > Decimal::ZERO => Outcome::Ok,
            Some(_) => Outcome::IncorrectValue,
        };
        self.flag(field, outcome);
    }

    /// The field must carry one of the allowed integer codes.
    pub fn require_choice(&mut self, field: &str, allowed: &[i64]) {
        let outcome = match self.value(field) {
            None => Outcome::EmptyValue,
            Some(value) if value.is_blank() => Outcome::EmptyValue,
            Some(FieldValue::Integer(n)) if allowed.contains(n) => Outcome::Ok,
            Some(_) => Outcome::IncorrectValue,
        };
        self.flag(field, outcome);
    }

    /// The field must carry one of the allowed textual tokens.
    pub fn require_choice_text(&mut self, field: &str, allowed: &[&str]) {
        let outcome = match self.value(field) {
            None => Outcome::EmptyValue,
            Some(value) if value.is_blank() => Outcome::EmptyValue,
            Some(value) if allowed.contains(&value.as_text().as_str()) => Outcome::Ok,
            Some(_) => Outcome::IncorrectValue,
        };
        self.flag(field, outcome);
    }

    /// The field must reference an existing record of its declared target
    /// entity, visible to the same owner.
    pub async fn require_link(&mut self, field: &str) -> Result<(), StoreError> {
        let Some(FieldType::Link { target, .. }) = self.kind.field(field).map(|spec| spec.ty)
        else {
            self.flag(field, Outcome::IncorrectValue);
            return Ok(());
        };
        let outcome = match self.value(field) {
            None => Outcome::EmptyValue,
            Some(value) if value.is_blank() => Outcome::EmptyValue,
            Some(FieldValue::Link(rid)) => {
                if self.lookup.exists_uid(target, rid, self.owner).await? {
                    Outcome::Ok
                } else {
                    Outcome::IncorrectValue
                }
            }
            Some(_) => Outcome::IncorrectValue,
        };
        self.flag(field, outcome);
        Ok(())
    }

    /// No other record of the same entity may carry this field value.
    /// Skipped when the field already failed a format check.
    pub async fn require_unique(&mut self, field: &str) -> Result<(), StoreError> {
        self.require_unique_together(&[field]).await
    }

    /// Uniqueness over several fields taken together; the error lands on the
    /// first field. Only runs when every field passed its format checks.
    pub async fn require_unique_together(&mut self, fields: &[&str]) -> Result<(), StoreError> {
        if fields
            .iter()
            .any(|field| !self.passed(field) || !self.is_present(field))
        {
            return Ok(());
        }
        let conditions: Vec<(&str, String)> = fields
            .iter()
            .filter_map(|field| self.record.text(field).map(|value| (*field, value)))
            .collect();
        if conditions.len() != fields.len() {
            return Ok(());
        }
        let duplicate = self
            .lookup
            .exists_matching(self.kind, &conditions, self.exclude_uid, self.owner)
            .await?;
        if duplicate {
            if let Some(first) = fields.first() {
                self.flag(first, Outcome::DuplicateValue);
            }
        }
        Ok(())
    }

    /// The field must carry text that parses as a whole number greater than
    /// zero (registry codes such as INN, KPP, and BIK).
    pub fn require_numeric_text(&mut self, field: &str) {
        let outcome = match self.value(field) {
            None => Outcome::EmptyValue,
            Some(value) if value.is_blank() => Outcome::EmptyValue,
            Some(value) => match value.as_text().trim().parse::<i64>() {
                Ok(n) if n > 0 => Outcome::Ok,
                _ => Outcome::IncorrectValue,
            },
        };
        self.flag(field, outcome);
    }

    /// Like [`Self::require_numeric_text`] but only when the field is
    /// present; a blank field passes.
    pub fn numeric_text_if_present(&mut self, field: &str) {
        if self.is_present(field) {
            self.require_numeric_text(field);
        }
    }

    pub fn finish(self) -> BTreeMap<String, String> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::EntityKind;
    use async_trait::async_trait;
    use rstest::rstest;
    use serde_json::json;

    struct NoRecords;

    #[async_trait]
    impl RecordLookup for NoRecords {
        async fn exists_matching(
            &self,
            _kind: EntityKind,
            _conditions: &[(&str, String)],
            _exclude_uid: Option<&Rid>,
            _owner: Option<&Rid>,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn exists_uid(
            &self,
            _kind: EntityKind,
            _rid: &Rid,
            _owner: Option<&Rid>,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[rstest]
    #[case(json!({}), "Empty value")]
    #[case(json!({"number": "  "}), "Empty value")]
    #[case(json!({"number": "abc"}), "Incorrect value")]
    #[case(json!({"number": -3}), "Incorrect value")]
    fn positive_integer_failures(#[case] payload: serde_json::Value, #[case] expected: &str) {
        let record = Record::from_json(EntityKind::Income, &payload);
        let lookup = NoRecords;
        let mut validation = Validation::new(EntityKind::Income, &record, &lookup, None);
        validation.require_positive_integer("number");
        assert_eq!(validation.finish().get("number").map(String::as_str), Some(expected));
    }

    #[test]
    fn first_failure_per_field_wins() {
        let record = Record::from_json(EntityKind::Income, &json!({}));
        let lookup = NoRecords;
        let mut validation = Validation::new(EntityKind::Income, &record, &lookup, None);
        validation.require("description");
        validation.flag("description", Outcome::IncorrectValue);
        let errors = validation.finish();
        assert_eq!(errors.get("description").map(String::as_str), Some("Empty value"));
    }

    #[actix_rt::test]
    async fn dangling_link_is_incorrect() {
        let record = Record::from_json(EntityKind::Account, &json!({"company": "12_4"}));
        let lookup = NoRecords;
        let mut validation = Validation::new(EntityKind::Account, &record, &lookup, None);
        validation.require_link("company").await.unwrap();
        let errors = validation.finish();
        assert_eq!(errors.get("company").map(String::as_str), Some("Incorrect value"));
    }

    #[actix_rt::test]
    async fn unique_check_skips_failed_fields() {
        let record = Record::from_json(EntityKind::Company, &json!({"inn": "abc"}));
        let lookup = NoRecords;
        let mut validation = Validation::new(EntityKind::Company, &record, &lookup, None);
        validation.flag("inn", Outcome::IncorrectValue);
        validation.require_unique("inn").await.unwrap();
        let errors = validation.finish();
        assert_eq!(errors.get("inn").map(String::as_str), Some("Incorrect value"));
    }
}
