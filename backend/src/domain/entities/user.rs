//! User validation. Names and e-mail addresses are unique across the whole
//! installation; the confirmation password must match but is never stored.

use std::collections::BTreeMap;

use crate::domain::ports::{RecordLookup, StoreError};
use crate::domain::record::{Record, Rid};
use crate::domain::schema::EntityKind;
use crate::domain::validate::{Outcome, Validation};

pub async fn validate(
    record: &Record,
    lookup: &dyn RecordLookup,
    owner: Option<&Rid>,
    exclude_uid: Option<&Rid>,
) -> Result<BTreeMap<String, String>, StoreError> {
    let mut v = Validation::new(EntityKind::User, record, lookup, owner).excluding(exclude_uid);
    v.require("name");
    v.require("email");
    v.require("password");
    v.require("confirm_password");
    if record.text("password") != record.text("confirm_password") {
        v.flag("confirm_password", Outcome::IncorrectValue);
    }
    v.require_unique("name").await?;
    v.require_unique("email").await?;
    Ok(v.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::test_lookup::ScriptedLookup;
    use serde_json::json;

    #[actix_rt::test]
    async fn mismatched_confirmation_is_incorrect() {
        let lookup = ScriptedLookup::default();
        let record = Record::from_json(
            EntityKind::User,
            &json!({
                "name": "ivan", "email": "ivan@example.com",
                "password": "a", "confirm_password": "b"
            }),
        );
        let errors = validate(&record, &lookup, None, None).await.unwrap();
        assert_eq!(
            errors.get("confirm_password").map(String::as_str),
            Some("Incorrect value")
        );
    }

    #[actix_rt::test]
    async fn taken_name_and_email_are_duplicates() {
        let mut lookup = ScriptedLookup::default();
        lookup.taken.insert("name=ivan".to_owned());
        lookup.taken.insert("email=ivan@example.com".to_owned());
        let record = Record::from_json(
            EntityKind::User,
            &json!({
                "name": "ivan", "email": "ivan@example.com",
                "password": "a", "confirm_password": "a"
            }),
        );
        let errors = validate(&record, &lookup, None, None).await.unwrap();
        assert_eq!(errors.get("name").map(String::as_str), Some("Duplicate value"));
        assert_eq!(errors.get("email").map(String::as_str), Some("Duplicate value"));
    }
}
