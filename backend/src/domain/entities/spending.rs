//! Spending document validation. On top of the common document fields a
//! spending carries a category code and the tax period it belongs to.

use std::collections::BTreeMap;

use crate::domain::ports::{RecordLookup, StoreError};
use crate::domain::record::{Record, Rid};
use crate::domain::schema::{EntityKind, SPENDING_CATEGORIES};
use crate::domain::validate::Validation;

pub async fn validate(
    record: &Record,
    lookup: &dyn RecordLookup,
    owner: Option<&Rid>,
    exclude_uid: Option<&Rid>,
) -> Result<BTreeMap<String, String>, StoreError> {
    let codes: Vec<i64> = SPENDING_CATEGORIES.iter().map(|(code, _)| *code).collect();
    let mut v = Validation::new(EntityKind::Spending, record, lookup, owner).excluding(exclude_uid);
    v.require_positive_integer("number");
    v.require_positive_integer("date");
    v.require("description");
    v.require_positive_decimal("amount");
    v.require_choice("type", &codes);
    v.require("period");
    v.require_link("company").await?;
    Ok(v.finish())
}
