//! Field typing for dynamically shaped store records.
//!
//! The backing store is a dynamically typed document/graph database, so every
//! entity declares a semantic type per field and values are coerced at the
//! boundary instead of trusting whatever the wire carries.

use rust_decimal::Decimal;
use serde::ser::Serializer;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;

use super::record::Rid;
use super::schema::EntityKind;

/// Declared semantic type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Free-form text.
    Text,
    /// Positive whole number (document numbers, unix dates, flags).
    Integer,
    /// Exact monetary amount.
    Decimal,
    /// Reference to another entity; `display` names the field dereferenced
    /// when the link is projected in list queries.
    Link {
        target: EntityKind,
        display: &'static str,
    },
    /// Value restricted to a fixed declared set.
    Choice,
}

/// One declared field of an entity schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
}

/// A dynamically typed field value.
///
/// Input that fails to coerce into its declared type is kept as [`Self::Text`]
/// so the validator can report `IncorrectValue` instead of silently dropping
/// the field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Link(Rid),
}

impl FieldValue {
    /// Coerce a JSON value into its declared type.
    ///
    /// The literal string `"null"` and JSON `null` both normalise to empty
    /// text; the store emits the former for absent projected fields.
    pub fn from_json(value: &Value, ty: &FieldType) -> Self {
        if value.is_null() {
            return Self::Text(String::new());
        }
        if let Some(s) = value.as_str() {
            if s == "null" {
                return Self::Text(String::new());
            }
        }
        match ty {
            FieldType::Text => Self::Text(stringify(value)),
            FieldType::Integer => match coerce_integer(value) {
                Some(n) => Self::Integer(n),
                None => Self::Text(stringify(value)),
            },
            FieldType::Decimal => match coerce_decimal(value) {
                Some(d) => Self::Decimal(d),
                None => Self::Text(stringify(value)),
            },
            FieldType::Link { .. } => match value.as_str().and_then(Rid::parse) {
                Some(rid) => Self::Link(rid),
                None => Self::Text(stringify(value)),
            },
            // Choice codes may be numeric (spending categories) or textual
            // (report types); numeric codes arrive as strings from
            // query-string bodies.
            FieldType::Choice => match coerce_integer(value) {
                Some(n) => Self::Integer(n),
                None => Self::Text(stringify(value)),
            },
        }
    }

    /// Textual representation used by validators and store writes.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Decimal(d) => d.to_string(),
            Self::Link(rid) => rid.external(),
        }
    }

    /// True when the value is empty text after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// JSON value written to the store (`CONTENT` payloads).
    ///
    /// Links are written in the store's native identifier syntax.
    pub fn to_store_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Integer(n) => Value::from(*n),
            Self::Decimal(d) => Value::String(d.to_string()),
            Self::Link(rid) => Value::String(rid.native()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Integer(n) => serializer.serialize_i64(*n),
            // Fully qualified: Decimal has an inherent `serialize` returning
            // its raw byte representation, which would shadow the trait.
            Self::Decimal(d) => Serialize::serialize(d, serializer),
            Self::Link(rid) => serializer.serialize_str(&rid.external()),
        }
    }
}

fn stringify(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_owned(),
        None => value.to_string(),
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!("12"), FieldValue::Integer(12))]
    #[case(json!(12), FieldValue::Integer(12))]
    #[case(json!("abc"), FieldValue::Text("abc".into()))]
    #[case(json!(null), FieldValue::Text(String::new()))]
    #[case(json!("null"), FieldValue::Text(String::new()))]
    fn integer_coercion(#[case] input: Value, #[case] expected: FieldValue) {
        assert_eq!(FieldValue::from_json(&input, &FieldType::Integer), expected);
    }

    #[test]
    fn decimal_accepts_integral_and_fractional_forms() {
        let whole = FieldValue::from_json(&json!("120"), &FieldType::Decimal);
        let fractional = FieldValue::from_json(&json!("120.55"), &FieldType::Decimal);
        assert_eq!(whole.as_text(), "120");
        assert_eq!(fractional.as_text(), "120.55");
    }

    #[test]
    fn link_parses_both_identifier_forms() {
        let ty = FieldType::Link {
            target: EntityKind::Company,
            display: "name",
        };
        let from_external = FieldValue::from_json(&json!("12_4"), &ty);
        let from_native = FieldValue::from_json(&json!("#12:4"), &ty);
        assert_eq!(from_external, from_native);
        assert_eq!(from_external.as_text(), "12_4");
    }

    #[test]
    fn serialises_links_in_external_form() {
        let value = FieldValue::Link(Rid::parse("#30:7").unwrap());
        assert_eq!(serde_json::to_value(&value).unwrap(), json!("30_7"));
    }

    #[test]
    fn serialises_decimals_as_exact_strings() {
        let value = FieldValue::from_json(&json!("120.55"), &FieldType::Decimal);
        assert_eq!(serde_json::to_value(&value).unwrap(), json!("120.55"));
    }
}
