//! Builds the textual queries the document store executes.
//!
//! Field names are drawn from the declared schema tables, never from client
//! input, so only values need binding; every value travels as a positional
//! `?` parameter rather than being spliced into the query text.

use serde_json::Value;

use crate::domain::field::FieldType;
use crate::domain::ports::ListOptions;
use crate::domain::record::Rid;
use crate::domain::schema::EntityKind;

/// Lists are capped unless the caller pages explicitly.
const DEFAULT_LIMIT: u32 = 100;

/// A query with its bound positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub text: String,
    pub parameters: Vec<Value>,
}

/// Projection expression for one declared field. The store is dynamically
/// typed, so every read is cast to the semantic type the application
/// expects; links are dereferenced to their display field.
fn projection(kind: EntityKind, name: &str) -> Option<String> {
    if name == "uid" {
        return Some("@rid as uid".to_owned());
    }
    let spec = kind.field(name)?;
    Some(match spec.ty {
        FieldType::Text | FieldType::Choice => format!("{name}.asString() as {name}"),
        FieldType::Integer => format!("{name}.asLong() as {name}"),
        FieldType::Decimal => format!("{name}.asDecimal() as {name}"),
        FieldType::Link { display, .. } => format!("{name}.{display}.asString() as {name}"),
    })
}

/// The field names a list query will project, honouring the `fields` option
/// and dropping anything not declared for the entity.
pub fn projected_fields(kind: EntityKind, options: &ListOptions) -> Vec<String> {
    match options.fields.as_deref() {
        Some(requested) if !requested.trim().is_empty() => requested
            .split(',')
            .map(str::trim)
            .filter(|name| *name == "uid" || kind.field(name).is_some())
            .map(str::to_owned)
            .collect(),
        _ => kind.field_names(),
    }
}

/// Shared condition builder for list/count/get. Returns `None` when the
/// entity is owner-scoped but no owner is available: such a query must not
/// be issued at all.
fn build_condition(
    kind: EntityKind,
    owner: Option<&Rid>,
    options: &ListOptions,
) -> Option<(Vec<String>, Vec<Value>)> {
    let mut clauses = Vec::new();
    let mut parameters = Vec::new();

    if kind.owner_scoped() {
        let owner = owner?;
        clauses.push("user = ?".to_owned());
        parameters.push(Value::String(owner.native()));
    }

    if let Some(condition) = options.condition.as_deref() {
        if !condition.trim().is_empty() {
            clauses.push(format!("({})", condition.trim()));
        }
    }

    if let (Some(fields), Some(value)) = (
        options.filter_fields.as_deref(),
        options.filter_value.as_deref(),
    ) {
        if !value.trim().is_empty() {
            let mut matches = Vec::new();
            for field in fields.split(',').map(str::trim) {
                if kind.field(field).is_none() {
                    continue;
                }
                matches.push(format!("{field}.asString().toLowerCase() like ?"));
                parameters.push(Value::String(format!(
                    "{}%",
                    value.trim().to_lowercase()
                )));
            }
            if !matches.is_empty() {
                clauses.push(format!("({})", matches.join(" OR ")));
            }
        }
    }

    Some((clauses, parameters))
}

fn assemble(
    mut text: String,
    clauses: Vec<String>,
    parameters: Vec<Value>,
    tail: &str,
) -> SqlStatement {
    if !clauses.is_empty() {
        text.push_str(" WHERE ");
        text.push_str(&clauses.join(" AND "));
    }
    text.push_str(tail);
    SqlStatement { text, parameters }
}

/// List query for an entity under the given scope and options.
pub fn select(kind: EntityKind, owner: Option<&Rid>, options: &ListOptions) -> Option<SqlStatement> {
    let (clauses, parameters) = build_condition(kind, owner, options)?;
    let fields = projected_fields(kind, options);
    let columns: Vec<String> = fields
        .iter()
        .filter_map(|name| projection(kind, name))
        .collect();
    let text = format!("SELECT {} FROM {}", columns.join(", "), kind.table_name());

    let mut tail = String::new();
    if let Some(order) = sanitize_order(kind, options.order.as_deref()) {
        tail.push_str(" ORDER BY ");
        tail.push_str(&order);
    }
    if let Some(skip) = options.skip {
        tail.push_str(&format!(" SKIP {skip}"));
    }
    let limit = options.limit.unwrap_or(DEFAULT_LIMIT);
    tail.push_str(&format!(" LIMIT {limit}"));
    Some(assemble(text, clauses, parameters, &tail))
}

/// Count query under the same condition set as [`select`]. Paging options
/// are ignored so count always agrees with an unpaginated list.
pub fn count(kind: EntityKind, owner: Option<&Rid>, options: &ListOptions) -> Option<SqlStatement> {
    let (clauses, parameters) = build_condition(kind, owner, options)?;
    let text = format!("SELECT COUNT(*) as count FROM {}", kind.table_name());
    Some(assemble(text, clauses, parameters, ""))
}

/// Single-record query by identifier.
pub fn by_rid(kind: EntityKind, rid: &Rid, owner: Option<&Rid>) -> Option<SqlStatement> {
    let options = ListOptions::default();
    let (mut clauses, mut parameters) = build_condition(kind, owner, &options)?;
    clauses.push("@rid = ?".to_owned());
    parameters.push(Value::String(rid.native()));
    let fields = kind.field_names();
    let columns: Vec<String> = fields
        .iter()
        .filter_map(|name| projection(kind, name))
        .collect();
    let text = format!("SELECT {} FROM {}", columns.join(", "), kind.table_name());
    Some(assemble(text, clauses, parameters, ""))
}

/// Existence probe over `(field, value)` pairs, optionally excluding one
/// record (the one being updated).
pub fn exists(
    kind: EntityKind,
    conditions: &[(&str, String)],
    exclude_uid: Option<&Rid>,
    owner: Option<&Rid>,
) -> Option<SqlStatement> {
    let options = ListOptions::default();
    let (mut clauses, mut parameters) = build_condition(kind, owner, &options)?;
    for (field, value) in conditions {
        let spec = kind.field(field)?;
        // Link conditions arrive in external form and are compared in the
        // store's native identifier syntax.
        let bound = match spec.ty {
            FieldType::Link { .. } => Rid::parse(value)?.native(),
            _ => value.clone(),
        };
        clauses.push(format!("{field} = ?"));
        parameters.push(Value::String(bound));
    }
    if let Some(exclude) = exclude_uid {
        clauses.push("@rid <> ?".to_owned());
        parameters.push(Value::String(exclude.native()));
    }
    let text = format!("SELECT COUNT(*) as count FROM {}", kind.table_name());
    Some(assemble(text, clauses, parameters, ""))
}

/// Insert with a JSON `CONTENT` payload.
pub fn insert(kind: EntityKind, content: &Value) -> SqlStatement {
    SqlStatement {
        text: format!("INSERT INTO {} CONTENT {}", kind.table_name(), content),
        parameters: Vec::new(),
    }
}

/// Merge-update of one record by identifier.
pub fn update(kind: EntityKind, rid: &Rid, content: &Value, owner: Option<&Rid>) -> Option<SqlStatement> {
    let mut text = format!("UPDATE {} MERGE {} WHERE @rid = ?", kind.table_name(), content);
    let mut parameters = vec![Value::String(rid.native())];
    if kind.owner_scoped() {
        let owner = owner?;
        text.push_str(" AND user = ?");
        parameters.push(Value::String(owner.native()));
    }
    Some(SqlStatement { text, parameters })
}

/// Delete several records by identifier under the owner scope.
pub fn delete(kind: EntityKind, rids: &[Rid], owner: Option<&Rid>) -> Option<SqlStatement> {
    if rids.is_empty() {
        return None;
    }
    let placeholders = vec!["?"; rids.len()].join(", ");
    let mut text = format!("DELETE FROM {} WHERE @rid IN [{}]", kind.table_name(), placeholders);
    let mut parameters: Vec<Value> = rids
        .iter()
        .map(|rid| Value::String(rid.native()))
        .collect();
    if kind.owner_scoped() {
        let owner = owner?;
        text.push_str(" AND user = ?");
        parameters.push(Value::String(owner.native()));
    }
    Some(SqlStatement { text, parameters })
}

/// Unscoped single-field lookup, used by the account flows (activation
/// tokens, password reset) that run before any owner is known.
pub fn find_by_field(kind: EntityKind, field: &str, value: &str) -> Option<SqlStatement> {
    kind.field(field)?;
    let columns: Vec<String> = kind
        .field_names()
        .iter()
        .filter_map(|name| projection(kind, name))
        .collect();
    Some(SqlStatement {
        text: format!(
            "SELECT {} FROM {} WHERE {field} = ?",
            columns.join(", "),
            kind.table_name()
        ),
        parameters: vec![Value::String(value.to_owned())],
    })
}

/// Credential check against active accounts.
pub fn authenticate(name: &str, password_hash: &str) -> SqlStatement {
    let kind = EntityKind::User;
    let columns: Vec<String> = kind
        .field_names()
        .iter()
        .filter_map(|field| projection(kind, field))
        .collect();
    SqlStatement {
        text: format!(
            "SELECT {} FROM {} WHERE name = ? AND password = ? AND active = 1",
            columns.join(", "),
            kind.table_name()
        ),
        parameters: vec![
            Value::String(name.to_owned()),
            Value::String(password_hash.to_owned()),
        ],
    }
}

/// Keep only declared field names and the two direction keywords; anything
/// else in the order option is dropped rather than spliced into the query.
fn sanitize_order(kind: EntityKind, order: Option<&str>) -> Option<String> {
    let order = order?.trim();
    if order.is_empty() {
        return None;
    }
    let mut parts = order.split_whitespace();
    let field = parts.next()?;
    if field != "uid" && kind.field(field).is_none() {
        return None;
    }
    let direction = match parts.next() {
        None => "",
        Some(token) if token.eq_ignore_ascii_case("asc") => " ASC",
        Some(token) if token.eq_ignore_ascii_case("desc") => " DESC",
        Some(_) => return None,
    };
    Some(format!("{field}{direction}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn owner() -> Rid {
        Rid::parse("9_0").unwrap()
    }

    #[test]
    fn scoped_entity_without_owner_builds_nothing() {
        assert!(select(EntityKind::Company, None, &ListOptions::default()).is_none());
        assert!(count(EntityKind::Company, None, &ListOptions::default()).is_none());
    }

    #[test]
    fn select_projects_all_declared_fields_with_casts() {
        let owner = owner();
        let stmt = select(EntityKind::Income, Some(&owner), &ListOptions::default()).unwrap();
        assert_eq!(
            stmt.text,
            "SELECT @rid as uid, number.asLong() as number, date.asLong() as date, \
             description.asString() as description, amount.asDecimal() as amount, \
             company.name.asString() as company FROM Income WHERE user = ? LIMIT 100"
        );
        assert_eq!(stmt.parameters, vec![json!("#9:0")]);
    }

    #[test]
    fn filter_values_are_bound_not_spliced() {
        let owner = owner();
        let options = ListOptions {
            filter_fields: Some("name,address".to_owned()),
            filter_value: Some("Ac'me".to_owned()),
            ..ListOptions::default()
        };
        let stmt = select(EntityKind::Company, Some(&owner), &options).unwrap();
        assert!(stmt.text.contains(
            "(name.asString().toLowerCase() like ? OR address.asString().toLowerCase() like ?)"
        ));
        assert!(!stmt.text.contains("Ac'me"));
        assert_eq!(
            stmt.parameters,
            vec![json!("#9:0"), json!("ac'me%"), json!("ac'me%")]
        );
    }

    #[test]
    fn count_ignores_paging_and_shares_conditions() {
        let owner = owner();
        let options = ListOptions {
            skip: Some(10),
            limit: Some(5),
            condition: Some("date > 0".to_owned()),
            ..ListOptions::default()
        };
        let listed = select(EntityKind::Income, Some(&owner), &options).unwrap();
        let counted = count(EntityKind::Income, Some(&owner), &options).unwrap();
        assert!(listed.text.ends_with(" SKIP 10 LIMIT 5"));
        assert_eq!(
            counted.text,
            "SELECT COUNT(*) as count FROM Income WHERE user = ? AND (date > 0)"
        );
        assert_eq!(counted.parameters, listed.parameters);
    }

    #[rstest]
    #[case("name", Some("name"))]
    #[case("name desc", Some("name DESC"))]
    #[case("name; DROP", None)]
    #[case("bogus", None)]
    fn order_tokens_are_sanitized(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            sanitize_order(EntityKind::Company, Some(input)).as_deref(),
            expected
        );
    }

    #[test]
    fn exists_excludes_the_updated_record() {
        let owner = owner();
        let exclude = Rid::parse("5_5").unwrap();
        let stmt = exists(
            EntityKind::Company,
            &[("inn", "4324233".to_owned())],
            Some(&exclude),
            Some(&owner),
        )
        .unwrap();
        assert_eq!(
            stmt.text,
            "SELECT COUNT(*) as count FROM Companies WHERE user = ? AND inn = ? AND @rid <> ?"
        );
        assert_eq!(
            stmt.parameters,
            vec![json!("#9:0"), json!("4324233"), json!("#5:5")]
        );
    }

    #[test]
    fn exists_binds_link_conditions_in_native_form() {
        let owner = owner();
        let stmt = exists(
            EntityKind::Report,
            &[
                ("period", "2021".to_owned()),
                ("type", "kudir".to_owned()),
                ("company", "12_4".to_owned()),
            ],
            None,
            Some(&owner),
        )
        .unwrap();
        assert_eq!(
            stmt.text,
            "SELECT COUNT(*) as count FROM Reports WHERE user = ? AND period = ? \
             AND type = ? AND company = ?"
        );
        assert_eq!(
            stmt.parameters,
            vec![json!("#9:0"), json!("2021"), json!("kudir"), json!("#12:4")]
        );
    }

    #[test]
    fn delete_binds_every_identifier() {
        let owner = owner();
        let rids = vec![Rid::parse("3_1").unwrap(), Rid::parse("3_2").unwrap()];
        let stmt = delete(EntityKind::Income, &rids, Some(&owner)).unwrap();
        assert_eq!(
            stmt.text,
            "DELETE FROM Income WHERE @rid IN [?, ?] AND user = ?"
        );
        assert_eq!(
            stmt.parameters,
            vec![json!("#3:1"), json!("#3:2"), json!("#9:0")]
        );
    }
}
