//! Declared entity schemas.
//!
//! Every entity carries a fixed field table with a semantic type per field;
//! the tables drive (de)serialisation, query projection, and validation
//! dispatch instead of runtime reflection.

use super::field::{FieldSpec, FieldType};

/// The closed set of entity types this application manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Company,
    Account,
    Income,
    Spending,
    Report,
    User,
}

const COMPANY_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "uid", ty: FieldType::Text },
    FieldSpec { name: "name", ty: FieldType::Text },
    FieldSpec { name: "inn", ty: FieldType::Text },
    FieldSpec { name: "kpp", ty: FieldType::Text },
    FieldSpec { name: "type", ty: FieldType::Integer },
    FieldSpec { name: "address", ty: FieldType::Text },
];

const ACCOUNT_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "uid", ty: FieldType::Text },
    FieldSpec { name: "number", ty: FieldType::Text },
    FieldSpec { name: "bik", ty: FieldType::Text },
    FieldSpec { name: "ks", ty: FieldType::Text },
    FieldSpec { name: "bank_name", ty: FieldType::Text },
    FieldSpec {
        name: "company",
        ty: FieldType::Link { target: EntityKind::Company, display: "name" },
    },
];

const INCOME_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "uid", ty: FieldType::Text },
    FieldSpec { name: "number", ty: FieldType::Integer },
    FieldSpec { name: "date", ty: FieldType::Integer },
    FieldSpec { name: "description", ty: FieldType::Text },
    FieldSpec { name: "amount", ty: FieldType::Decimal },
    FieldSpec {
        name: "company",
        ty: FieldType::Link { target: EntityKind::Company, display: "name" },
    },
];

const SPENDING_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "uid", ty: FieldType::Text },
    FieldSpec { name: "number", ty: FieldType::Integer },
    FieldSpec { name: "date", ty: FieldType::Integer },
    FieldSpec { name: "description", ty: FieldType::Text },
    FieldSpec { name: "amount", ty: FieldType::Decimal },
    FieldSpec { name: "type", ty: FieldType::Choice },
    FieldSpec { name: "period", ty: FieldType::Text },
    FieldSpec {
        name: "company",
        ty: FieldType::Link { target: EntityKind::Company, display: "name" },
    },
];

const REPORT_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "uid", ty: FieldType::Text },
    FieldSpec { name: "date", ty: FieldType::Integer },
    FieldSpec { name: "period", ty: FieldType::Integer },
    FieldSpec { name: "type", ty: FieldType::Choice },
    FieldSpec {
        name: "company",
        ty: FieldType::Link { target: EntityKind::Company, display: "name" },
    },
];

const USER_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "uid", ty: FieldType::Text },
    FieldSpec { name: "name", ty: FieldType::Text },
    FieldSpec { name: "password", ty: FieldType::Text },
    // Accepted on registration for the match check, never persisted.
    FieldSpec { name: "confirm_password", ty: FieldType::Text },
    FieldSpec { name: "email", ty: FieldType::Text },
    FieldSpec { name: "active", ty: FieldType::Integer },
    FieldSpec { name: "activation_token", ty: FieldType::Text },
];

impl EntityKind {
    pub const ALL: &'static [EntityKind] = &[
        EntityKind::Company,
        EntityKind::Account,
        EntityKind::Income,
        EntityKind::Spending,
        EntityKind::Report,
        EntityKind::User,
    ];

    /// Class name of the entity in the store.
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Company => "Companies",
            Self::Account => "Accounts",
            Self::Income => "Income",
            Self::Spending => "Spendings",
            Self::Report => "Reports",
            Self::User => "Users",
        }
    }

    /// Path segment of the entity's REST routes (`/api/<route>`).
    pub fn route(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Account => "account",
            Self::Income => "income",
            Self::Spending => "spending",
            Self::Report => "report",
            Self::User => "user",
        }
    }

    /// Declared field table.
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            Self::Company => COMPANY_FIELDS,
            Self::Account => ACCOUNT_FIELDS,
            Self::Income => INCOME_FIELDS,
            Self::Spending => SPENDING_FIELDS,
            Self::Report => REPORT_FIELDS,
            Self::User => USER_FIELDS,
        }
    }

    pub fn field(self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|spec| spec.name == name)
    }

    pub fn field_names(self) -> Vec<String> {
        self.fields().iter().map(|spec| spec.name.to_owned()).collect()
    }

    /// Whether records of this entity belong to an authenticated principal.
    /// Queries and mutations on scoped entities are always owner-filtered.
    pub fn owner_scoped(self) -> bool {
        !matches!(self, Self::User)
    }
}

/// Spending category codes with their display names. Codes ≥ 3 are the
/// insurance-related categories broken out into dedicated columns of the
/// KUDiR spending section.
pub const SPENDING_CATEGORIES: &[(i64, &str)] = &[
    (1, "Оплата налога УСН"),
    (2, "Оплата торгового сбора"),
    (3, "Страховые взносы на обязательное пенсионное страхование"),
    (
        4,
        "Страховые взносы на обязательное социальное страхование на случай \
         временной нетрудоспособности и в связи с материнством",
    ),
    (5, "Страховые взносы на обязательное медицинское страхование"),
    (
        6,
        "Страховые взносы на обязательное социальное страхование от несчастных \
         случаев на производстве и профессиональных заболеваний",
    ),
    (7, "Расходы по выплате пособия по временной нетрудоспособности"),
    (8, "Платежи (взносы) по договорам добровольного личного страхования"),
];

/// Report types available for generation, keyed by route token.
pub const REPORT_TYPES: &[(&str, &str)] = &[("kudir", "Книга учета доходов и расходов")];

pub fn spending_category_name(code: i64) -> Option<&'static str> {
    SPENDING_CATEGORIES
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, name)| *name)
}

pub fn report_type_name(key: &str) -> Option<&'static str> {
    REPORT_TYPES
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_users_are_owner_independent() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.owner_scoped(), *kind != EntityKind::User);
        }
    }

    #[test]
    fn every_schema_declares_uid_first() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.fields()[0].name, "uid");
        }
    }

    #[test]
    fn category_table_has_insurance_codes() {
        assert_eq!(SPENDING_CATEGORIES.len(), 8);
        assert!(spending_category_name(3).is_some());
        assert!(spending_category_name(9).is_none());
    }
}
