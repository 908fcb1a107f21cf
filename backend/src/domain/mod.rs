//! Domain model: entity schemas, dynamically typed records, validation, and
//! the ports adapters implement.

pub mod entities;
pub mod field;
pub mod ports;
pub mod record;
pub mod schema;
pub mod validate;

pub use field::{FieldSpec, FieldType, FieldValue};
pub use ports::{ListOptions, MailError, MailMessage, Mailer, RecordLookup, StoreError, StorePort};
pub use record::{record_from_row, Record, Rid};
pub use schema::EntityKind;
