//! Document store adapter: query construction and the HTTP client that
//! executes the queries.

pub mod http_store;
pub mod query;

pub use http_store::HttpDocumentStore;
pub use query::SqlStatement;
