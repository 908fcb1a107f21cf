//! HTTP surface: auth extractor, response envelope, and the route handlers.

pub mod auth;
pub mod crud;
pub mod envelope;
pub mod reports;
pub mod spendings;
pub mod state;
pub mod users;

pub use state::AppState;
