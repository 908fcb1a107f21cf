//! Bookkeeping backend: a REST service over a remote document store with
//! per-user data scoping, statutory report generation, and account mail.

pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod reports;
pub mod server;
pub mod sweeper;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use middleware::Trace;
