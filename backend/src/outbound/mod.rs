//! Outbound adapters: the document store client and the SMTP transport.

pub mod mail;
pub mod store;

pub use mail::SmtpMailer;
pub use store::HttpDocumentStore;
