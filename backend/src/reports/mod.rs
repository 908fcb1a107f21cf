//! Report aggregation and rendering.

pub mod kudir;
pub mod workdir;

pub use kudir::{KudirData, ReportError};
pub use workdir::ReportWorkdir;
