//! Metadata source plugins

pub mod crossref;
pub mod traits;
