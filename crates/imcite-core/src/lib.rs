//! imcite-core: DOI metadata pipeline
//!
//! The library behind imcite. It collects DOIs from uploads and pasted
//! text, normalizes and deduplicates them, looks each one up against
//! Crossref with session-scoped memoization, flattens the returned
//! records into one rectangular table, and serializes that table as
//! CSV or XLSX bytes.
//!
//! The pipeline is plain async Rust with no server dependencies; the
//! HTTP surface lives in the `imcite-server` crate.

pub mod export;
pub mod fetch;
pub mod http;
pub mod identifiers;
pub mod input;
pub mod sources;
pub mod table;

pub use export::{to_csv_bytes, to_xlsx_bytes, ExportError};
pub use fetch::{fetch_all, fetch_with_cache, FetchCache, FetchOutcome, FetchReport};
pub use http::{HttpClient, HttpError, HttpResponse};
pub use identifiers::{normalize_doi, IdentifierSet};
pub use input::{identifiers_from_text, identifiers_from_upload, InputError};
pub use sources::crossref::CrossrefSource;
pub use sources::traits::{SourceError, SourceMetadata};
pub use table::{flatten_record, MetadataRecord, ResultTable};
