//! imcite Server Binary
//!
//! Standalone server for the Crossref metadata fetcher.

use std::sync::Arc;

use imcite_core::sources::crossref::CrossrefSource;
use imcite_server::{serve, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // A contact address opts lookups into the Crossref polite pool
    let contact = std::env::var("IMCITE_CONTACT").ok();
    let source = CrossrefSource::with_contact(contact.as_deref());

    let state = Arc::new(AppState::with_source(source));
    let addr = std::env::var("IMCITE_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    serve(&addr, state).await
}
