//! Common types for source plugins

use thiserror::Error;

use crate::http::HttpError;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0}")]
    Http(HttpError),
    #[error("unexpected status {status}")]
    Status { status: u16 },
    #[error("{0}")]
    Parse(String),
    #[error("rate limited")]
    RateLimit,
}

impl From<HttpError> for SourceError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::RateLimited => SourceError::RateLimit,
            other => SourceError::Http(other),
        }
    }
}

/// Metadata about a source
pub struct SourceMetadata {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub base_url: &'static str,
    pub rate_limit_per_second: f32,
    pub requires_api_key: bool,
}
