//! Crossref source plugin for DOI metadata
//!
//! API docs: https://api.crossref.org/swagger-ui/index.html
//! Rate limit: Polite pool with mailto in the User-Agent, ~50 req/sec

use serde::Deserialize;
use serde_json::Value;

use super::traits::{SourceError, SourceMetadata};
use crate::http::HttpClient;
use crate::table::MetadataRecord;

const CROSSREF_API: &str = "https://api.crossref.org";

/// Envelope around a works lookup. The payload under `message` is kept
/// loose so every field Crossref returns survives into the record.
#[derive(Debug, Deserialize)]
struct WorksEnvelope {
    message: Option<Value>,
}

#[derive(Clone)]
pub struct CrossrefSource {
    client: HttpClient,
    base_url: String,
}

impl CrossrefSource {
    pub fn new() -> Self {
        Self::with_contact(None)
    }

    /// Build a source for the polite pool. With a contact address the
    /// User-Agent carries a `mailto:` so Crossref can reach out about
    /// traffic instead of throttling it.
    pub fn with_contact(contact: Option<&str>) -> Self {
        let user_agent = match contact {
            Some(address) => format!(
                "imcite/{} (https://github.com/yipihey/imcite; mailto:{})",
                env!("CARGO_PKG_VERSION"),
                address
            ),
            None => format!(
                "imcite/{} (https://github.com/yipihey/imcite)",
                env!("CARGO_PKG_VERSION")
            ),
        };

        Self {
            client: HttpClient::new(&user_agent),
            base_url: CROSSREF_API.to_string(),
        }
    }

    /// Point the source at a different endpoint, mainly for tests.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn metadata() -> SourceMetadata {
        SourceMetadata {
            id: "crossref",
            name: "Crossref",
            description: "DOI registration agency with metadata for scholarly works",
            base_url: CROSSREF_API,
            rate_limit_per_second: 50.0,
            requires_api_key: false,
        }
    }

    pub fn user_agent(&self) -> &str {
        self.client.user_agent()
    }

    /// URL for a single works lookup. The DOI lands in the path, so it
    /// is percent-encoded as one segment.
    pub fn works_url(&self, doi: &str) -> String {
        format!("{}/works/{}", self.base_url, urlencoding::encode(doi))
    }

    /// Fetch the metadata record for one DOI.
    ///
    /// A 200 response yields the fields under `message`; if `message`
    /// is missing or not an object the record is empty. Any other
    /// status is an error for the caller to report.
    pub async fn fetch_work(&self, doi: &str) -> Result<MetadataRecord, SourceError> {
        let url = self.works_url(doi);
        let response = self.client.get(&url).await?;

        if response.status != 200 {
            return Err(SourceError::Status {
                status: response.status,
            });
        }

        Self::parse_work_message(&response.body)
    }

    /// Parse a works response body into a loose metadata record.
    pub fn parse_work_message(json: &str) -> Result<MetadataRecord, SourceError> {
        let envelope: WorksEnvelope = serde_json::from_str(json)
            .map_err(|e| SourceError::Parse(format!("Invalid Crossref JSON: {}", e)))?;

        Ok(match envelope.message {
            Some(Value::Object(map)) => map,
            _ => MetadataRecord::new(),
        })
    }
}

impl Default for CrossrefSource {
    fn default() -> Self {
        Self::new()
    }
}
