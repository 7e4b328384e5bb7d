//! Batch metadata fetching with per-session memoization
//!
//! Lookups run one at a time, in input order. Every result, including
//! a failure's empty record, is cached under the normalized identifier
//! so repeat runs in the same session skip the network entirely. A
//! failed lookup becomes a warning and an empty record; it never
//! aborts the batch.

use std::collections::HashMap;

use crate::sources::crossref::CrossrefSource;
use crate::sources::traits::SourceError;
use crate::table::MetadataRecord;

/// Session-scoped cache of fetched records, keyed by normalized DOI.
#[derive(Debug, Clone, Default)]
pub struct FetchCache {
    records: HashMap<String, MetadataRecord>,
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&MetadataRecord> {
        self.records.get(id)
    }

    pub fn insert(&mut self, id: String, record: MetadataRecord) {
        self.records.insert(id, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The result of a single cached lookup.
pub struct FetchOutcome {
    pub record: MetadataRecord,
    pub warning: Option<String>,
    pub from_cache: bool,
}

/// Everything a batch produced: one record per identifier, in input
/// order, plus the warnings raised along the way.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub records: Vec<MetadataRecord>,
    pub warnings: Vec<String>,
}

impl FetchReport {
    /// True when not a single lookup returned any fields.
    pub fn all_empty(&self) -> bool {
        self.records.iter().all(|record| record.is_empty())
    }
}

/// Look up one identifier, consulting the cache first.
pub async fn fetch_with_cache(
    source: &CrossrefSource,
    cache: &mut FetchCache,
    id: &str,
) -> FetchOutcome {
    if let Some(record) = cache.get(id) {
        return FetchOutcome {
            record: record.clone(),
            warning: None,
            from_cache: true,
        };
    }

    let (record, warning) = match source.fetch_work(id).await {
        Ok(record) => (record, None),
        Err(err) => (MetadataRecord::new(), Some(warning_for(id, &err))),
    };

    cache.insert(id.to_string(), record.clone());
    FetchOutcome {
        record,
        warning,
        from_cache: false,
    }
}

/// Fetch a whole batch sequentially.
///
/// `progress` is called after each lookup with the number completed
/// and the batch total.
pub async fn fetch_all<F>(
    source: &CrossrefSource,
    cache: &mut FetchCache,
    ids: &[String],
    mut progress: F,
) -> FetchReport
where
    F: FnMut(usize, usize),
{
    let total = ids.len();
    let mut records = Vec::with_capacity(total);
    let mut warnings = Vec::new();

    for (index, id) in ids.iter().enumerate() {
        let outcome = fetch_with_cache(source, cache, id).await;
        records.push(outcome.record);
        if let Some(warning) = outcome.warning {
            warnings.push(warning);
        }
        progress(index + 1, total);
    }

    FetchReport { records, warnings }
}

fn warning_for(id: &str, err: &SourceError) -> String {
    match err {
        SourceError::Status { status } => {
            format!("Failed to fetch metadata for DOI: {} (status {})", id, status)
        }
        other => format!("Error fetching metadata for DOI {}: {}", id, other),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn cache_returns_inserted_records() {
        let mut cache = FetchCache::new();
        assert!(cache.is_empty());

        let mut record = MetadataRecord::new();
        record.insert("title".to_string(), json!("A Paper"));
        cache.insert("10.1/a".to_string(), record);

        assert_eq!(cache.len(), 1);
        assert!(cache.get("10.1/a").is_some());
        assert!(cache.get("10.1/b").is_none());
    }

    #[test]
    fn all_empty_requires_every_record_empty() {
        let mut populated = MetadataRecord::new();
        populated.insert("title".to_string(), json!("A Paper"));

        let report = FetchReport {
            records: vec![MetadataRecord::new(), populated],
            warnings: Vec::new(),
        };
        assert!(!report.all_empty());

        let report = FetchReport {
            records: vec![MetadataRecord::new(), MetadataRecord::new()],
            warnings: Vec::new(),
        };
        assert!(report.all_empty());
    }

    #[test]
    fn status_failures_use_the_status_warning_shape() {
        let warning = warning_for("10.1/x", &SourceError::Status { status: 404 });
        assert_eq!(
            warning,
            "Failed to fetch metadata for DOI: 10.1/x (status 404)"
        );
    }

    #[test]
    fn other_failures_use_the_error_warning_shape() {
        let warning = warning_for("10.1/x", &SourceError::Parse("bad json".to_string()));
        assert_eq!(warning, "Error fetching metadata for DOI 10.1/x: bad json");
    }
}
