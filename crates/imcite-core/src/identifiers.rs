//! DOI normalization and order-preserving deduplication

use std::collections::HashSet;

/// Normalize a raw DOI string.
///
/// Trims surrounding whitespace, strips at most one resolver or scheme
/// prefix, then trims again so `"doi: 10.1000/x"` comes out as
/// `"10.1000/x"`. Prefix matching is case-sensitive and inner
/// whitespace is left untouched.
pub fn normalize_doi(raw: &str) -> String {
    let mut result = raw.trim().to_string();

    // Remove common prefixes
    let prefixes = ["https://doi.org/", "http://doi.org/", "doi:", "DOI:"];

    for prefix in prefixes {
        if let Some(stripped) = result.strip_prefix(prefix) {
            result = stripped.to_string();
            break;
        }
    }

    result.trim().to_string()
}

/// An ordered collection of unique identifiers.
///
/// Keeps the first occurrence of each identifier and drops later exact
/// duplicates, so lookup results line up with the order identifiers
/// were supplied in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierSet {
    ids: Vec<String>,
}

impl IdentifierSet {
    /// Combine identifiers from an uploaded file and manual text entry.
    ///
    /// File identifiers come first, matching the order the user sees
    /// them in.
    pub fn from_sources(file_ids: &[String], manual_ids: &[String]) -> Self {
        file_ids.iter().chain(manual_ids.iter()).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.ids.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ids
    }

    pub fn into_vec(self) -> Vec<String> {
        self.ids
    }
}

impl FromIterator<String> for IdentifierSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut seen = HashSet::new();
        let ids = iter
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Self { ids }
    }
}
