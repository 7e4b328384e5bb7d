//! Identifier collection from uploaded files and free text
//!
//! Uploads are dispatched on file extension: `.csv` goes through the
//! delimited reader, everything else is treated as an XLSX workbook.
//! Both paths look for a `doi` column (any letter case) in the header
//! row, normalize every cell below it, and drop the values that come
//! out empty.

pub mod xlsx;

use std::path::Path;

use thiserror::Error;

use crate::identifiers::normalize_doi;

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("Could not read the uploaded file: {0}")]
    Unreadable(String),

    #[error("No 'doi' column found in the uploaded file.")]
    MissingDoiColumn,
}

/// Extract normalized identifiers from an uploaded file.
pub fn identifiers_from_upload(file_name: &str, bytes: &[u8]) -> Result<Vec<String>, InputError> {
    if has_extension(file_name, "csv") {
        identifiers_from_delimited(bytes)
    } else {
        let rows = xlsx::read_sheet_rows(bytes)?;
        identifiers_from_rows(&rows)
    }
}

/// Extract normalized identifiers from manual text entry, one per line.
pub fn identifiers_from_text(text: &str) -> Vec<String> {
    text.lines()
        .map(normalize_doi)
        .filter(|id| !id.is_empty())
        .collect()
}

/// Extract normalized identifiers from CSV bytes.
pub fn identifiers_from_delimited(bytes: &[u8]) -> Result<Vec<String>, InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let column = {
        let headers = reader
            .headers()
            .map_err(|e| InputError::Unreadable(e.to_string()))?;
        doi_column_index(headers.iter())
    }
    .ok_or(InputError::MissingDoiColumn)?;

    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| InputError::Unreadable(e.to_string()))?;
        if let Some(value) = record.get(column) {
            let id = normalize_doi(value);
            if !id.is_empty() {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

/// Extract normalized identifiers from worksheet rows, header row first.
fn identifiers_from_rows(rows: &[Vec<String>]) -> Result<Vec<String>, InputError> {
    let header = rows.first().ok_or(InputError::MissingDoiColumn)?;
    let column =
        doi_column_index(header.iter().map(String::as_str)).ok_or(InputError::MissingDoiColumn)?;

    Ok(rows[1..]
        .iter()
        .filter_map(|row| row.get(column))
        .map(|value| normalize_doi(value))
        .filter(|id| !id.is_empty())
        .collect())
}

fn doi_column_index<'a>(mut headers: impl Iterator<Item = &'a str>) -> Option<usize> {
    headers.position(|h| h.eq_ignore_ascii_case("doi"))
}

fn has_extension(file_name: &str, extension: &str) -> bool {
    Path::new(file_name)
        .extension()
        .map_or(false, |e| e.eq_ignore_ascii_case(extension))
}
