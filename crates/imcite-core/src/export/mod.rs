//! Export pipelines for tabular downloads
//!
//! Both exporters serialize a [`ResultTable`] to an in-memory byte
//! buffer: no temporary files, the server hands the bytes straight to
//! the download response.

pub mod xlsx;

use thiserror::Error;

use crate::table::ResultTable;

pub use xlsx::to_xlsx_bytes;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV serialization failed: {0}")]
    Csv(String),
    #[error("Spreadsheet serialization failed: {0}")]
    Sheet(String),
}

/// Serialize the table as UTF-8 CSV, header row first.
pub fn to_csv_bytes(table: &ResultTable) -> Result<Vec<u8>, ExportError> {
    if table.columns().is_empty() {
        return Ok(Vec::new());
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.columns())
        .map_err(|e| ExportError::Csv(e.to_string()))?;
    for row in table.rows() {
        writer
            .write_record(row)
            .map_err(|e| ExportError::Csv(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.to_string()))
}
