//! Minimal XLSX workbook writer
//!
//! Emits the smallest package Excel accepts: content types, the two
//! relationship parts, a workbook with a single sheet, and the sheet
//! data itself. Every cell is written as an inline string, which keeps
//! the writer free of a shared string table and styles.

use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::ExportError;
use crate::table::ResultTable;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

/// Serialize the table as a single-sheet XLSX workbook.
pub fn to_xlsx_bytes(table: &ResultTable) -> Result<Vec<u8>, ExportError> {
    let mut archive = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    write_part(&mut archive, "[Content_Types].xml", CONTENT_TYPES, options)?;
    write_part(&mut archive, "_rels/.rels", ROOT_RELS, options)?;
    write_part(&mut archive, "xl/workbook.xml", WORKBOOK, options)?;
    write_part(&mut archive, "xl/_rels/workbook.xml.rels", WORKBOOK_RELS, options)?;

    let sheet = sheet_xml(table)?;
    archive
        .start_file("xl/worksheets/sheet1.xml", options)
        .map_err(|e| ExportError::Sheet(e.to_string()))?;
    archive
        .write_all(&sheet)
        .map_err(|e| ExportError::Sheet(e.to_string()))?;

    let cursor = archive
        .finish()
        .map_err(|e| ExportError::Sheet(e.to_string()))?;
    Ok(cursor.into_inner())
}

fn write_part(
    archive: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    contents: &str,
    options: SimpleFileOptions,
) -> Result<(), ExportError> {
    archive
        .start_file(name, options)
        .map_err(|e| ExportError::Sheet(e.to_string()))?;
    archive
        .write_all(contents.as_bytes())
        .map_err(|e| ExportError::Sheet(e.to_string()))
}

fn sheet_xml(table: &ResultTable) -> Result<Vec<u8>, ExportError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(|e| ExportError::Sheet(e.to_string()))?;

    let mut worksheet = BytesStart::new("worksheet");
    worksheet.push_attribute((
        "xmlns",
        "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
    ));
    writer
        .write_event(Event::Start(worksheet))
        .map_err(|e| ExportError::Sheet(e.to_string()))?;
    writer
        .write_event(Event::Start(BytesStart::new("sheetData")))
        .map_err(|e| ExportError::Sheet(e.to_string()))?;

    write_row(&mut writer, 1, table.columns().iter().map(String::as_str))?;
    for (index, row) in table.rows().iter().enumerate() {
        write_row(&mut writer, index + 2, row.iter().map(String::as_str))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("sheetData")))
        .map_err(|e| ExportError::Sheet(e.to_string()))?;
    writer
        .write_event(Event::End(BytesEnd::new("worksheet")))
        .map_err(|e| ExportError::Sheet(e.to_string()))?;

    Ok(writer.into_inner())
}

fn write_row<'a, W: Write>(
    writer: &mut Writer<W>,
    number: usize,
    values: impl Iterator<Item = &'a str>,
) -> Result<(), ExportError> {
    let sheet_err = |e: quick_xml::Error| ExportError::Sheet(e.to_string());

    let mut row = BytesStart::new("row");
    row.push_attribute(("r", number.to_string().as_str()));
    writer.write_event(Event::Start(row)).map_err(sheet_err)?;

    for (column, value) in values.enumerate() {
        let reference = format!("{}{}", column_letter(column), number);
        let mut cell = BytesStart::new("c");
        cell.push_attribute(("r", reference.as_str()));
        cell.push_attribute(("t", "inlineStr"));
        writer.write_event(Event::Start(cell)).map_err(sheet_err)?;
        writer
            .write_event(Event::Start(BytesStart::new("is")))
            .map_err(sheet_err)?;

        // xml:space keeps leading and trailing whitespace intact
        let mut text = BytesStart::new("t");
        text.push_attribute(("xml:space", "preserve"));
        writer.write_event(Event::Start(text)).map_err(sheet_err)?;
        writer
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(sheet_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("t")))
            .map_err(sheet_err)?;

        writer
            .write_event(Event::End(BytesEnd::new("is")))
            .map_err(sheet_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("c")))
            .map_err(sheet_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("row")))
        .map_err(sheet_err)
}

/// Convert a zero-based column index to spreadsheet letters.
fn column_letter(index: usize) -> String {
    let mut index = index;
    let mut letters = String::new();
    loop {
        let remainder = index % 26;
        letters.insert(0, (b'A' + remainder as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters
}
