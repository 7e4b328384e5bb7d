//! Minimal XLSX worksheet reader
//!
//! An XLSX workbook is a zip archive of XML parts. Only the pieces
//! needed to recover cell text from the first worksheet are handled
//! here: the shared string table and the sheet data itself. Formatting,
//! formulas, and additional sheets are ignored.

use std::io::{Cursor, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::result::ZipError;
use zip::ZipArchive;

use super::InputError;

/// Read the first worksheet of an XLSX workbook into rows of cell text.
///
/// Cells are resolved through the shared string table when present.
/// Cell text is taken verbatim, so values padded with whitespace (which
/// writers mark with `xml:space="preserve"`) come back unchanged.
/// Sparse rows are padded with empty strings up to the last populated
/// cell, so column positions derived from the header stay valid.
pub fn read_sheet_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, InputError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| InputError::Unreadable(e.to_string()))?;

    let shared = match read_entry(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_name = first_sheet_name(&archive)
        .ok_or_else(|| InputError::Unreadable("workbook contains no worksheets".to_string()))?;
    let sheet_xml = read_entry(&mut archive, &sheet_name)?
        .ok_or_else(|| InputError::Unreadable("workbook contains no worksheets".to_string()))?;

    parse_sheet(&sheet_xml, &shared)
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, InputError> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut contents = String::new();
            entry
                .read_to_string(&mut contents)
                .map_err(|e| InputError::Unreadable(e.to_string()))?;
            Ok(Some(contents))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(InputError::Unreadable(e.to_string())),
    }
}

/// Worksheet parts sort lexicographically, so sheet1 comes first.
fn first_sheet_name<R: Read + Seek>(archive: &ZipArchive<R>) -> Option<String> {
    let mut names: Vec<&str> = archive
        .file_names()
        .filter(|name| name.starts_with("xl/worksheets/") && name.ends_with(".xml"))
        .collect();
    names.sort_unstable();
    names.first().map(|name| name.to_string())
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, InputError> {
    // Text is only captured inside <t>, so the reader never trims;
    // trimming would eat the whitespace xml:space="preserve" protects.
    let mut reader = Reader::from_str(xml);

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            // Rich text items split their content across several <t> runs
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| InputError::Unreadable(err.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.push(current.clone()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(InputError::Unreadable(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, InputError> {
    let mut reader = Reader::from_str(xml);

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut column = 0usize;
    let mut cell_type = String::new();
    let mut in_value = false;
    let mut in_inline_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"row" => row.clear(),
                b"c" => {
                    cell_type.clear();
                    column = row.len();
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"t" => {
                                cell_type = String::from_utf8_lossy(&attr.value).to_string();
                            }
                            b"r" => {
                                let reference = String::from_utf8_lossy(&attr.value);
                                if let Some(index) = column_index(&reference) {
                                    column = index;
                                }
                            }
                            _ => {}
                        }
                    }
                }
                b"v" => in_value = true,
                b"t" => in_inline_text = cell_type == "inlineStr",
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                // Self-closed rows and cells carry no text
                if e.name().as_ref() == b"row" {
                    rows.push(Vec::new());
                }
            }
            Ok(Event::Text(e)) if in_value || in_inline_text => {
                let raw = e
                    .unescape()
                    .map_err(|err| InputError::Unreadable(err.to_string()))?
                    .into_owned();
                let value = if cell_type == "s" {
                    // The shared index is numeric, so trimming it is safe
                    raw.trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|index| shared.get(index).cloned())
                        .unwrap_or(raw)
                } else {
                    raw
                };
                place_cell(&mut row, column, value);
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"row" => rows.push(std::mem::take(&mut row)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(InputError::Unreadable(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

fn place_cell(row: &mut Vec<String>, column: usize, value: String) {
    while row.len() < column {
        row.push(String::new());
    }
    if row.len() == column {
        row.push(value);
    } else if let Some(slot) = row.get_mut(column) {
        *slot = value;
    }
}

/// Convert a cell reference like `BC12` to a zero-based column index.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<char> = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for letter in letters {
        index = index * 26 + (letter.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}
