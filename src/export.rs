//! CSV and XLSX serialization of a table snapshot.
//!
//! Both exporters write the rows verbatim. Jagged rows stay jagged, every
//! cell is text, and row 0 gets no special treatment.

use std::collections::HashMap;
use std::io::{Cursor, Write};

use csv::{QuoteStyle, Terminator, WriterBuilder};
use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::grid::TableData;

pub use crate::config::{CSV_FILENAME, XLSX_FILENAME};

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const SHEET_NAME: &str = "Sheet1";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet export failed: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Export I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Export produced invalid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

// ──────────────────────────────────────────────
// CSV
// ──────────────────────────────────────────────

/// Every cell double-quoted, embedded quotes doubled, rows joined by `\n`
/// with no trailing newline. A row with no cells is an empty line.
pub fn to_csv(table: &TableData) -> Result<String, ExportError> {
    let mut builder = WriterBuilder::new();
    builder
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'));

    let lines = table
        .rows()
        .map(|row| csv_line(&builder, row))
        .collect::<Result<Vec<_>, _>>()?;
    let text = lines.join("\n");

    tracing::debug!(rows = table.row_count(), bytes = text.len(), "CSV export complete");
    Ok(text)
}

fn csv_line(builder: &WriterBuilder, row: &[String]) -> Result<String, ExportError> {
    // The writer renders a zero-field record as `""`
    if row.is_empty() {
        return Ok(String::new());
    }

    let mut writer = builder.from_writer(Vec::new());
    writer.write_record(row)?;
    let bytes = writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))?;
    let mut line = String::from_utf8(bytes)?;
    if line.ends_with('\n') {
        line.pop();
    }
    Ok(line)
}

// ──────────────────────────────────────────────
// XLSX
// ──────────────────────────────────────────────

/// Single-sheet workbook with every cell stored as a shared string.
pub fn to_spreadsheet(table: &TableData) -> Result<Vec<u8>, ExportError> {
    let strings = SharedStrings::collect(table);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", ROOT_RELS_XML.to_string()),
        ("xl/workbook.xml", workbook_xml()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(table, &strings)),
        ("xl/sharedStrings.xml", strings.to_xml()),
    ];

    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }

    let bytes = zip.finish()?.into_inner();
    tracing::debug!(
        rows = table.row_count(),
        unique_strings = strings.unique.len(),
        bytes = bytes.len(),
        "Spreadsheet export complete"
    );
    Ok(bytes)
}

/// Spreadsheet column letters for a zero-based index: 0 → A, 25 → Z, 26 → AA.
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

struct SharedStrings<'a> {
    unique: Vec<&'a str>,
    index: HashMap<&'a str, usize>,
    total: usize,
}

impl<'a> SharedStrings<'a> {
    fn collect(table: &'a TableData) -> Self {
        let mut unique = Vec::new();
        let mut index = HashMap::new();
        let mut total = 0;
        for cell in table.rows().flatten() {
            total += 1;
            index.entry(cell.as_str()).or_insert_with(|| {
                unique.push(cell.as_str());
                unique.len() - 1
            });
        }
        Self { unique, index, total }
    }

    fn position(&self, value: &str) -> usize {
        self.index.get(value).copied().unwrap_or_default()
    }

    fn to_xml(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(&format!(
            r#"<sst xmlns="{SPREADSHEET_NS}" count="{}" uniqueCount="{}">"#,
            self.total,
            self.unique.len()
        ));
        for value in &self.unique {
            xml.push_str(r#"<si><t xml:space="preserve">"#);
            xml.push_str(&escape(&xml_text(value)));
            xml.push_str("</t></si>");
        }
        xml.push_str("</sst>");
        xml
    }
}

fn sheet_xml(table: &TableData, strings: &SharedStrings<'_>) -> String {
    let mut xml = String::from(XML_DECL);
    xml.push_str(&format!(r#"<worksheet xmlns="{SPREADSHEET_NS}"><sheetData>"#));
    for (r, row) in table.rows().enumerate() {
        let row_ref = r + 1;
        xml.push_str(&format!(r#"<row r="{row_ref}">"#));
        for (c, cell) in row.iter().enumerate() {
            xml.push_str(&format!(
                r#"<c r="{}{row_ref}" t="s"><v>{}</v></c>"#,
                column_name(c),
                strings.position(cell)
            ));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn workbook_xml() -> String {
    format!(
        r#"{XML_DECL}<workbook xmlns="{SPREADSHEET_NS}" xmlns:r="{REL_NS}"><sheets><sheet name="{SHEET_NAME}" sheetId="1" r:id="rId1"/></sheets></workbook>"#
    )
}

/// Drop characters XML 1.0 cannot carry.
fn xml_text(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#;
