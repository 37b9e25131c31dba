use crate::document::DocumentError;
use crate::document::Table;
use crate::document::TableSource;
use crate::error::MemoExtractorError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::Read;
use zip::ZipArchive;

/// ODT file MIME type identifier
const MIME_TYPE: &str = "application/vnd.oasis.opendocument.text";
/// XML element name for table
const TABLE: QName = QName(b"table:table");
/// XML element name for table row
const TABLE_ROW: QName = QName(b"table:table-row");
/// XML element name for table cell
const TABLE_CELL: QName = QName(b"table:table-cell");
/// XML element name for covered table cell (merged cells)
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// XML element names for paragraphs and headings
const PARAGRAPH: QName = QName(b"text:p");
const HEADING: QName = QName(b"text:h");
/// XML element name for string (space) text
const SPACE: QName = QName(b"text:s");
const TAB: QName = QName(b"text:tab");
const LINE_BREAK: QName = QName(b"text:line-break");
/// Comments and footnotes never count as cell text
const SKIPPED_SUBTREES: [QName; 2] = [QName(b"office:annotation"), QName(b"text:note")];

// Bounds on repeated rows and cells of one table
const MAX_TABLE_ROWS: usize = 65_536;
const MAX_TABLE_COLUMNS: usize = 1_024;
const MAX_TABLE_CELLS: usize = 1 << 20;

/// OpenDocument Text (.odt) document reader
pub(crate) struct OdtDocument {
    name: String,
    zip: ZipArchive<UnifiedReader>,
}

impl OdtDocument {
    /// Opens the package, validating its MIME type and rejecting encrypted content
    pub(crate) fn new(name: &str, reader: UnifiedReader) -> Result<Self, MemoExtractorError> {
        let mut zip = ZipArchive::new(reader)?;
        check_mime(name, &mut zip)?;
        if is_password_protected(&mut zip)? {
            Err(DocumentError::LegacyOrProtected(name.to_owned()))?;
        }
        Ok(OdtDocument {
            name: name.to_owned(),
            zip,
        })
    }
}

impl TableSource for OdtDocument {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    /// Collects every top-level `table:table` of `content.xml`, expanding
    /// repeated rows and columns within the table limits.
    fn read_tables(&mut self) -> Result<Vec<Table>, MemoExtractorError> {
        let mut reader = self.zip
            .xml_reader("content.xml")?
            .ok_or_else(|| DocumentError::MissingPart(self.name.to_owned(), "content.xml".to_owned()))?;

        let mut tables = Vec::<Table>::new();
        let mut buffer = TableBuffer::new(&self.name);
        let mut value = String::new();

        let mut table_depth = 0usize;
        let mut skip_depth = 0usize;
        let mut row_count = 1usize;
        let mut col_count = 1usize;
        let mut in_cell = false;
        let mut paragraph_depth = 0usize;
        let mut paragraphs = 0usize;

        match_xml_events!(reader => {
            Event::Start(event) if skip_depth > 0 || SKIPPED_SUBTREES.contains(&event.name()) => skip_depth += 1,
            Event::End(_) if skip_depth > 0 => skip_depth -= 1,
            _ if skip_depth > 0 => (),

            Event::Start(event) if event.name() == TABLE => {
                table_depth += 1;
                if table_depth == 1 {
                    buffer.clear();
                }
            }
            Event::End(event) if event.name() == TABLE => {
                if table_depth == 1 {
                    tables.push(buffer.finish()?);
                }
                table_depth = table_depth.saturating_sub(1);
            }
            _ if table_depth != 1 => (),

            Event::Start(event) if event.name() == TABLE_ROW => {
                row_count = event.parse_attribute_value("table:number-rows-repeated")?.unwrap_or(1);
            }
            Event::End(event) if event.name() == TABLE_ROW => buffer.end_row(row_count)?,
            Event::Start(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                col_count = event.parse_attribute_value("table:number-columns-repeated")?.unwrap_or(1);
                in_cell = true;
                paragraphs = 0;
                value.clear();
            }
            Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                in_cell = false;
                buffer.push_cell(value.trim(), col_count)?;
            }
            _ if !in_cell => (),

            Event::Start(event) if event.name() == PARAGRAPH || event.name() == HEADING => {
                if paragraph_depth == 0 {
                    if paragraphs > 0 {
                        value.push('\n');
                    }
                    paragraphs += 1;
                }
                paragraph_depth += 1;
            }
            Event::End(event) if event.name() == PARAGRAPH || event.name() == HEADING => {
                paragraph_depth = paragraph_depth.saturating_sub(1);
            }
            _ if paragraph_depth == 0 => (),

            Event::Start(event) if event.name() == SPACE => {
                let count = event.parse_attribute_value("text:c")?.unwrap_or(1usize);
                for _ in 0..count {
                    value.push(' ');
                }
            }
            Event::Start(event) if event.name() == TAB => value.push('\t'),
            Event::Start(event) if event.name() == LINE_BREAK => value.push('\n'),
            Event::Text(event) => value.push_bytes_text(&event)?,
            Event::GeneralRef(event) => value.push_bytes_ref(&event)?,
        });

        Ok(tables)
    }
}

/// Rows of the table being read.
///
/// Repeated rows and cells are materialized only up to the table limits.
/// Empty cells and rows are held back until non-empty content follows them;
/// trailing ones are kept while they fit and dropped beyond that. Non-empty
/// content past a limit fails the document with `TableTooLarge`.
struct TableBuffer {
    name: String,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell_count: usize,
    pending_cells: usize,
    pending_rows: usize,
}

impl TableBuffer {
    fn new(name: &str) -> Self {
        TableBuffer {
            name: name.to_owned(),
            rows: Vec::new(),
            row: Vec::new(),
            cell_count: 0,
            pending_cells: 0,
            pending_rows: 0,
        }
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.row.clear();
        self.cell_count = 0;
        self.pending_cells = 0;
        self.pending_rows = 0;
    }

    fn too_large(&self) -> DocumentError {
        DocumentError::TableTooLarge(self.name.to_owned())
    }

    fn push_cell(&mut self, text: &str, repeat: usize) -> Result<(), DocumentError> {
        if text.is_empty() {
            self.pending_cells = self.pending_cells.saturating_add(repeat);
            return Ok(());
        }
        let added = self.pending_cells.saturating_add(repeat);
        if self.row.len().saturating_add(added) > MAX_TABLE_COLUMNS
            || self.cell_count.saturating_add(added) > MAX_TABLE_CELLS
        {
            return Err(self.too_large());
        }
        self.row.extend(std::iter::repeat(String::new()).take(self.pending_cells));
        self.row.extend(std::iter::repeat(text.to_owned()).take(repeat));
        self.cell_count += added;
        self.pending_cells = 0;
        Ok(())
    }

    fn end_row(&mut self, repeat: usize) -> Result<(), DocumentError> {
        let repeat = repeat.max(1);
        let trailing = std::mem::take(&mut self.pending_cells);
        let mut row = std::mem::take(&mut self.row);
        if row.is_empty() {
            // Width of a row of empty cells comes from padding
            self.pending_rows = self.pending_rows.saturating_add(repeat);
            return Ok(());
        }

        let base = self.cell_count - row.len();
        let count = self.rows.len().saturating_add(self.pending_rows).saturating_add(repeat);
        if count > MAX_TABLE_ROWS || base.saturating_add(row.len().saturating_mul(repeat)) > MAX_TABLE_CELLS {
            return Err(self.too_large());
        }
        let width = ((MAX_TABLE_CELLS - base) / repeat).min(MAX_TABLE_COLUMNS);
        let room = width.saturating_sub(row.len());
        row.extend(std::iter::repeat(String::new()).take(trailing.min(room)));

        self.rows.extend(std::iter::repeat(Vec::new()).take(self.pending_rows));
        self.pending_rows = 0;
        self.cell_count = base + row.len() * repeat;
        for _ in 1..repeat {
            self.rows.push(row.clone());
        }
        self.rows.push(row);
        Ok(())
    }

    fn finish(&mut self) -> Result<Table, DocumentError> {
        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        if self.rows.len().saturating_mul(width) > MAX_TABLE_CELLS {
            return Err(self.too_large());
        }
        let fitting = (MAX_TABLE_CELLS / width.max(1)).min(MAX_TABLE_ROWS);
        let trailing = self.pending_rows.min(fitting.saturating_sub(self.rows.len()));
        self.rows.extend(std::iter::repeat(Vec::new()).take(trailing));
        let table = Table::new(std::mem::take(&mut self.rows));
        self.clear();
        Ok(table)
    }
}

/// Validates the `mimetype` entry when the package has one
fn check_mime(name: &str, zip: &mut ZipArchive<UnifiedReader>) -> Result<(), MemoExtractorError> {
    if let Some(file) = &mut zip.file("mimetype")? {
        let mut mime_type = String::new();
        file.read_to_string(&mut mime_type)?;
        if mime_type.trim() != MIME_TYPE {
            Err(DocumentError::MimeTypeError(name.to_owned()))?;
        }
    }
    Ok(())
}

/// Checks the manifest for encryption data on any entry
fn is_password_protected(zip: &mut ZipArchive<UnifiedReader>) -> Result<bool, MemoExtractorError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = true,
        Event::End(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == QName(b"manifest:encryption-data") => {
            return Ok(true);
        }
    });
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::odt_bytes;
    use crate::testing::odt_from_body;

    fn read(bytes: Vec<u8>) -> Result<Vec<Table>, MemoExtractorError> {
        let mut document = OdtDocument::new("test.odt", UnifiedReader::from_bytes(bytes))?;
        document.read_tables()
    }

    #[test]
    fn tables_in_document_order() {
        let tables = read(odt_bytes(&[
            vec![vec!["Branch", ":", "Motijheel"]],
            vec![vec!["UH: Rahim"], vec!["AH", "Karim"]],
        ])).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].cell(0, 2), Some("Motijheel"));
        assert_eq!(tables[1].col_count(), 2);
        assert_eq!(tables[1].cell(0, 1), Some(""));
        assert_eq!(tables[1].cell(1, 1), Some("Karim"));
    }

    #[test]
    fn repeated_cells_and_rows() {
        let body = concat!(
            r#"<table:table table:name="T1">"#,
            r#"<table:table-row table:number-rows-repeated="2">"#,
            r#"<table:table-cell table:number-columns-repeated="2"><text:p>x</text:p></table:table-cell>"#,
            r#"<table:covered-table-cell/>"#,
            r#"</table:table-row>"#,
            r#"</table:table>"#,
        );
        let tables = read(odt_from_body(body)).unwrap();
        assert_eq!(tables[0].row_count(), 2);
        assert_eq!(tables[0].col_count(), 3);
        assert_eq!(tables[0].cell(1, 1), Some("x"));
        assert_eq!(tables[0].cell(1, 2), Some(""));
    }

    #[test]
    fn repeated_empty_cells_and_rows_are_bounded() {
        let body = concat!(
            r#"<table:table table:name="T1">"#,
            r#"<table:table-row>"#,
            r#"<table:table-cell><text:p>Branch</text:p></table:table-cell>"#,
            r#"<table:table-cell table:number-columns-repeated="4000000000"/>"#,
            r#"</table:table-row>"#,
            r#"<table:table-row table:number-rows-repeated="1000000000">"#,
            r#"<table:table-cell table:number-columns-repeated="16384"/>"#,
            r#"</table:table-row>"#,
            r#"</table:table>"#,
            r#"<table:table table:name="T2"><table:table-row>"#,
            r#"<table:table-cell><text:p>RM</text:p></table:table-cell>"#,
            r#"<table:table-cell table:number-columns-repeated="3"/>"#,
            r#"<table:table-cell><text:p>John</text:p></table:table-cell>"#,
            r#"</table:table-row></table:table>"#,
        );
        let tables = read(odt_from_body(body)).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].cell(0, 0), Some("Branch"));
        assert_eq!(tables[0].col_count(), MAX_TABLE_COLUMNS);
        assert_eq!(tables[0].row_count(), MAX_TABLE_CELLS / MAX_TABLE_COLUMNS);
        assert_eq!(tables[1].col_count(), 5);
        assert_eq!(tables[1].cell(0, 4), Some("John"));
    }

    #[test]
    fn repeated_content_beyond_limits_fails() {
        let wide = concat!(
            r#"<table:table><table:table-row>"#,
            r#"<table:table-cell table:number-columns-repeated="4000000000"><text:p>x</text:p></table:table-cell>"#,
            r#"</table:table-row></table:table>"#,
        );
        let error = read(odt_from_body(wide)).unwrap_err();
        assert!(matches!(error, MemoExtractorError::DocumentError(DocumentError::TableTooLarge(_))));

        let tall = concat!(
            r#"<table:table><table:table-row table:number-rows-repeated="4000000000">"#,
            r#"<table:table-cell><text:p>x</text:p></table:table-cell>"#,
            r#"</table:table-row></table:table>"#,
        );
        let error = read(odt_from_body(tall)).unwrap_err();
        assert!(matches!(error, MemoExtractorError::DocumentError(DocumentError::TableTooLarge(_))));
    }

    #[test]
    fn cell_text_specials() {
        let body = concat!(
            r#"<table:table><table:table-row><table:table-cell>"#,
            r#"<text:p>Risk<text:s text:c="2"/>UH<office:annotation><text:p>note</text:p></office:annotation></text:p>"#,
            r#"<text:h>Lending<text:tab/>Rate<text:line-break/>9%</text:h>"#,
            r#"<text:p><text:span>E&amp;S</text:span></text:p>"#,
            r#"<table:table><table:table-row><table:table-cell><text:p>Inner</text:p></table:table-cell></table:table-row></table:table>"#,
            r#"</table:table-cell></table:table-row></table:table>"#,
        );
        let tables = read(odt_from_body(body)).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].cell(0, 0), Some("Risk  UH\nLending\tRate\n9%\nE&S"));
    }

    #[test]
    fn wrong_mime_type() {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        zip.start_file("mimetype", zip::write::SimpleFileOptions::default()).unwrap();
        std::io::Write::write_all(&mut zip, b"application/vnd.oasis.opendocument.spreadsheet").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        let error = read(bytes).unwrap_err();
        assert!(matches!(error, MemoExtractorError::DocumentError(DocumentError::MimeTypeError(_))));
    }
}
