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
use zip::ZipArchive;

// Local names of the WordprocessingML elements that carry table text
const TAG_TABLE: &[u8] = b"tbl";
const TAG_ROW: &[u8] = b"tr";
const TAG_CELL: &[u8] = b"tc";
const TAG_PARAGRAPH: &[u8] = b"p";
const TAG_TEXT: &[u8] = b"t";
const TAG_TAB: &[u8] = b"tab";
const TAG_BREAK: &[u8] = b"br";
const TAG_CARRIAGE_RETURN: &[u8] = b"cr";
const TAG_NO_BREAK_HYPHEN: &[u8] = b"noBreakHyphen";
const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Subtrees whose text never belongs to the cell: paragraph properties (tab stops),
/// drawings and text boxes, and alternate content blocks.
const SKIPPED_SUBTREES: [&[u8]; 5] = [b"pPr", b"drawing", b"pict", b"object", b"AlternateContent"];

const DEFAULT_MAIN_PART: &str = "word/document.xml";

/// WordprocessingML (.docx) document reader
pub(crate) struct DocxDocument {
    name: String,
    zip: ZipArchive<UnifiedReader>,
    main_part: String,
}

impl DocxDocument {
    /// Opens the package and locates its main document part
    pub(crate) fn new(name: &str, reader: UnifiedReader) -> Result<Self, MemoExtractorError> {
        let mut zip = ZipArchive::new(reader)?;
        let main_part = load_main_part(&mut zip)?.unwrap_or_else(|| DEFAULT_MAIN_PART.to_owned());
        Ok(DocxDocument {
            name: name.to_owned(),
            zip,
            main_part,
        })
    }
}

impl TableSource for DocxDocument {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    /// Streams the main part and collects every top-level `w:tbl`.
    ///
    /// Tables nested inside a cell are neither reported nor included in the
    /// enclosing cell's text. Paragraphs of a cell are joined with `\n`.
    fn read_tables(&mut self) -> Result<Vec<Table>, MemoExtractorError> {
        let mut reader = self.zip
            .xml_reader(&self.main_part)?
            .ok_or_else(|| DocumentError::MissingPart(self.name.to_owned(), self.main_part.to_owned()))?;

        let mut tables = Vec::<Table>::new();
        let mut rows = Vec::<Vec<String>>::new();
        let mut row = Vec::<String>::new();
        let mut value = String::new();

        let mut table_depth = 0usize;
        let mut skip_depth = 0usize;
        let mut in_cell = false;
        let mut in_text = false;
        let mut paragraphs = 0usize;

        match_xml_events!(reader => {
            Event::Start(event) if skip_depth > 0 || SKIPPED_SUBTREES.contains(&event.local_name().as_ref()) => {
                skip_depth += 1;
            }
            Event::End(_) if skip_depth > 0 => skip_depth -= 1,
            _ if skip_depth > 0 => (),

            Event::Start(event) if event.local_name().as_ref() == TAG_TABLE => {
                table_depth += 1;
                if table_depth == 1 {
                    rows.clear();
                }
            }
            Event::End(event) if event.local_name().as_ref() == TAG_TABLE => {
                if table_depth == 1 {
                    tables.push(Table::new(std::mem::take(&mut rows)));
                }
                table_depth = table_depth.saturating_sub(1);
            }
            // Outside any table, or inside a nested one
            _ if table_depth != 1 => (),

            Event::Start(event) if event.local_name().as_ref() == TAG_ROW => row.clear(),
            Event::End(event) if event.local_name().as_ref() == TAG_ROW => {
                rows.push(std::mem::take(&mut row));
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_CELL => {
                in_cell = true;
                paragraphs = 0;
                value.clear();
            }
            Event::End(event) if event.local_name().as_ref() == TAG_CELL => {
                in_cell = false;
                row.push(value.trim().to_owned());
            }
            _ if !in_cell => (),

            Event::Start(event) if event.local_name().as_ref() == TAG_PARAGRAPH => {
                if paragraphs > 0 {
                    value.push('\n');
                }
                paragraphs += 1;
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_TEXT => in_text = true,
            Event::End(event) if event.local_name().as_ref() == TAG_TEXT => in_text = false,
            Event::Start(event) if event.local_name().as_ref() == TAG_TAB => value.push('\t'),
            Event::Start(event) if event.local_name().as_ref() == TAG_BREAK
                || event.local_name().as_ref() == TAG_CARRIAGE_RETURN => value.push('\n'),
            Event::Start(event) if event.local_name().as_ref() == TAG_NO_BREAK_HYPHEN => value.push('-'),
            Event::Text(event) if in_text => value.push_bytes_text(&event)?,
            Event::CData(event) if in_text => value.push_str(&event.xml_content()?),
            Event::GeneralRef(event) if in_text => value.push_bytes_ref(&event)?,
        });

        Ok(tables)
    }
}

/// Resolves the main document part from the package relationships
/// (`_rels/.rels`). Returns `None` when the package has no usable relationship.
fn load_main_part(zip: &mut ZipArchive<UnifiedReader>) -> Result<Option<String>, MemoExtractorError> {
    let mut reader = match zip.xml_reader("_rels/.rels")? {
        Some(reader) => reader,
        None => return Ok(None),
    };
    let mut main_part = None::<String>;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|kind| kind.ends_with("/officeDocument")).unwrap_or(false) {
                if let Some(target) = target {
                    main_part = Some(target.trim_start_matches('/').to_owned());
                    break;
                }
            }
        }
    });
    Ok(main_part)
}
