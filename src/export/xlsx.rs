use crate::error::MemoExtractorError;
use crate::error::ResultMessage;
use crate::export::reference::index_to_reference;
use crate::export::reference::reference_to_index;
use crate::export::validate_sheet_name;
use crate::export::ExportError;
use crate::export::EXPORT_MIME_TYPE;
use crate::extraction::Dataset;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::xml::XmlWriter;
use crate::helpers::zip::ZipHelper;
use crate::helpers::zip::ZipWriterHelper;
use crate::match_xml_events;
use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use zip::ZipArchive;
use zip::ZipWriter;

// XML tag names of the SpreadsheetML parts read back
const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_SHEET: QName = QName(b"sheet");                 // Worksheet definition
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");       // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");           // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                      // Text content within strings
const TAG_ROW: QName = QName(b"row");                     // Row in worksheet
const TAG_CELL: QName = QName(b"c");                      // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is");            // Inline string value
const TAG_VALUE: QName = QName(b"v");                     // Cell value content

const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const NS_PACKAGE_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_SPREADSHEET: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_CORE_PROPERTIES: &str = "http://schemas.openxmlformats.org/package/2006/metadata/core-properties";
const NS_EXTENDED_PROPERTIES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties";

const REL_OFFICE_DOCUMENT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_CORE_PROPERTIES: &str = "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
const REL_EXTENDED_PROPERTIES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
const REL_WORKSHEET: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

const APPLICATION: &str = "memo_extractor";

/// Index of the bold cell format in `xl/styles.xml`
const HEADER_STYLE: &str = "1";

// Bounds on the grid a worksheet is read into
const MAX_READ_ROWS: usize = 1_048_576;
const MAX_READ_COLUMNS: usize = 16_384;
const MAX_READ_CELLS: usize = 1 << 22;

/// A worksheet read back from a workbook: its name, the first row and the rest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Workbook {
    pub sheet_name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Serializes the dataset into a complete single-sheet `.xlsx` package.
///
/// Row 1 holds the header, bold and frozen; every cell is an inline string.
pub fn write_workbook(dataset: &Dataset, sheet_name: &str) -> Result<Vec<u8>, MemoExtractorError> {
    validate_sheet_name(sheet_name)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::<u8>::new()));
    zip.xml_part("[Content_Types].xml", write_content_types)?;
    zip.xml_part("_rels/.rels", write_package_relationships)?;
    zip.xml_part("docProps/core.xml", write_core_properties)?;
    zip.xml_part("docProps/app.xml", write_app_properties)?;
    zip.xml_part("xl/workbook.xml", |writer| write_workbook_part(writer, sheet_name))?;
    zip.xml_part("xl/_rels/workbook.xml.rels", write_workbook_relationships)?;
    zip.xml_part("xl/styles.xml", write_styles)?;
    zip.xml_part("xl/worksheets/sheet1.xml", |writer| write_worksheet(writer, dataset))?;
    let bytes = zip.finish()?.into_inner();
    tracing::debug!("Serialized {} row(s) into a {} byte workbook", dataset.len(), bytes.len());
    Ok(bytes)
}

/// Writes the workbook to `path`.
///
/// The package is written to a temporary file next to `path` and renamed
/// over it once complete, so a failed save leaves any previous file intact.
pub fn save_workbook(dataset: &Dataset, sheet_name: &str, path: &Path) -> Result<(), MemoExtractorError> {
    let bytes = write_workbook(dataset, sheet_name)?;
    let prefix = format!("Cannot write '{}'", path.display());
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(directory)
        .map_err(MemoExtractorError::from)
        .with_prefix(&prefix)?;
    file.write_all(&bytes)
        .and_then(|_| file.as_file().sync_all())
        .map_err(MemoExtractorError::from)
        .with_prefix(&prefix)?;
    file.persist(path)
        .map_err(|error| MemoExtractorError::from(error.error))
        .with_prefix(&prefix)?;
    tracing::info!("Exported {} row(s) to '{}' ({})", dataset.len(), path.display(), EXPORT_MIME_TYPE);
    Ok(())
}

/// Reads the first worksheet of the workbook at `path`.
pub fn read_workbook(path: &Path) -> Result<Workbook, MemoExtractorError> {
    let name = path.to_string_lossy().to_string();
    read_from(&name, UnifiedReader::open(path)?)
}

/// Reads the first worksheet of a workbook held in memory.
pub fn read_workbook_bytes(name: &str, bytes: Vec<u8>) -> Result<Workbook, MemoExtractorError> {
    read_from(name, UnifiedReader::from_bytes(bytes))
}

fn read_from(name: &str, reader: UnifiedReader) -> Result<Workbook, MemoExtractorError> {
    let mut zip = ZipArchive::new(reader)?;
    let (sheet_name, sheet_path) = load_first_sheet(&mut zip, name)?;
    let shared_strings = load_shared_strings(&mut zip)?;
    let mut reader = zip.xml_reader(&sheet_path)?
        .ok_or_else(|| ExportError::MissingPart(name.to_owned(), sheet_path.to_owned()))?;

    let mut cells = HashMap::<(usize, usize), String>::new();
    let mut row_count = 0usize;
    let mut col_count = 0usize;
    let mut row = 0usize;
    let mut col = 0usize;
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut kind = String::new();
    let mut value = String::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_ROW => {
            next_row = match event.parse_attribute_value::<usize>("r")? {
                Some(number) if number > 0 => number - 1,
                _ => next_row,
            };
            next_col = 0;
        }
        Event::End(event) if event.name() == TAG_ROW => next_row += 1,
        Event::Start(event) if event.name() == TAG_CELL => {
            (row, col) = match event.get_attribute_value("r")? {
                Some(reference) => reference_to_index(&reference)
                    .ok_or_else(|| ExportError::InvalidCellReference(reference.to_string()))?,
                None => (next_row, next_col),
            };
            next_col = col + 1;
            kind = event.get_attribute_value("t")?.map(|t| t.to_string()).unwrap_or_default();
            value.clear();
        }
        Event::Start(event) if event.name() == TAG_INLINE_STRING => {
            value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
        }
        Event::Start(event) if event.name() == TAG_VALUE => {
            value = read_string_value(&mut reader, TAG_VALUE, true)?;
        }
        Event::End(event) if event.name() == TAG_CELL => {
            let text = if kind == "s" {
                let index = value.trim().parse::<usize>()?;
                shared_strings.get(index).cloned().unwrap_or_default()
            } else {
                std::mem::take(&mut value)
            };
            if !text.is_empty() {
                row_count = row_count.max(row + 1);
                col_count = col_count.max(col + 1);
                cells.insert((row, col), text);
            }
        }
    });

    if row_count > MAX_READ_ROWS
        || col_count > MAX_READ_COLUMNS
        || row_count.saturating_mul(col_count) > MAX_READ_CELLS
    {
        Err(ExportError::WorksheetTooLarge(name.to_owned(), row_count, col_count))?;
    }
    let mut rows: Vec<Vec<String>> = (0..row_count)
        .map(|row| {
            (0..col_count)
                .map(|col| cells.remove(&(row, col)).unwrap_or_default())
                .collect()
        })
        .collect();
    let header = if rows.is_empty() { Vec::new() } else { rows.remove(0) };
    Ok(Workbook {
        sheet_name,
        header,
        rows,
    })
}

/// Finds the first `<sheet>` of `xl/workbook.xml` and resolves its part path
fn load_first_sheet(zip: &mut ZipArchive<UnifiedReader>, name: &str) -> Result<(String, String), MemoExtractorError> {
    let relationships = load_relationships(zip)?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| ExportError::MissingPart(name.to_owned(), "xl/workbook.xml".to_owned()))?;
    let mut sheet = None::<(String, String)>;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut sheet_name = None::<String>;
            let mut id = None::<String>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    sheet_name = Some(attribute.get_value()?.to_string());
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?.to_string());
                }
            }
            if let Some(path) = id.and_then(|id| relationships.get(&id)) {
                sheet = Some((sheet_name.unwrap_or_default(), path.to_owned()));
                break;
            }
        }
    });
    sheet.ok_or_else(|| ExportError::MissingWorksheet(name.to_owned()).into())
}

/// Maps relationship ids of `xl/_rels/workbook.xml.rels` to worksheet part paths
fn load_relationships(zip: &mut ZipArchive<UnifiedReader>) -> Result<HashMap<String, String>, MemoExtractorError> {
    let mut relationships = HashMap::<String, String>::new();
    let mut reader = match zip.xml_reader("xl/_rels/workbook.xml.rels")? {
        Some(reader) => reader,
        None => return Ok(relationships),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|kind| kind.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Normalizes a relationship target to a path inside the package
fn to_zip_path(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_owned()
    } else if target.starts_with("xl/") {
        target.to_owned()
    } else {
        format!("xl/{target}")
    }
}

fn load_shared_strings(zip: &mut ZipArchive<UnifiedReader>) -> Result<Vec<String>, MemoExtractorError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Collects the text up to `end_tag`, skipping phonetic runs. With
/// `is_text_content` every text event counts, otherwise only `<t>` content.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, MemoExtractorError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

fn write_content_types(writer: &mut XmlWriter<Vec<u8>>) -> Result<(), MemoExtractorError> {
    const OVERRIDES: [(&str, &str); 5] = [
        ("/xl/workbook.xml", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"),
        ("/xl/worksheets/sheet1.xml", "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"),
        ("/xl/styles.xml", "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"),
        ("/docProps/core.xml", "application/vnd.openxmlformats-package.core-properties+xml"),
        ("/docProps/app.xml", "application/vnd.openxmlformats-officedocument.extended-properties+xml"),
    ];
    writer.start("Types", &[("xmlns", NS_CONTENT_TYPES)])?;
    writer.empty("Default", &[
        ("Extension", "rels"),
        ("ContentType", "application/vnd.openxmlformats-package.relationships+xml"),
    ])?;
    writer.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;
    for (part_name, content_type) in OVERRIDES {
        writer.empty("Override", &[("PartName", part_name), ("ContentType", content_type)])?;
    }
    writer.end("Types")
}

fn write_relationships(writer: &mut XmlWriter<Vec<u8>>, relationships: &[(&str, &str, &str)]) -> Result<(), MemoExtractorError> {
    writer.start("Relationships", &[("xmlns", NS_PACKAGE_RELATIONSHIPS)])?;
    for &(id, kind, target) in relationships {
        writer.empty("Relationship", &[("Id", id), ("Type", kind), ("Target", target)])?;
    }
    writer.end("Relationships")
}

fn write_package_relationships(writer: &mut XmlWriter<Vec<u8>>) -> Result<(), MemoExtractorError> {
    write_relationships(writer, &[
        ("rId1", REL_OFFICE_DOCUMENT, "xl/workbook.xml"),
        ("rId2", REL_CORE_PROPERTIES, "docProps/core.xml"),
        ("rId3", REL_EXTENDED_PROPERTIES, "docProps/app.xml"),
    ])
}

fn write_workbook_relationships(writer: &mut XmlWriter<Vec<u8>>) -> Result<(), MemoExtractorError> {
    write_relationships(writer, &[
        ("rId1", REL_WORKSHEET, "worksheets/sheet1.xml"),
        ("rId2", REL_STYLES, "styles.xml"),
    ])
}

fn write_core_properties(writer: &mut XmlWriter<Vec<u8>>) -> Result<(), MemoExtractorError> {
    let now = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    writer.start("cp:coreProperties", &[
        ("xmlns:cp", NS_CORE_PROPERTIES),
        ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
        ("xmlns:dcterms", "http://purl.org/dc/terms/"),
        ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
    ])?;
    writer.text_element("dc:creator", &[], APPLICATION)?;
    writer.text_element("dcterms:created", &[("xsi:type", "dcterms:W3CDTF")], &now)?;
    writer.text_element("dcterms:modified", &[("xsi:type", "dcterms:W3CDTF")], &now)?;
    writer.end("cp:coreProperties")
}

fn write_app_properties(writer: &mut XmlWriter<Vec<u8>>) -> Result<(), MemoExtractorError> {
    writer.start("Properties", &[("xmlns", NS_EXTENDED_PROPERTIES)])?;
    writer.text_element("Application", &[], APPLICATION)?;
    writer.end("Properties")
}

fn write_workbook_part(writer: &mut XmlWriter<Vec<u8>>, sheet_name: &str) -> Result<(), MemoExtractorError> {
    writer.start("workbook", &[("xmlns", NS_SPREADSHEET), ("xmlns:r", NS_RELATIONSHIPS)])?;
    writer.start("sheets", &[])?;
    writer.empty("sheet", &[("name", sheet_name), ("sheetId", "1"), ("r:id", "rId1")])?;
    writer.end("sheets")?;
    writer.end("workbook")
}

/// Two fonts (regular, bold) and two cell formats; format 1 is the header style
fn write_styles(writer: &mut XmlWriter<Vec<u8>>) -> Result<(), MemoExtractorError> {
    writer.start("styleSheet", &[("xmlns", NS_SPREADSHEET)])?;

    writer.start("fonts", &[("count", "2")])?;
    for bold in [false, true] {
        writer.start("font", &[])?;
        if bold {
            writer.empty("b", &[])?;
        }
        writer.empty("sz", &[("val", "11")])?;
        writer.empty("name", &[("val", "Calibri")])?;
        writer.end("font")?;
    }
    writer.end("fonts")?;

    writer.start("fills", &[("count", "2")])?;
    for pattern in ["none", "gray125"] {
        writer.start("fill", &[])?;
        writer.empty("patternFill", &[("patternType", pattern)])?;
        writer.end("fill")?;
    }
    writer.end("fills")?;

    writer.start("borders", &[("count", "1")])?;
    writer.empty("border", &[])?;
    writer.end("borders")?;

    writer.start("cellStyleXfs", &[("count", "1")])?;
    writer.empty("xf", &[("numFmtId", "0"), ("fontId", "0"), ("fillId", "0"), ("borderId", "0")])?;
    writer.end("cellStyleXfs")?;

    writer.start("cellXfs", &[("count", "2")])?;
    writer.empty("xf", &[("numFmtId", "0"), ("fontId", "0"), ("fillId", "0"), ("borderId", "0"), ("xfId", "0")])?;
    writer.empty("xf", &[
        ("numFmtId", "0"),
        ("fontId", "1"),
        ("fillId", "0"),
        ("borderId", "0"),
        ("xfId", "0"),
        ("applyFont", "1"),
    ])?;
    writer.end("cellXfs")?;

    writer.start("cellStyles", &[("count", "1")])?;
    writer.empty("cellStyle", &[("name", "Normal"), ("xfId", "0"), ("builtinId", "0")])?;
    writer.end("cellStyles")?;

    writer.end("styleSheet")
}

fn write_worksheet(writer: &mut XmlWriter<Vec<u8>>, dataset: &Dataset) -> Result<(), MemoExtractorError> {
    let header = dataset.header();
    let last_cell = index_to_reference(dataset.len(), header.len() - 1);

    writer.start("worksheet", &[("xmlns", NS_SPREADSHEET), ("xmlns:r", NS_RELATIONSHIPS)])?;
    let dimension = format!("A1:{last_cell}");
    writer.empty("dimension", &[("ref", dimension.as_str())])?;
    writer.start("sheetViews", &[])?;
    writer.start("sheetView", &[("workbookViewId", "0")])?;
    writer.empty("pane", &[("ySplit", "1"), ("topLeftCell", "A2"), ("activePane", "bottomLeft"), ("state", "frozen")])?;
    writer.end("sheetView")?;
    writer.end("sheetViews")?;
    writer.start("sheetData", &[])?;

    let header: Vec<&str> = header.iter().map(String::as_str).collect();
    write_row(writer, 0, &header, Some(HEADER_STYLE))?;
    for (index, row) in dataset.rows().enumerate() {
        write_row(writer, index + 1, &row, None)?;
    }

    writer.end("sheetData")?;
    writer.end("worksheet")
}

fn write_row(writer: &mut XmlWriter<Vec<u8>>, row: usize, cells: &[&str], style: Option<&str>) -> Result<(), MemoExtractorError> {
    let number = (row + 1).to_string();
    writer.start("row", &[("r", number.as_str())])?;
    for (col, text) in cells.iter().enumerate() {
        let reference = index_to_reference(row, col);
        let mut attributes = vec![("r", reference.as_str()), ("t", "inlineStr")];
        if let Some(style) = style {
            attributes.push(("s", style));
        }
        writer.start("c", &attributes)?;
        writer.start("is", &[])?;
        writer.text_element("t", &[("xml:space", "preserve")], text)?;
        writer.end("is")?;
        writer.end("c")?;
    }
    writer.end("row")
}
