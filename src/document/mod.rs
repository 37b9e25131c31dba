//! # Document Reading Module
//!
//! Turns uploaded word-processing documents into [`Document`] values: the file
//! name plus every top-level table as a rectangular grid of text. Two container
//! formats are supported, WordprocessingML (`.docx`, `.docm`) and OpenDocument
//! Text (`.odt`). Cell content is normalized to trimmed `String`s here so the
//! extraction core only ever sees text.
use crate::error::MemoExtractorError;
use crate::helpers::reader::UnifiedReader;
use std::ffi::OsStr;
use std::path::Path;
use thiserror::Error;

pub(crate) mod docx;
pub(crate) mod odt;
pub mod table;

pub use table::Table;

/// Errors raised while opening or parsing a document
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Cannot detect document format for '{0}'")]
    InvalidFileFormat(String),

    #[error("'{0}' is a legacy .doc file or a password protected package")]
    LegacyOrProtected(String),

    #[error("Document '{0}' has no '{1}' part")]
    MissingPart(String, String),

    #[error("Invalid OpenDocument text MIME type in '{0}'")]
    MimeTypeError(String),

    #[error("A table in '{0}' repeats rows or cells beyond the supported size")]
    TableTooLarge(String),
}

/// Supported document container formats
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Office Open XML word-processing document
    Docx,
    /// OpenDocument text document
    Odt,
}

impl DocumentFormat {
    /// Detects the format from the file extension (case-insensitive).
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(OsStr::to_str)?
            .to_ascii_lowercase();
        match extension.as_str() {
            "docx" | "docm" => Some(Self::Docx),
            "odt" => Some(Self::Odt),
            _ => None,
        }
    }
}

/// An uploaded document reduced to its name and its tables, in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub tables: Vec<Table>,
}

impl Document {
    pub fn new(name: impl Into<String>, tables: Vec<Table>) -> Self {
        Document {
            name: name.into(),
            tables,
        }
    }
}

/// Common interface of the container readers
pub(crate) trait TableSource {
    /// Name of the document, as shown in the export
    fn name(&self) -> String;

    /// Reads all top-level tables in document order
    fn read_tables(&mut self) -> Result<Vec<Table>, MemoExtractorError>;
}

/// Opens a document from a local path. The document name is the file name
/// without its directory.
pub fn open_document(path: &Path) -> Result<Document, MemoExtractorError> {
    let name = path
        .file_name()
        .and_then(OsStr::to_str)
        .map(str::to_owned)
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    let format = DocumentFormat::from_file_name(&name)
        .ok_or_else(|| DocumentError::InvalidFileFormat(name.to_owned()))?;
    let reader = UnifiedReader::open(path)?;
    read_with(name, format, reader)
}

/// Parses an uploaded document held in memory.
pub fn read_document(name: &str, bytes: Vec<u8>) -> Result<Document, MemoExtractorError> {
    let format = DocumentFormat::from_file_name(name)
        .ok_or_else(|| DocumentError::InvalidFileFormat(name.to_owned()))?;
    read_with(name.to_owned(), format, UnifiedReader::from_bytes(bytes))
}

fn read_with(name: String, format: DocumentFormat, mut reader: UnifiedReader) -> Result<Document, MemoExtractorError> {
    if reader.is_compound_file()? {
        Err(DocumentError::LegacyOrProtected(name.to_owned()))?;
    }
    let mut source: Box<dyn TableSource> = match format {
        DocumentFormat::Docx => Box::new(docx::DocxDocument::new(&name, reader)?),
        DocumentFormat::Odt => Box::new(odt::OdtDocument::new(&name, reader)?),
    };
    let tables = source.read_tables()?;
    tracing::debug!("Read {} table(s) from '{}'", tables.len(), source.name());
    Ok(Document::new(name, tables))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::docx_bytes;
    use crate::testing::odt_bytes;

    #[test]
    fn format_detection() {
        assert_eq!(DocumentFormat::from_file_name("memo.docx"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_file_name("MEMO.DOCX"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_file_name("memo.docm"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_file_name("memo.odt"), Some(DocumentFormat::Odt));
        assert_eq!(DocumentFormat::from_file_name("memo.doc"), None);
        assert_eq!(DocumentFormat::from_file_name("memo"), None);
    }

    #[test]
    fn read_docx_upload() {
        let bytes = docx_bytes(&[vec![vec!["Branch: Dhaka Main", "x"]]]);
        let document = read_document("a.docx", bytes).unwrap();
        assert_eq!(document.name, "a.docx");
        assert_eq!(document.tables.len(), 1);
        assert_eq!(document.tables[0].cell(0, 0), Some("Branch: Dhaka Main"));
    }

    #[test]
    fn read_odt_upload() {
        let bytes = odt_bytes(&[vec![vec!["RM", "", "John Doe"]]]);
        let document = read_document("b.odt", bytes).unwrap();
        assert_eq!(document.tables.len(), 1);
        assert_eq!(document.tables[0].cell(0, 2), Some("John Doe"));
    }

    #[test]
    fn unsupported_extension() {
        let error = read_document("notes.txt", b"hello".to_vec()).unwrap_err();
        assert!(matches!(error, MemoExtractorError::DocumentError(DocumentError::InvalidFileFormat(_))));
    }

    #[test]
    fn corrupt_archive() {
        let error = read_document("broken.docx", b"not a zip archive".to_vec()).unwrap_err();
        assert!(matches!(error, MemoExtractorError::ZipError(_)));
    }

    #[test]
    fn legacy_doc_renamed() {
        let mut bytes = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
        bytes.resize(512, 0);
        let error = read_document("old.docx", bytes).unwrap_err();
        assert!(matches!(error, MemoExtractorError::DocumentError(DocumentError::LegacyOrProtected(_))));
    }

    #[test]
    fn open_from_disk() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("memo.docx");
        std::fs::write(&path, docx_bytes(&[vec![vec!["RM", "Jane"]]])).unwrap();
        let document = open_document(&path).unwrap();
        assert_eq!(document.name, "memo.docx");
        assert_eq!(document.tables[0].cell(0, 1), Some("Jane"));
    }
}
