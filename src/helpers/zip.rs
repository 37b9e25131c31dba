//! ZIP archive helpers for the OOXML (.docx, .xlsx) and OpenDocument (.odt) containers.
//! Provides lookup of parts inside an archive and writing of XML parts into a new one.

use crate::error::MemoExtractorError;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlWriter;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

/// Helper trait for reading parts out of a ZIP archive
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Gets a file from the ZIP archive by name (case-insensitive, path separator agnostic)
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, MemoExtractorError>;

    /// Creates an XML reader for a file within the ZIP archive
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, MemoExtractorError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, MemoExtractorError> {
        let pattern = name.replace('\\', "/");
        let path = self.file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(file_name.trim_start_matches('/')))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(Some(file)) => Ok(Some(file)),
            Ok(None) | Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, MemoExtractorError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }
}

/// Helper trait for writing XML parts into a ZIP archive
pub(crate) trait ZipWriterHelper {
    /// Starts a deflated entry and lets `body` fill it through an [`XmlWriter`]
    fn xml_part<F>(&mut self, name: &str, body: F) -> Result<(), MemoExtractorError>
    where
        F: FnOnce(&mut XmlWriter<Vec<u8>>) -> Result<(), MemoExtractorError>;
}

impl<W: Write + Seek> ZipWriterHelper for ZipWriter<W> {
    fn xml_part<F>(&mut self, name: &str, body: F) -> Result<(), MemoExtractorError>
    where
        F: FnOnce(&mut XmlWriter<Vec<u8>>) -> Result<(), MemoExtractorError>,
    {
        let mut writer = XmlWriter::new(Vec::with_capacity(4096))?;
        body(&mut writer)?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.start_file(name, options)?;
        self.write_all(&writer.into_inner())?;
        Ok(())
    }
}
