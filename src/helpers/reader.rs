use crate::error::MemoExtractorError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

/// Signature of a Compound File Binary (OLE2) container, used by legacy `.doc`
/// files and by password-protected OOXML packages.
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// A unified reader over either a local file or an uploaded in-memory buffer
pub(crate) enum UnifiedReader {
    /// Local file reader
    Local(BufReader<File>),
    /// Uploaded content (in-memory buffer)
    Memory(Cursor<Vec<u8>>),
}

impl UnifiedReader {
    /// Opens a local file
    pub(crate) fn open(path: &Path) -> Result<UnifiedReader, MemoExtractorError> {
        let file = File::open(path)?;
        Ok(UnifiedReader::Local(BufReader::new(file)))
    }

    /// Wraps uploaded bytes
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> UnifiedReader {
        UnifiedReader::Memory(Cursor::new(bytes))
    }

    /// Checks whether the content starts with the CFB signature.
    /// The read position is restored to the start afterwards.
    pub(crate) fn is_compound_file(&mut self) -> Result<bool, MemoExtractorError> {
        let mut header = [0u8; 8];
        let mut filled = 0usize;
        while filled < header.len() {
            let count = self.read(&mut header[filled..])?;
            if count == 0 {
                break;
            }
            filled += count;
        }
        self.seek(SeekFrom::Start(0))?;
        Ok(filled == header.len() && header == CFB_SIGNATURE)
    }
}

impl Read for UnifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            UnifiedReader::Local(reader) => reader.read(buf),
            UnifiedReader::Memory(reader) => reader.read(buf),
        }
    }
}

impl Seek for UnifiedReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            UnifiedReader::Local(reader) => reader.seek(pos),
            UnifiedReader::Memory(reader) => reader.seek(pos),
        }
    }
}
