//! # Workbook Export Module
//!
//! Serializes a [`Dataset`](crate::extraction::Dataset) into a single-sheet
//! SpreadsheetML workbook, reads such a workbook back, and renders plain-text
//! previews of tabular data.
use thiserror::Error;

pub mod preview;
pub mod reference;
pub mod xlsx;

pub use preview::render_preview;
pub use xlsx::read_workbook;
pub use xlsx::read_workbook_bytes;
pub use xlsx::save_workbook;
pub use xlsx::write_workbook;
pub use xlsx::Workbook;

/// File name the consolidated workbook is offered under
pub const EXPORT_FILE_NAME: &str = "NGO_Master_Database.xlsx";

/// Name of the only worksheet of the export
pub const DEFAULT_SHEET_NAME: &str = "Extracted_Data";

/// MIME type of the exported workbook
pub const EXPORT_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const MAX_SHEET_NAME_LENGTH: usize = 31;
const INVALID_SHEET_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Errors raised while writing or reading a workbook
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Invalid worksheet name '{0}': expected 1 to 31 characters without []:*?/\\")]
    InvalidSheetName(String),

    #[error("Workbook '{0}' has no worksheet")]
    MissingWorksheet(String),

    #[error("Workbook '{0}' has no '{1}' part")]
    MissingPart(String, String),

    #[error("Invalid cell reference '{0}'")]
    InvalidCellReference(String),

    #[error("Worksheet of '{0}' spans {1} rows by {2} columns, more than can be loaded")]
    WorksheetTooLarge(String, usize, usize),
}

/// Checks a worksheet name against the SpreadsheetML naming rules.
pub fn validate_sheet_name(name: &str) -> Result<(), ExportError> {
    let length = name.chars().count();
    if length == 0
        || length > MAX_SHEET_NAME_LENGTH
        || name.contains(INVALID_SHEET_NAME_CHARS)
        || name.starts_with('\'')
        || name.ends_with('\'')
    {
        Err(ExportError::InvalidSheetName(name.to_owned()))
    } else {
        Ok(())
    }
}
