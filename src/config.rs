use crate::export::validate_sheet_name;
use crate::export::DEFAULT_SHEET_NAME;
use crate::export::EXPORT_FILE_NAME;
use crate::extraction::default_fields;
use crate::extraction::LabelMatching;
use crate::error::MemoExtractorError;
use std::path::PathBuf;

/// Settings of one extraction run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// Field labels to resolve, in export column order.
    pub fields: Vec<String>,

    /// How a label is matched against cell text.
    pub matching: LabelMatching,

    /// Name of the single worksheet of the export.
    pub sheet_name: String,

    /// Where the exported workbook is written.
    pub output: PathBuf,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            fields: default_fields(),
            matching: LabelMatching::default(),
            sheet_name: DEFAULT_SHEET_NAME.to_owned(),
            output: PathBuf::from(EXPORT_FILE_NAME),
        }
    }
}

impl ExtractorConfig {
    /// Rejects settings that would only fail at export time
    pub fn validate(&self) -> Result<(), MemoExtractorError> {
        validate_sheet_name(&self.sheet_name)?;
        if self.fields.is_empty() {
            Err(MemoExtractorError::WithContextError("At least one field is required".to_owned()))?;
        }
        if let Some(position) = self.fields.iter().position(|field| field.trim().is_empty()) {
            Err(MemoExtractorError::WithContextError(format!("Field {} has an empty label", position + 1)))?;
        }
        Ok(())
    }
}
