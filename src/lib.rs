//! # Memo Extractor
//!
//! Batch extraction of labeled fields from the tables of credit memo
//! documents into one consolidated spreadsheet.
//!
//! ## Features
//!
//! - **Document formats**: WordprocessingML (`.docx`, `.docm`) and OpenDocument
//!   Text (`.odt`); legacy `.doc` and password protected packages are reported
//! - **Label resolution**: every configured field is looked up across all
//!   tables, in table, row and column order; the value is taken from the
//!   `Label: Value` cell itself or from one of the next two cells to the right
//! - **Sentinel**: fields that are never resolved read `N/A`
//! - **Batch isolation**: a document that cannot be parsed is reported and
//!   skipped, the rest of the batch continues
//! - **Export**: a single-sheet `.xlsx` workbook with one row per document,
//!   `Source File` first, then the fields in their configured order
//!
//! ## Example
//!
//! ```no_run
//! use memo_extractor::{save_workbook, ExtractionRun, ExtractorConfig};
//!
//! let config = ExtractorConfig::default();
//! let mut run = ExtractionRun::new(&config)?;
//! run.process_pattern("memos/*.docx");
//! let report = run.finish()?;
//! save_workbook(&report.dataset, &config.sheet_name, &config.output)?;
//! # Ok::<(), memo_extractor::MemoExtractorError>(())
//! ```
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod extraction;
pub mod helpers;
pub mod run;

#[cfg(test)]
mod testing;

pub use config::ExtractorConfig;
pub use document::{open_document, read_document, Document, Table};
pub use error::MemoExtractorError;
pub use export::{read_workbook, render_preview, save_workbook, write_workbook, Workbook};
pub use extraction::{get_field_value, Dataset, ExtractionRecord, FieldResolver, LabelMatching, FIELDS, NOT_FOUND};
pub use run::{DocumentFailure, ExtractionRun, RunReport};
