//! # Extraction Run
//!
//! One batch of uploaded documents processed in input order. Every document
//! either contributes one record to the run's dataset or one reported
//! failure; a failing document never stops the batch.
use crate::config::ExtractorConfig;
use crate::document::open_document;
use crate::document::read_document;
use crate::document::Document;
use crate::error::MemoExtractorError;
use crate::extraction::Dataset;
use crate::extraction::FieldResolver;
use std::fmt::Display;
use std::fmt::Formatter;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("None of the {0} document(s) could be processed")]
    NoDocumentsProcessed(usize),

    #[error("No file matches '{0}'")]
    NoMatchingFiles(String),
}

/// A document that could not be processed, with the reason
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentFailure {
    pub file: String,
    pub message: String,
}

impl Display for DocumentFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error processing {}: {}", self.file, self.message)
    }
}

/// Outcome of a run with at least one processed document
#[derive(Debug)]
pub struct RunReport {
    pub dataset: Dataset,
    pub failures: Vec<DocumentFailure>,
}

/// Request-scoped state of one batch.
pub struct ExtractionRun {
    resolver: FieldResolver,
    dataset: Dataset,
    failures: Vec<DocumentFailure>,
    attempted: usize,
}

impl ExtractionRun {
    pub fn new(config: &ExtractorConfig) -> Result<Self, MemoExtractorError> {
        config.validate()?;
        let resolver = FieldResolver::new(&config.fields[..], config.matching)?;
        Ok(ExtractionRun {
            resolver,
            dataset: Dataset::new(config.fields.to_owned()),
            failures: Vec::new(),
            attempted: 0,
        })
    }

    /// Expands `pattern` and processes every match in path order. A path that
    /// exists as given is processed directly even if it contains glob syntax.
    /// A pattern matching nothing counts as one failed input.
    /// Returns the number of documents that succeeded.
    pub fn process_pattern(&mut self, pattern: &str) -> usize {
        let path = Path::new(pattern);
        if path.is_file() {
            return self.process_path(path) as usize;
        }

        let paths = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(error) => {
                self.attempted += 1;
                self.fail(pattern, &MemoExtractorError::from(error));
                return 0;
            }
        };
        let mut matched = 0usize;
        let mut succeeded = 0usize;
        for entry in paths {
            matched += 1;
            match entry {
                Ok(path) if path.is_dir() => matched -= 1,
                Ok(path) => succeeded += self.process_path(&path) as usize,
                Err(error) => {
                    self.attempted += 1;
                    let file = error.path().display().to_string();
                    self.fail(&file, &MemoExtractorError::from(error));
                }
            }
        }
        if matched == 0 {
            self.attempted += 1;
            let error = RunError::NoMatchingFiles(pattern.to_owned());
            self.fail(pattern, &MemoExtractorError::from(error));
        }
        succeeded
    }

    /// Parses and extracts a document on disk. Returns whether it succeeded.
    pub fn process_path(&mut self, path: &Path) -> bool {
        self.attempted += 1;
        match open_document(path) {
            Ok(document) => {
                self.extract(&document);
                true
            }
            Err(error) => {
                let file = path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                self.fail(&file, &error);
                false
            }
        }
    }

    /// Parses and extracts an uploaded document held in memory.
    pub fn process_upload(&mut self, name: &str, bytes: Vec<u8>) -> bool {
        self.attempted += 1;
        match read_document(name, bytes) {
            Ok(document) => {
                self.extract(&document);
                true
            }
            Err(error) => {
                self.fail(name, &error);
                false
            }
        }
    }

    /// Resolves every configured field in an already parsed document and
    /// appends the record to the dataset.
    pub fn extract(&mut self, document: &Document) {
        let record = self.resolver.extract(document);
        let found = record.values.iter().filter(|(_, value)| value != crate::extraction::NOT_FOUND).count();
        tracing::info!(
            "Extracted '{}': {} of {} field(s) found in {} table(s)",
            document.name,
            found,
            record.values.len(),
            document.tables.len()
        );
        self.dataset.push(record);
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn failures(&self) -> &[DocumentFailure] {
        &self.failures
    }

    /// Closes the run. Fails when no document was processed successfully,
    /// in which case there is nothing to show or export.
    pub fn finish(self) -> Result<RunReport, MemoExtractorError> {
        if self.dataset.is_empty() {
            Err(RunError::NoDocumentsProcessed(self.attempted))?;
        }
        tracing::info!(
            "Processing finished. Success: {}, Failures: {}",
            self.dataset.len(),
            self.failures.len()
        );
        Ok(RunReport {
            dataset: self.dataset,
            failures: self.failures,
        })
    }

    fn fail(&mut self, file: &str, error: &MemoExtractorError) {
        let failure = DocumentFailure {
            file: file.to_owned(),
            message: error.to_string(),
        };
        tracing::error!("{}", failure);
        self.failures.push(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::docx_bytes;
    use crate::testing::odt_bytes;
    use crate::testing::odt_from_body;

    fn memo(branch: &str) -> Vec<u8> {
        let branch = format!("Branch: {branch}");
        docx_bytes(&[vec![
            vec!["Memo date", ":", "01-Jan-2024"],
            vec![branch.as_str(), "", ""],
        ]])
    }

    #[test]
    fn failing_document_does_not_stop_the_batch() {
        let mut run = ExtractionRun::new(&ExtractorConfig::default()).unwrap();
        assert!(run.process_upload("a.docx", memo("Gulshan")));
        assert!(!run.process_upload("b.docx", b"not a zip archive".to_vec()));
        assert!(run.process_upload("c.odt", odt_bytes(&[vec![vec!["Branch", "Motijheel"]]])));

        let report = run.finish().unwrap();
        assert_eq!(report.dataset.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file, "b.docx");
        assert!(report.failures[0].to_string().starts_with("Error processing b.docx: "));

        let records = report.dataset.records();
        assert_eq!(records[0].source_file, "a.docx");
        assert_eq!(records[0].value("Memo date"), Some("01-Jan-2024"));
        assert_eq!(records[0].value("Branch"), Some("Gulshan"));
        assert_eq!(records[1].source_file, "c.odt");
        assert_eq!(records[1].value("Branch"), Some("Motijheel"));
        assert_eq!(records[1].value("Memo date"), Some("N/A"));
    }

    #[test]
    fn no_successful_document() {
        let mut run = ExtractionRun::new(&ExtractorConfig::default()).unwrap();
        run.process_upload("memo.doc", Vec::new());
        run.process_upload("broken.docx", vec![0u8; 16]);
        assert_eq!(run.failures().len(), 2);
        assert!(matches!(
            run.finish(),
            Err(MemoExtractorError::RunError(RunError::NoDocumentsProcessed(2)))
        ));
    }

    #[test]
    fn unmatched_patterns_count_as_attempted() {
        let dir = tempfile::tempdir().unwrap();
        let mut run = ExtractionRun::new(&ExtractorConfig::default()).unwrap();
        run.process_pattern(&dir.path().join("*.docx").display().to_string());
        run.process_pattern(&dir.path().join("missing.odt").display().to_string());
        run.process_pattern("[");
        assert_eq!(run.failures().len(), 3);
        assert!(matches!(
            run.finish(),
            Err(MemoExtractorError::RunError(RunError::NoDocumentsProcessed(3)))
        ));
    }

    #[test]
    fn oversized_table_fails_only_its_document() {
        let bomb = odt_from_body(concat!(
            r#"<table:table><table:table-row>"#,
            r#"<table:table-cell table:number-columns-repeated="4000000000"><text:p>x</text:p></table:table-cell>"#,
            r#"</table:table-row></table:table>"#,
        ));
        let mut run = ExtractionRun::new(&ExtractorConfig::default()).unwrap();
        assert!(!run.process_upload("bomb.odt", bomb));
        assert!(run.process_upload("good.odt", odt_bytes(&[vec![vec!["Branch", "Uttara"]]])));

        let report = run.finish().unwrap();
        assert_eq!(report.dataset.len(), 1);
        assert_eq!(report.dataset.records()[0].value("Branch"), Some("Uttara"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file, "bomb.odt");
    }

    #[test]
    fn extract_parsed_document() {
        let mut run = ExtractionRun::new(&ExtractorConfig::default()).unwrap();
        run.extract(&Document::new("empty.docx", Vec::new()));
        let rows: Vec<Vec<&str>> = run.dataset().rows().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 22);
        assert_eq!(rows[0][0], "empty.docx");
        assert!(rows[0][1..].iter().all(|value| *value == "N/A"));
    }

    #[test]
    fn glob_patterns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.docx"), memo("Banani")).unwrap();
        std::fs::write(dir.path().join("a.docx"), memo("Gulshan")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut run = ExtractionRun::new(&ExtractorConfig::default()).unwrap();
        let pattern = dir.path().join("*.docx").display().to_string();
        assert_eq!(run.process_pattern(&pattern), 2);
        let missing = dir.path().join("*.odt").display().to_string();
        assert_eq!(run.process_pattern(&missing), 0);
        assert_eq!(run.failures().len(), 1);
        assert_eq!(run.failures()[0].file, missing);

        let report = run.finish().unwrap();
        let files: Vec<&str> = report.dataset.records().iter().map(|r| r.source_file.as_str()).collect();
        assert_eq!(files, vec!["a.docx", "b.docx"]);
    }

    #[test]
    fn literal_path_with_glob_syntax() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("[draft] memo.docx");
        std::fs::write(&path, memo("Uttara")).unwrap();

        let mut run = ExtractionRun::new(&ExtractorConfig::default()).unwrap();
        assert_eq!(run.process_pattern(&path.display().to_string()), 1);
        let report = run.finish().unwrap();
        assert_eq!(report.dataset.records()[0].source_file, "[draft] memo.docx");
        assert_eq!(report.dataset.records()[0].value("Branch"), Some("Uttara"));
    }
}
