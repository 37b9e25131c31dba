//! Label-to-value resolution over the tables of one document.
//!
//! The scan is first-match-wins in table order, then row order, then column
//! order. At a cell containing the label, the value is taken from the same
//! cell after the first `:` when that remainder is longer than one character,
//! otherwise from the first usable cell one or two columns to the right. A
//! label cell that yields nothing is skipped and the scan goes on.
use crate::document::Document;
use crate::document::Table;
use crate::error::MemoExtractorError;
use crate::extraction::record::ExtractionRecord;
use regex::Regex;

/// Value reported for a field whose label is never resolved
pub const NOT_FOUND: &str = "N/A";

/// How far to the right of a label cell a value may sit
const MAX_NEIGHBOR_OFFSET: usize = 2;

/// How a label is recognized inside cell text
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LabelMatching {
    /// Case-insensitive substring test. "RM" also matches inside "FIRM".
    #[default]
    Substring,
    /// Case-insensitive match that must not touch a word character on either side
    WordBoundary,
}

/// A compiled label test
#[derive(Clone, Debug)]
pub struct LabelMatcher {
    label: String,
    folded: String,
    pattern: Option<Regex>,
}

impl LabelMatcher {
    pub fn new(label: &str, matching: LabelMatching) -> Result<Self, MemoExtractorError> {
        let pattern = match matching {
            LabelMatching::Substring => None,
            LabelMatching::WordBoundary => {
                let pattern = format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(label));
                Some(Regex::new(&pattern)?)
            }
        };
        Ok(LabelMatcher {
            label: label.to_owned(),
            folded: label.to_uppercase(),
            pattern,
        })
    }

    /// Substring matcher, which cannot fail to build
    pub fn substring(label: &str) -> Self {
        LabelMatcher {
            label: label.to_owned(),
            folded: label.to_uppercase(),
            pattern: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn matches(&self, text: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.is_match(text),
            None => text.to_uppercase().contains(&self.folded),
        }
    }
}

/// Where a resolved value came from
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueSource {
    /// Text after the first colon of the label cell
    SameCell,
    /// A cell `offset` columns to the right of the label cell
    Neighbor(usize),
}

/// A resolved value and the label cell it was found at
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Resolution<'t> {
    pub table: usize,
    pub row: usize,
    pub col: usize,
    pub source: ValueSource,
    pub value: &'t str,
}

/// Finds the first label cell that yields a value, scanning tables, rows and
/// columns in order.
pub fn locate<'t>(tables: &'t [Table], matcher: &LabelMatcher) -> Option<Resolution<'t>> {
    for (table_index, table) in tables.iter().enumerate() {
        for (row_index, row) in table.rows().enumerate() {
            for (col_index, cell) in row.iter().enumerate() {
                let text = cell.trim();
                if !matcher.matches(text) {
                    continue;
                }
                if let Some((value, source)) = value_at(table, row, col_index, text) {
                    return Some(Resolution {
                        table: table_index,
                        row: row_index,
                        col: col_index,
                        source,
                        value,
                    });
                }
                tracing::trace!(
                    "Label '{}' at table {} ({}, {}) has no value, continuing",
                    matcher.label(),
                    table_index,
                    row_index,
                    col_index
                );
            }
        }
    }
    None
}

fn value_at<'t>(table: &Table, row: &'t [String], col: usize, text: &'t str) -> Option<(&'t str, ValueSource)> {
    if let Some((_, remainder)) = text.split_once(':') {
        let remainder = remainder.trim();
        if remainder.chars().count() > 1 {
            return Some((remainder, ValueSource::SameCell));
        }
    }
    (1..=MAX_NEIGHBOR_OFFSET)
        .filter(|offset| col + offset < table.col_count())
        .filter_map(|offset| row.get(col + offset).map(|cell| (cell.trim(), offset)))
        .find(|(value, _)| !value.is_empty() && *value != ":")
        .map(|(value, offset)| (value, ValueSource::Neighbor(offset)))
}

/// Resolves one label against a document's tables, returning [`NOT_FOUND`]
/// when no occurrence yields a value.
pub fn resolve(tables: &[Table], matcher: &LabelMatcher) -> String {
    match locate(tables, matcher) {
        Some(resolution) => {
            tracing::debug!(
                "Resolved '{}' at table {} ({}, {}) via {:?}",
                matcher.label(),
                resolution.table,
                resolution.row,
                resolution.col,
                resolution.source
            );
            resolution.value.to_owned()
        }
        None => NOT_FOUND.to_owned(),
    }
}

/// Substring resolution of a single label
pub fn get_field_value(tables: &[Table], label: &str) -> String {
    resolve(tables, &LabelMatcher::substring(label))
}

/// Resolves a fixed, ordered list of fields against whole documents
#[derive(Clone, Debug)]
pub struct FieldResolver {
    matchers: Vec<LabelMatcher>,
}

impl FieldResolver {
    pub fn new<S: AsRef<str>>(fields: &[S], matching: LabelMatching) -> Result<Self, MemoExtractorError> {
        let matchers = fields
            .iter()
            .map(|field| LabelMatcher::new(field.as_ref(), matching))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FieldResolver { matchers })
    }

    /// Field labels in column order
    pub fn fields(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.matchers.iter().map(LabelMatcher::label)
    }

    /// Builds the record of one document: one value per field, in field order
    pub fn extract(&self, document: &Document) -> ExtractionRecord {
        let values = self.matchers
            .iter()
            .map(|matcher| (matcher.label().to_owned(), resolve(&document.tables, matcher)))
            .collect();
        ExtractionRecord::new(&document.name, values)
    }
}
