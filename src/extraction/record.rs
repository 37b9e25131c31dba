use crate::extraction::fields::SOURCE_FILE_COLUMN;

/// The values extracted from one document, in field order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionRecord {
    /// Name of the uploaded file the values came from
    pub source_file: String,
    /// (field label, value) pairs; a value is `N/A` when the label was not resolved
    pub values: Vec<(String, String)>,
}

impl ExtractionRecord {
    pub fn new(source_file: &str, values: Vec<(String, String)>) -> Self {
        ExtractionRecord {
            source_file: source_file.to_owned(),
            values,
        }
    }

    /// Looks up the value of a field by its exact label
    pub fn value(&self, field: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(label, _)| label == field)
            .map(|(_, value)| value.as_str())
    }
}

/// All records of one processing run, ready for export.
///
/// Columns are `Source File` followed by the fields in their configured order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dataset {
    fields: Vec<String>,
    records: Vec<ExtractionRecord>,
}

impl Dataset {
    pub fn new(fields: Vec<String>) -> Self {
        Dataset {
            fields,
            records: Vec::new(),
        }
    }

    /// Appends a record, placing its values in the dataset's field order
    pub fn push(&mut self, record: ExtractionRecord) {
        let in_order = record.values.len() == self.fields.len()
            && record.values.iter().zip(&self.fields).all(|((label, _), field)| label == field);
        let record = if in_order {
            record
        } else {
            let values = self.fields
                .iter()
                .map(|field| {
                    let value = record.value(field).unwrap_or(crate::extraction::NOT_FOUND);
                    (field.to_owned(), value.to_owned())
                })
                .collect();
            ExtractionRecord::new(&record.source_file, values)
        };
        self.records.push(record);
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn records(&self) -> &[ExtractionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Export header: `Source File` then every field
    pub fn header(&self) -> Vec<String> {
        std::iter::once(SOURCE_FILE_COLUMN.to_owned())
            .chain(self.fields.iter().cloned())
            .collect()
    }

    /// Rows in header order, one per record
    pub fn rows(&self) -> impl Iterator<Item = Vec<&str>> + '_ {
        self.records.iter().map(|record| {
            std::iter::once(record.source_file.as_str())
                .chain(record.values.iter().map(|(_, value)| value.as_str()))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(values: &[(&str, &str)]) -> Vec<(String, String)> {
        values.iter().map(|(label, value)| (label.to_string(), value.to_string())).collect()
    }

    #[test]
    fn header_and_rows_follow_field_order() {
        let mut dataset = Dataset::new(vec!["Branch".to_string(), "RM".to_string()]);
        dataset.push(ExtractionRecord::new("a.docx", pairs(&[("Branch", "Gulshan"), ("RM", "John")])));
        dataset.push(ExtractionRecord::new("b.docx", pairs(&[("RM", "Jane")])));

        assert_eq!(dataset.header(), vec!["Source File", "Branch", "RM"]);
        let rows: Vec<Vec<&str>> = dataset.rows().collect();
        assert_eq!(rows, vec![
            vec!["a.docx", "Gulshan", "John"],
            vec!["b.docx", "N/A", "Jane"],
        ]);
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn value_lookup() {
        let record = ExtractionRecord::new("a.docx", pairs(&[("Branch", "Gulshan")]));
        assert_eq!(record.value("Branch"), Some("Gulshan"));
        assert_eq!(record.value("branch"), None);
    }
}
