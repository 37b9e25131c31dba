/// A rectangular grid of text cells taken from one table of a document.
///
/// Every row holds the same number of cells. Rows that come out of a reader
/// shorter than the widest row are padded with empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    rows: Vec<Vec<String>>,
    col_count: usize,
}

impl Table {
    /// Builds a table from possibly ragged rows, padding them to the widest row.
    pub fn new(mut rows: Vec<Vec<String>>) -> Self {
        let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(col_count, String::new());
        }
        Table { rows, col_count }
    }

    /// Convenience constructor for literal grids.
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self::new(
            rows.into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        )
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.col_count
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.col_count == 0
    }

    /// Returns the text at (row, col), or `None` outside the grid.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[String]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }
}
