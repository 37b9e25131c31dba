//! Plain-text table rendering for the terminal preview.

const ELLIPSIS: char = '…';
const SEPARATOR: &str = " | ";

/// Renders `header` and `rows` as an aligned text table.
///
/// Every cell is cut to at most `max_width` characters, the last one replaced
/// by `…` when cut. A rule of dashes separates the header from the rows.
pub fn render_preview<H, R, C>(header: &[H], rows: &[R], max_width: usize) -> String
where
    H: AsRef<str>,
    R: AsRef<[C]>,
    C: AsRef<str>,
{
    let max_width = max_width.max(1);
    let header: Vec<String> = header.iter().map(|cell| truncate(cell.as_ref(), max_width)).collect();
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.as_ref().iter().map(|cell| truncate(cell.as_ref(), max_width)).collect())
        .collect();

    let col_count = rows.iter().map(Vec::len).chain(std::iter::once(header.len())).max().unwrap_or(0);
    let mut widths = vec![0usize; col_count];
    for line in std::iter::once(&header).chain(rows.iter()) {
        for (col, cell) in line.iter().enumerate() {
            widths[col] = widths[col].max(cell.chars().count());
        }
    }

    let mut output = String::new();
    push_line(&mut output, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    push_line(&mut output, &rule, &widths);
    for row in &rows {
        push_line(&mut output, row, &widths);
    }
    output
}

fn truncate(text: &str, max_width: usize) -> String {
    // Multi-paragraph cells are shown on one line
    let text = text.replace(['\n', '\t'], " ");
    if text.chars().count() <= max_width {
        text
    } else {
        let mut cut: String = text.chars().take(max_width - 1).collect();
        cut.push(ELLIPSIS);
        cut
    }
}

fn push_line(output: &mut String, cells: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (col, width) in widths.iter().take(cells.len()).enumerate() {
        if col > 0 {
            line.push_str(SEPARATOR);
        }
        let cell = cells.get(col).map(String::as_str).unwrap_or("");
        line.push_str(cell);
        line.extend(std::iter::repeat(' ').take(width - cell.chars().count()));
    }
    output.push_str(line.trim_end());
    output.push('\n');
}
