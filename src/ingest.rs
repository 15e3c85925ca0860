//! CSV ingestion: header extraction and data row counting.
//!
//! Cell values are never interpreted. The first row names the columns and
//! every following non-blank line counts as one data row, whatever its
//! width.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSummary {
    pub columns: Vec<String>,
    pub row_count: u64,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("CSV file is empty")]
    Empty,
    #[error("CSV file has a header but no data rows")]
    NoRows,
    #[error("CSV file is invalid: {0}")]
    Malformed(#[from] csv::Error),
}

pub fn summarize_csv(content: &str) -> Result<CsvSummary, IngestError> {
    if content.trim().is_empty() {
        return Err(IngestError::Empty);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
    if columns.is_empty() {
        return Err(IngestError::Empty);
    }

    let mut row_count = 0u64;
    for record in reader.records() {
        record?;
        row_count += 1;
    }
    if row_count == 0 {
        return Err(IngestError::NoRows);
    }

    Ok(CsvSummary { columns, row_count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_two_rows() {
        let summary = summarize_csv("a,b,c\n1,2,3\n4,5,6\n").unwrap();
        assert_eq!(summary.columns, vec!["a", "b", "c"]);
        assert_eq!(summary.row_count, 2);
    }

    #[test]
    fn missing_trailing_newline_and_crlf() {
        let summary = summarize_csv("a,b\r\n1,2\r\n3,4").unwrap();
        assert_eq!(summary.columns, vec!["a", "b"]);
        assert_eq!(summary.row_count, 2);
    }

    #[test]
    fn blank_lines_are_not_rows() {
        let summary = summarize_csv("a,b\n1,2\n\n3,4\n\n\n").unwrap();
        assert_eq!(summary.row_count, 2);
    }

    #[test]
    fn quoted_headers_keep_commas_and_spaces() {
        let summary = summarize_csv("\"first name\",\"city, state\"\nAda,\"London, UK\"\n").unwrap();
        assert_eq!(summary.columns, vec!["first name", "city, state"]);
        assert_eq!(summary.row_count, 1);
    }

    #[test]
    fn ragged_rows_still_count() {
        let summary = summarize_csv("a,b,c\n1\n1,2,3,4\n").unwrap();
        assert_eq!(summary.columns.len(), 3);
        assert_eq!(summary.row_count, 2);
    }

    #[test]
    fn duplicate_headers_are_kept_in_order() {
        let summary = summarize_csv("x,x,y\n1,2,3\n").unwrap();
        assert_eq!(summary.columns, vec!["x", "x", "y"]);
    }

    #[test]
    fn header_only_is_rejected() {
        assert!(matches!(summarize_csv("a,b,c\n"), Err(IngestError::NoRows)));
    }

    #[test]
    fn empty_or_whitespace_is_rejected() {
        assert!(matches!(summarize_csv(""), Err(IngestError::Empty)));
        assert!(matches!(summarize_csv(" \n\n"), Err(IngestError::Empty)));
    }
}
