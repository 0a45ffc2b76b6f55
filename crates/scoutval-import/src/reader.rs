// Header-driven CSV decoding into string-keyed rows.

use std::collections::HashMap;

use thiserror::Error;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("CSV file is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("malformed CSV{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Malformed { line: Option<u64>, message: String },
}

impl From<csv::Error> for ParseError {
    fn from(e: csv::Error) -> Self {
        ParseError::Malformed {
            line: e.position().map(|p| p.line()),
            message: e.to_string(),
        }
    }
}

/// One data row keyed by header name. Values are already trimmed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    /// 1-based line number in the source file.
    pub line: u64,
    fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new(line: u64, fields: HashMap<String, String>) -> Self {
        Self { line, fields }
    }

    /// The non-empty value of column `name`, or `None` if the column is
    /// missing or blank.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Decode `bytes` as UTF-8 CSV text with a required header row.
///
/// A leading byte-order mark is ignored. Blank lines are skipped. A row whose
/// field count differs from the header fails the whole file.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<RawRow>, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = std::str::from_utf8(bytes)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let fields = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        rows.push(RawRow::new(line, fields));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_driven_rows() {
        let csv_data = "\
name,age,position,club,nationality,market_value
Jane Doe,22,Midfielder,Club X,Countryland,5000000
John Roe,30,Defender,Club Y,Elsewhere,1000000";

        let rows = parse_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value("name"), Some("Jane Doe"));
        assert_eq!(rows[0].value("market_value"), Some("5000000"));
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].value("club"), Some("Club Y"));
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn column_order_does_not_matter() {
        let csv_data = "market_value,name\n42,Jane Doe";
        let rows = parse_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(rows[0].value("name"), Some("Jane Doe"));
        assert_eq!(rows[0].value("market_value"), Some("42"));
    }

    #[test]
    fn quoted_fields_and_whitespace_trimmed() {
        let csv_data = "name , club\n\"Doe, Jane\",  Club X  ";
        let rows = parse_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(rows[0].value("name"), Some("Doe, Jane"));
        assert_eq!(rows[0].value("club"), Some("Club X"));
    }

    #[test]
    fn blank_values_and_missing_columns_are_absent() {
        let csv_data = "name,club_logo\nJane Doe,";
        let rows = parse_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(rows[0].value("club_logo"), None);
        assert_eq!(rows[0].value("image_url"), None);
    }

    #[test]
    fn bom_is_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"name\nJane Doe\n");
        let rows = parse_csv(&bytes).unwrap();
        assert_eq!(rows[0].value("name"), Some("Jane Doe"));
    }

    #[test]
    fn empty_and_header_only_files_have_no_rows() {
        assert!(parse_csv(b"").unwrap().is_empty());
        assert!(parse_csv(b"name,age\n").unwrap().is_empty());
    }

    #[test]
    fn blank_lines_skipped() {
        let rows = parse_csv(b"name\nJane Doe\n\nJohn Roe\n").unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn ragged_row_is_parse_error() {
        let err = parse_csv(b"name,age\nJane Doe,22,extra\n").unwrap_err();
        match err {
            ParseError::Malformed { line, .. } => assert_eq!(line, Some(2)),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_is_parse_error() {
        let err = parse_csv(b"name\n\xff\xfe\n").unwrap_err();
        assert!(matches!(err, ParseError::Encoding(_)));
    }
}
