use std::collections::HashSet;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ReaderError, Result};
use crate::formats::parse_optional_f64;

/// Layout of a delimited text file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelimitedFormat {
    #[serde(default = "default_delimiter", with = "delimiter_char")]
    pub delimiter: u8,
    /// Number of preamble lines before the header row.
    #[serde(default)]
    pub header_line: usize,
}

impl DelimitedFormat {
    pub fn comma() -> Self {
        Self {
            delimiter: b',',
            header_line: 0,
        }
    }

    pub fn tab(header_line: usize) -> Self {
        Self {
            delimiter: b'\t',
            header_line,
        }
    }
}

impl Default for DelimitedFormat {
    fn default() -> Self {
        Self::comma()
    }
}

fn default_delimiter() -> u8 {
    b','
}

mod delimiter_char {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        let text = match *value {
            b'\t' => "\\t".to_string(),
            other => (other as char).to_string(),
        };
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let text = String::deserialize(deserializer)?;
        match text.as_str() {
            "\\t" | "\t" | "tab" => Ok(b'\t'),
            "comma" => Ok(b','),
            other if other.len() == 1 && other.is_ascii() => Ok(other.as_bytes()[0]),
            other => Err(serde::de::Error::custom(format!(
                "delimiter must be a single ASCII character, got '{other}'"
            ))),
        }
    }
}

/// Parsed rows of one instrument file, every cell kept as its source text (`None` for an
/// empty cell). Numeric interpretation happens when a column is consumed.
#[derive(Debug, Clone)]
pub struct RawTable {
    df: DataFrame,
    first_data_line: usize,
    data_lines: Vec<usize>,
}

impl RawTable {
    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn width(&self) -> usize {
        self.df.width()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.as_str())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    /// 1-based line of the first data row in the decoded text.
    pub fn first_data_line(&self) -> usize {
        self.first_data_line
    }

    /// 1-based line of data row `row`.
    pub fn line_of(&self, row: usize) -> usize {
        self.data_lines
            .get(row)
            .copied()
            .unwrap_or(self.first_data_line + row)
    }

    pub fn text_column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let column = self.df.column(name).ok()?;
        let values = column.str().ok()?;
        Some(values.into_iter().collect())
    }

    pub fn cell(&self, name: &str, row: usize) -> Option<&str> {
        self.df.column(name).ok()?.str().ok()?.get(row)
    }

    /// True when every non-empty cell of the column parses as a number.
    pub fn is_numeric(&self, name: &str) -> bool {
        match self.text_column(name) {
            Some(values) => values
                .into_iter()
                .flatten()
                .all(|value| parse_optional_f64(value).is_ok()),
            None => false,
        }
    }

    /// Numeric view of a column; empty cells become NaN. The first non-numeric cell fails
    /// the read with its line and column.
    pub fn numeric_column(&self, source: &str, name: &str) -> Result<Vec<f64>> {
        let values = self
            .text_column(name)
            .ok_or_else(|| ReaderError::MissingColumns {
                source_label: source.to_string(),
                missing: vec![name.to_string()],
                context: "numeric column",
            })?;

        values
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value {
                None => Ok(f64::NAN),
                Some(text) => parse_optional_f64(text)
                    .map(|parsed| parsed.unwrap_or(f64::NAN))
                    .map_err(|message| ReaderError::value(source, self.line_of(row), name, message)),
            })
            .collect()
    }
}

/// Splits decoded text into a [`RawTable`]: skips `header_line` preamble lines, takes the
/// next line as the header and requires every following record to carry exactly one field
/// per header column.
pub fn parse_delimited(source: &str, text: &str, format: &DelimitedFormat) -> Result<RawTable> {
    let body = skip_lines(text, format.header_line).ok_or_else(|| {
        ReaderError::parse(
            source,
            None,
            format!(
                "expected {} preamble line(s) before the header, found end of input",
                format.header_line
            ),
        )
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(format.delimiter)
        .from_reader(body.as_bytes());
    let mut records = reader.records();

    let header_record = records
        .next()
        .ok_or_else(|| ReaderError::parse(source, None, "file missing header row"))?
        .map_err(|err| csv_error(source, err))?;
    let header_line_no = format.header_line + record_line(&header_record, 1);

    let mut header: Vec<String> = header_record
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    let trailing_delimiter = header.len() > 1 && header.last().is_some_and(|name| name.is_empty());
    if trailing_delimiter {
        header.pop();
    }
    validate_header(source, &header, header_line_no)?;

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); header.len()];
    let mut data_lines = Vec::new();

    for (row_idx, record) in records.enumerate() {
        let record = record.map_err(|err| csv_error(source, err))?;
        // header occupies body line 1
        let line_index = format.header_line + record_line(&record, row_idx + 2);

        let mut width = record.len();
        if trailing_delimiter
            && width == header.len() + 1
            && record.get(header.len()).is_some_and(|field| field.trim().is_empty())
        {
            width -= 1;
        }

        if width != header.len() {
            return Err(ReaderError::parse(
                source,
                Some(line_index),
                format!("expected {} columns but found {}", header.len(), width),
            ));
        }

        for (column, field) in cells.iter_mut().zip(record.iter()) {
            let trimmed = field.trim();
            column.push(if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            });
        }
        data_lines.push(line_index);
    }

    let columns: Vec<Column> = header
        .iter()
        .zip(cells)
        .map(|(name, values)| Series::new(name.as_str().into(), values).into())
        .collect();

    let df = DataFrame::new(columns).map_err(|err| {
        ReaderError::parse(
            source,
            Some(header_line_no),
            format!("failed to build raw table: {err}"),
        )
    })?;

    debug!(
        source,
        rows = df.height(),
        columns = df.width(),
        "parsed delimited table"
    );

    Ok(RawTable {
        df,
        first_data_line: header_line_no + 1,
        data_lines,
    })
}

/// Returns the text after the first `count` lines, or `None` when the input is shorter.
fn skip_lines(text: &str, count: usize) -> Option<&str> {
    let mut offset = 0;
    for _ in 0..count {
        let rest = &text[offset..];
        if rest.is_empty() {
            return None;
        }
        match rest.find('\n') {
            Some(pos) => offset += pos + 1,
            None => offset = text.len(),
        }
    }
    Some(&text[offset..])
}

fn record_line(record: &csv::StringRecord, fallback: usize) -> usize {
    record
        .position()
        .map(|position| position.line() as usize)
        .unwrap_or(fallback)
}

fn csv_error(source: &str, err: csv::Error) -> ReaderError {
    ReaderError::Csv {
        source_label: source.to_string(),
        error: err,
    }
}

fn validate_header(source: &str, header: &[String], line_index: usize) -> Result<()> {
    let mut seen = HashSet::with_capacity(header.len());
    for (idx, name) in header.iter().enumerate() {
        if name.is_empty() {
            return Err(ReaderError::parse(
                source,
                Some(line_index),
                format!("header column {idx} is empty"),
            ));
        }
        if !seen.insert(name.as_str()) {
            return Err(ReaderError::parse(
                source,
                Some(line_index),
                format!("duplicate header column '{name}'"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn skips_preamble_and_drops_trailing_delimiter() {
        let text = "preamble=1\npreamble=2\nTime\tSpeed\t\n2020/12/01 00:10\t4.5\t\n2020/12/01 00:20\t\t\n";
        let table = parse_delimited("inline", text, &DelimitedFormat::tab(2)).expect("parses");

        assert_eq!(table.column_names(), vec!["Time", "Speed"]);
        assert_eq!(table.height(), 2);
        assert_eq!(table.first_data_line(), 4);
        assert_eq!(table.cell("Speed", 0), Some("4.5"));
        assert_eq!(table.cell("Speed", 1), None);

        let speed = table.numeric_column("inline", "Speed").expect("numeric");
        assert_eq!(speed[0], 4.5);
        assert!(speed[1].is_nan());
    }

    #[test]
    fn wrong_field_count_names_the_line() {
        let text = "a,b\n1,2\n3\n";
        let err = parse_delimited("inline.csv", text, &DelimitedFormat::comma()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Parse);
        match err {
            ReaderError::Parse { line_index, .. } => assert_eq!(line_index, Some(3)),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_header_is_a_parse_error() {
        let err = parse_delimited("inline", "only\npreamble\n", &DelimitedFormat::tab(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn duplicate_header_is_rejected() {
        let err = parse_delimited("inline", "a,a\n1,2\n", &DelimitedFormat::comma()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn non_numeric_cell_is_a_value_error() {
        let text = "a,b\n1,x\n2,3\n";
        let table = parse_delimited("inline", text, &DelimitedFormat::comma()).expect("parses");

        assert!(table.is_numeric("a"));
        assert!(!table.is_numeric("b"));
        let err = table.numeric_column("inline", "b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        match err {
            ReaderError::Value {
                line_index, column, ..
            } => {
                assert_eq!(line_index, 2);
                assert_eq!(column, "b");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn blank_lines_are_not_rows() {
        let text = "a\n1\n\nx\n";
        let table = parse_delimited("inline", text, &DelimitedFormat::comma()).expect("parses");
        assert_eq!(table.height(), 2);
        assert_eq!(table.line_of(0), 2);
        assert_eq!(table.cell("a", 1), Some("x"));
    }

    #[test]
    fn delimiter_deserializes_from_escape() {
        let format: DelimitedFormat =
            serde_yaml::from_str("delimiter: \"\\\\t\"\nheader_line: 41\n").expect("yaml");
        assert_eq!(format, DelimitedFormat::tab(41));
    }
}
