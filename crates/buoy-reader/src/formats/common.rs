use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decode::{decode_bytes, Compression, TextEncoding};
use crate::errors::{ReaderError, Result};
use crate::model::{Dataset, Variable, TIME_DIM};
use crate::table::{parse_delimited, DelimitedFormat, RawTable};

static DEFAULT_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Which raw column carries the timestamps, and how to parse them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeSpec {
    pub column: String,
    /// chrono format string; without one a list of common layouts is tried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl TimeSpec {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            format: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Everything needed to turn the bytes of one delimited instrument file into a table.
#[derive(Debug, Clone, PartialEq)]
pub struct DelimitedOptions {
    pub format: DelimitedFormat,
    pub compression: Compression,
    pub encoding: TextEncoding,
    pub time: TimeSpec,
}

pub(crate) fn parse_optional_f64(value: &str) -> std::result::Result<Option<f64>, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|err| format!("'{trimmed}' is not a number: {err}"))
}

pub(crate) fn parse_timestamp(
    value: &str,
    format: Option<&str>,
) -> std::result::Result<NaiveDateTime, String> {
    let trimmed = value.trim();
    if let Some(fmt) = format {
        return NaiveDateTime::parse_from_str(trimmed, fmt)
            .map_err(|err| format!("invalid timestamp '{trimmed}' for format '{fmt}': {err}"));
    }
    for fmt in DEFAULT_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt);
        }
    }
    Err(format!("invalid timestamp '{trimmed}'"))
}

/// Decodes and tabulates one delimited file.
pub(crate) fn read_table(source: &str, bytes: &[u8], options: &DelimitedOptions) -> Result<RawTable> {
    let text = decode_bytes(source, bytes, options.compression, options.encoding)?;
    parse_delimited(source, &text, &options.format)
}

/// Builds the initial dataset of a raw table: the time column becomes the `time`
/// coordinate, every other column a 1-D variable over `time` (float when every non-empty
/// cell is numeric, text otherwise).
pub fn dataset_from_table(source: &str, table: &RawTable, time: &TimeSpec) -> Result<Dataset> {
    let timestamps = parse_time_column(source, table, time)?;

    let mut builder = Dataset::builder().coord(TIME_DIM, Variable::datetime_1d(TIME_DIM, timestamps));

    for name in table.column_names() {
        if name == time.column {
            continue;
        }
        let variable = if table.is_numeric(name) {
            Variable::float_1d(TIME_DIM, table.numeric_column(source, name)?)
        } else {
            let values = table
                .text_column(name)
                .unwrap_or_default()
                .into_iter()
                .map(|value| value.unwrap_or_default().to_string())
                .collect();
            Variable::text_1d(TIME_DIM, values)
        };
        builder = builder.data_var(name, variable);
    }

    builder
        .attr("source", source)
        .build()
        .map_err(|err| ReaderError::dataset(source, err))
}

fn parse_time_column(source: &str, table: &RawTable, time: &TimeSpec) -> Result<Vec<NaiveDateTime>> {
    let column = &time.column;
    let values = table
        .text_column(column)
        .ok_or_else(|| ReaderError::missing_columns(source, vec![column.clone()], "time coordinate"))?;

    let mut timestamps: Vec<NaiveDateTime> = Vec::with_capacity(values.len());
    for (row, value) in values.into_iter().enumerate() {
        let line_index = table.line_of(row);
        let value = value.ok_or_else(|| ReaderError::value(source, line_index, column, "empty timestamp"))?;
        let parsed = parse_timestamp(value, time.format.as_deref())
            .map_err(|message| ReaderError::value(source, line_index, column, message))?;

        if let Some(previous) = timestamps.last() {
            if parsed < *previous {
                return Err(ReaderError::parse(
                    source,
                    Some(line_index),
                    format!("time must be non-decreasing ({parsed} follows {previous})"),
                ));
            }
        }
        timestamps.push(parsed);
    }

    debug!(
        source,
        rows = timestamps.len(),
        start = ?timestamps.first(),
        end = ?timestamps.last(),
        "parsed time coordinate"
    );
    Ok(timestamps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_layouts() {
        let expected = NaiveDateTime::parse_from_str("2020-12-01 00:10:00", "%Y-%m-%d %H:%M:%S")
            .expect("valid");
        assert_eq!(parse_timestamp("2020-12-01 00:10:00", None), Ok(expected));
        assert_eq!(parse_timestamp("2020/12/01 00:10", None), Ok(expected));
        assert_eq!(parse_timestamp(" 2020-12-01T00:10:00 ", None), Ok(expected));
        assert!(parse_timestamp("yesterday", None).is_err());
    }

    #[test]
    fn explicit_format_is_not_second_guessed() {
        assert!(parse_timestamp("2020-12-01 00:10:00", Some("%d.%m.%Y %H:%M")).is_err());
        assert!(parse_timestamp("01.12.2020 00:10", Some("%d.%m.%Y %H:%M")).is_ok());
    }

    #[test]
    fn optional_float_treats_blank_and_nan_as_missing() {
        assert_eq!(parse_optional_f64(""), Ok(None));
        assert_eq!(parse_optional_f64(" NaN "), Ok(None));
        assert_eq!(parse_optional_f64("-12.5"), Ok(Some(-12.5)));
        assert!(parse_optional_f64("12,5").is_err());
    }
}
