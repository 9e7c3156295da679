use tracing::debug;

use crate::decode::{Compression, TextEncoding};
use crate::errors::Result;
use crate::model::Dataset;
use crate::registry::InstrumentReader;
use crate::table::DelimitedFormat;

use super::schema::STA_HEADER_LINE;
use super::{dataset_from_table, read_table, DelimitedOptions, TimeSpec};

/// Timestamp column written by the lidar firmware.
pub const STA_TIME_COLUMN: &str = "Timestamp (end of interval)";
pub const STA_TIME_FORMAT: &str = "%Y/%m/%d %H:%M";

/// Lidar `.sta` exports: windows-1252 text, tab separated, a fixed 41 line preamble and
/// usually an xz container around the whole file.
#[derive(Debug, Clone, PartialEq)]
pub struct StaReader {
    options: DelimitedOptions,
}

impl Default for StaReader {
    fn default() -> Self {
        Self::new(TimeSpec::new(STA_TIME_COLUMN).with_format(STA_TIME_FORMAT))
    }
}

impl StaReader {
    pub const NAME: &'static str = "sta";

    pub fn new(time: TimeSpec) -> Self {
        Self {
            options: DelimitedOptions {
                format: DelimitedFormat::tab(STA_HEADER_LINE),
                compression: Compression::Auto,
                encoding: TextEncoding::windows_1252(),
                time,
            },
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.options.compression = compression;
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.options.encoding = encoding;
        self
    }

    pub fn with_header_line(mut self, header_line: usize) -> Self {
        self.options.format.header_line = header_line;
        self
    }

    pub fn options(&self) -> &DelimitedOptions {
        &self.options
    }
}

impl InstrumentReader for StaReader {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn read_bytes(&self, source: &str, bytes: &[u8], _key: &str) -> Result<Dataset> {
        let table = read_table(source, bytes, &self.options)?;
        debug!(
            source,
            rows = table.height(),
            columns = table.width(),
            first_data_line = table.first_data_line(),
            "parsed sta table"
        );
        let dataset = dataset_from_table(source, &table, &self.options.time)?;
        Ok(dataset.with_attr("reader", Self::NAME))
    }
}
