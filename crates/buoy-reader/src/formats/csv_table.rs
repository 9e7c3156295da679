use tracing::debug;

use crate::decode::{Compression, TextEncoding};
use crate::errors::Result;
use crate::model::Dataset;
use crate::registry::InstrumentReader;
use crate::table::DelimitedFormat;

use super::{dataset_from_table, read_table, DelimitedOptions, TimeSpec};

/// Plain delimited text, one header row, no renames or reshaping.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvReader {
    options: DelimitedOptions,
}

impl CsvReader {
    pub const NAME: &'static str = "csv";

    /// Comma separated UTF-8 with the header on the first line.
    pub fn new(time: TimeSpec) -> Self {
        Self::with_options(DelimitedOptions {
            format: DelimitedFormat::comma(),
            compression: Compression::None,
            encoding: TextEncoding::utf8(),
            time,
        })
    }

    pub fn with_options(options: DelimitedOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DelimitedOptions {
        &self.options
    }
}

impl InstrumentReader for CsvReader {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn read_bytes(&self, source: &str, bytes: &[u8], _key: &str) -> Result<Dataset> {
        let table = read_table(source, bytes, &self.options)?;
        debug!(source, rows = table.height(), columns = table.width(), "parsed csv table");
        let dataset = dataset_from_table(source, &table, &self.options.time)?;
        Ok(dataset.with_attr("reader", Self::NAME))
    }
}
