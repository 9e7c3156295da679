use tracing::debug;

use crate::decode::{Compression, TextEncoding};
use crate::errors::Result;
use crate::model::Dataset;
use crate::normalize::apply_variants;
use crate::registry::InstrumentReader;
use crate::table::DelimitedFormat;
use crate::variant::VariantSet;

use super::{dataset_from_table, read_table, DelimitedOptions, TimeSpec};

/// Metocean buoy CSV exports. One file per sensor source; the variant set decides which
/// renames and whether the ADCP columns are stacked into a depth profile.
#[derive(Debug, Clone, PartialEq)]
pub struct BuoyReader {
    options: DelimitedOptions,
    variants: Option<VariantSet>,
}

impl BuoyReader {
    pub const NAME: &'static str = "buoy";

    pub fn new(time: TimeSpec) -> Self {
        Self {
            options: DelimitedOptions {
                format: DelimitedFormat::comma(),
                compression: Compression::None,
                encoding: TextEncoding::utf8(),
                time,
            },
            variants: None,
        }
    }

    /// Fixes the variant set instead of inferring it from the key of each read.
    pub fn with_variants(mut self, variants: VariantSet) -> Self {
        self.variants = Some(variants);
        self
    }

    pub fn with_format(mut self, format: DelimitedFormat) -> Self {
        self.options.format = format;
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.options.encoding = encoding;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.options.compression = compression;
        self
    }

    pub fn options(&self) -> &DelimitedOptions {
        &self.options
    }

    pub fn variants_for(&self, key: &str) -> VariantSet {
        match &self.variants {
            Some(variants) => variants.clone(),
            None => VariantSet::infer_from_key(key),
        }
    }
}

impl InstrumentReader for BuoyReader {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn read_bytes(&self, source: &str, bytes: &[u8], key: &str) -> Result<Dataset> {
        let variants = self.variants_for(key);
        debug!(source, key, variants = %variants, "selected buoy variants");

        let table = read_table(source, bytes, &self.options)?;
        let dataset = dataset_from_table(source, &table, &self.options.time)?;
        let dataset = apply_variants(source, &table, dataset, &variants)?;

        Ok(dataset
            .with_attr("reader", Self::NAME)
            .with_attr("variants", variants.to_string()))
    }
}
