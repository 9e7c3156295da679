pub mod decode;
pub mod errors;
pub mod formats;
pub mod model;
pub mod normalize;
mod registry;
pub mod table;
pub mod variant;

pub use decode::{decode_bytes, Compression, TextEncoding};
pub use errors::{ErrorKind, ReaderError, Result};
pub use formats::{dataset_from_table, BuoyReader, CsvReader, DelimitedOptions, StaReader, TimeSpec};
pub use model::{Dataset, DatasetBuilder, DatasetError, Values, Variable, DEPTH_DIM, TIME_DIM};
pub use normalize::{apply_variants, bin_currents, rename_variables};
pub use registry::{all_reader_descriptors, reader_descriptor, InstrumentReader, ReaderDescriptor};
pub use table::{parse_delimited, DelimitedFormat, RawTable};
pub use variant::{Variant, VariantSet};
