mod buoy;
mod common;
mod csv_table;
pub mod schema;
mod sta;

pub use buoy::BuoyReader;
pub use csv_table::CsvReader;
pub use sta::{StaReader, STA_TIME_COLUMN, STA_TIME_FORMAT};

pub use common::{dataset_from_table, DelimitedOptions, TimeSpec};
pub(crate) use common::{parse_optional_f64, read_table};
