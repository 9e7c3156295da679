use std::fs::File;
use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::errors::{ReaderError, Result};
use crate::formats::{BuoyReader, CsvReader, StaReader};
use crate::model::Dataset;

/// A stateless reader turning the bytes of one instrument file into a [`Dataset`].
///
/// `source` labels the input in errors; `key` is the free-text name some readers use to
/// select normalization rules (usually the file name).
pub trait InstrumentReader: Send + Sync {
    fn name(&self) -> &'static str;

    fn read_bytes(&self, source: &str, bytes: &[u8], key: &str) -> Result<Dataset>;

    fn read_stream(&self, source: &str, stream: &mut dyn Read, key: &str) -> Result<Dataset> {
        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .map_err(|error| io_error(source, error))?;
        self.read_bytes(source, &bytes, key)
    }

    /// Reads with the file name as key.
    fn read_path(&self, path: &Path) -> Result<Dataset> {
        let key = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.read_path_as(path, &key)
    }

    fn read_path_as(&self, path: &Path, key: &str) -> Result<Dataset> {
        let source = path.display().to_string();
        let bytes = {
            let mut file = File::open(path).map_err(|error| io_error(&source, error))?;
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)
                .map_err(|error| io_error(&source, error))?;
            bytes
        };
        debug!(source = %source, reader = self.name(), bytes = bytes.len(), "read input file");
        self.read_bytes(&source, &bytes, key)
    }
}

fn io_error(source: &str, error: std::io::Error) -> ReaderError {
    ReaderError::Io {
        source_label: source.to_string(),
        error,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderDescriptor {
    pub code: &'static str,
    pub description: &'static str,
}

static READER_DESCRIPTORS: Lazy<Vec<ReaderDescriptor>> = Lazy::new(|| {
    vec![
        ReaderDescriptor {
            code: CsvReader::NAME,
            description: "Generic delimited text with a single header row",
        },
        ReaderDescriptor {
            code: StaReader::NAME,
            description: "Lidar STA export: tab separated cp1252 text behind a 41 line preamble, optionally xz compressed",
        },
        ReaderDescriptor {
            code: BuoyReader::NAME,
            description: "Metocean buoy CSV with surfacetemp, gill and currents normalization",
        },
    ]
});

pub fn all_reader_descriptors() -> &'static [ReaderDescriptor] {
    READER_DESCRIPTORS.as_slice()
}

pub fn reader_descriptor(code: &str) -> Option<&'static ReaderDescriptor> {
    READER_DESCRIPTORS
        .iter()
        .find(|descriptor| descriptor.code == code)
}
