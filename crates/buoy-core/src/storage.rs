use std::fs::{self, File};
use std::path::{Path, PathBuf};

use buoy_reader::Dataset;
use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::export::dataset_to_dataframe;
use crate::filenames::output_filename;

/// Local filesystem storage area. Every datastream gets its own directory under `root`.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

/// Files written for one saved dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDataset {
    pub data: PathBuf,
    pub metadata: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn datastream_dir(&self, datastream: &str) -> PathBuf {
        self.root.join(datastream)
    }

    fn ensure_datastream_dir(&self, datastream: &str) -> Result<PathBuf> {
        let dir = self.datastream_dir(datastream);
        fs::create_dir_all(&dir).map_err(|source| {
            PipelineError::io("failed to create storage directory", &dir, source)
        })?;
        Ok(dir)
    }

    /// Writes the dataset as zstd parquet plus a JSON sidecar with its dimensions,
    /// variable layout and attributes.
    pub fn save_dataset(&self, dataset: &Dataset, datastream: &str) -> Result<SavedDataset> {
        let dir = self.ensure_datastream_dir(datastream)?;
        let data = dir.join(output_filename(dataset, datastream, None, "parquet")?);
        let metadata = dir.join(output_filename(dataset, datastream, None, "json")?);

        let mut df = dataset_to_dataframe(dataset)?;
        let file = File::create(&data)
            .map_err(|source| PipelineError::io("failed to create output", &data, source))?;
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Zstd(None))
            .with_statistics(StatisticsOptions::default())
            .finish(&mut df)?;

        let variables: serde_json::Map<String, serde_json::Value> = dataset
            .coords()
            .iter()
            .chain(dataset.data_vars().iter())
            .map(|(name, variable)| {
                (
                    name.clone(),
                    json!({
                        "dims": variable.dims(),
                        "dtype": variable.values().dtype(),
                        "coordinate": dataset.coord(name).is_some(),
                    }),
                )
            })
            .collect();
        let sidecar = json!({
            "datastream": datastream,
            "dims": dataset.dims(),
            "variables": variables,
            "attrs": dataset.attrs(),
        });
        let bytes = serde_json::to_vec_pretty(&sidecar)?;
        fs::write(&metadata, bytes)
            .map_err(|source| PipelineError::io("failed to write metadata", &metadata, source))?;

        info!(
            datastream,
            rows = df.height(),
            path = %data.display(),
            "saved dataset"
        );
        Ok(SavedDataset { data, metadata })
    }

    /// Hands `write` a fresh temporary directory and moves every file it leaves there into
    /// the datastream's storage directory. The temporary directory is removed whether or
    /// not `write` succeeds. Either every staged file is stored or, when a move fails, the
    /// files already moved are removed again and nothing is stored.
    pub fn uploadable_dir<F>(&self, datastream: &str, write: F) -> Result<Vec<PathBuf>>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let staging = tempfile::Builder::new()
            .prefix("buoy-upload-")
            .tempdir()
            .map_err(|source| {
                PipelineError::io("failed to create staging directory", std::env::temp_dir(), source)
            })?;

        write(staging.path())?;

        let mut staged = Vec::new();
        let entries = fs::read_dir(staging.path()).map_err(|source| {
            PipelineError::io("failed to list staging directory", staging.path(), source)
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| {
                PipelineError::io("failed to list staging directory", staging.path(), source)
            })?;
            let from = entry.path();
            if from.is_file() {
                staged.push((from, entry.file_name()));
            }
        }
        staged.sort();

        let dest = self.ensure_datastream_dir(datastream)?;
        let mut stored = Vec::with_capacity(staged.len());
        for (from, name) in staged {
            let to = dest.join(name);
            if let Err(err) = move_file(&from, &to) {
                discard(&stored);
                return Err(err);
            }
            debug!(path = %to.display(), "stored uploadable file");
            stored.push(to);
        }
        Ok(stored)
    }
}

/// Rename when possible, copy otherwise (the staging directory may sit on another
/// filesystem).
fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) => {
            debug!(
                from = %from.display(),
                to = %to.display(),
                error = %err,
                "rename failed, copying"
            );
            fs::copy(from, to)
                .map_err(|source| PipelineError::io("failed to store file", to, source))?;
            Ok(())
        }
    }
}

fn discard(stored: &[PathBuf]) {
    for path in stored {
        if let Err(err) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %err, "failed to remove partially stored file");
        }
    }
}
