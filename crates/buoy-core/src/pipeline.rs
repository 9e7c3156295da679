use std::path::{Path, PathBuf};

use buoy_reader::{Dataset, InstrumentReader};
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{ConfigError, PipelineError, Result};
use crate::hooks::{resolve_hooks, PipelineHooks, PlotContext};
use crate::storage::{SavedDataset, Storage};

struct ReaderSlot {
    pattern: glob::Pattern,
    reader: Box<dyn InstrumentReader>,
}

/// Reads one raw file with the first matching reader, runs the hooks and stores the result.
pub struct IngestPipeline {
    config: PipelineConfig,
    readers: Vec<ReaderSlot>,
    hooks: Box<dyn PipelineHooks>,
    storage: Storage,
}

pub struct PipelineOutput {
    pub dataset: Dataset,
    pub saved: SavedDataset,
    /// Files stored by the plot hook.
    pub artifacts: Vec<PathBuf>,
}

impl IngestPipeline {
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let readers = config
            .retriever
            .readers
            .iter()
            .map(|rule| {
                Ok(ReaderSlot {
                    pattern: rule.compiled_pattern()?,
                    reader: rule.reader.build(),
                })
            })
            .collect::<std::result::Result<Vec<_>, ConfigError>>()?;
        let hooks = resolve_hooks(&config.hooks)
            .ok_or_else(|| ConfigError::UnknownHooks(config.hooks.clone()))?;
        let storage = Storage::new(&config.storage.root);

        Ok(Self {
            config,
            readers,
            hooks,
            storage,
        })
    }

    pub fn from_yaml_path(path: &Path) -> Result<Self> {
        Self::from_config(PipelineConfig::from_yaml_path(path)?)
    }

    /// Replaces the configured storage root, e.g. to keep test output out of the tree.
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// First reader whose pattern matches the file name.
    pub fn select_reader(&self, path: &Path) -> Result<&dyn InstrumentReader> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.readers
            .iter()
            .find(|slot| slot.pattern.matches(&file_name))
            .map(|slot| slot.reader.as_ref())
            .ok_or(PipelineError::NoReader { file: file_name })
    }

    pub fn run(&self, path: &Path) -> Result<PipelineOutput> {
        let meta = &self.config.pipeline;
        let reader = self.select_reader(path)?;
        info!(
            pipeline = %meta.name,
            input = %path.display(),
            reader = reader.name(),
            hooks = self.hooks.code(),
            "reading input"
        );

        let dataset = reader.read_path(path)?;
        let dataset = self.hooks.customize_dataset(dataset)?;
        let dataset = dataset
            .with_attr("datastream", meta.datastream.as_str())
            .with_attr("location_id", meta.location_id.as_str());
        let dataset = self.hooks.finalize_dataset(dataset)?;

        let saved = self.storage.save_dataset(&dataset, &meta.datastream)?;

        let context = PlotContext {
            storage: &self.storage,
            datastream: &meta.datastream,
            location_id: &meta.location_id,
        };
        let artifacts = self.hooks.plot_dataset(&dataset, &context)?;

        info!(
            pipeline = %meta.name,
            output = %saved.data.display(),
            artifacts = artifacts.len(),
            "pipeline run finished"
        );
        Ok(PipelineOutput {
            dataset,
            saved,
            artifacts,
        })
    }
}
