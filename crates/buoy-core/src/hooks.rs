use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use buoy_reader::formats::schema::CURRENT_SPEED;
use buoy_reader::{Dataset, Values};
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::filenames::output_filename;
use crate::plots::{plot_profile_heatmap, plot_time_series};
use crate::storage::Storage;

/// What a plot hook needs to know about the run it belongs to.
pub struct PlotContext<'a> {
    pub storage: &'a Storage,
    pub datastream: &'a str,
    pub location_id: &'a str,
}

/// Per-pipeline customization points around the standard read/save flow. Every method
/// defaults to a no-op.
pub trait PipelineHooks: Send + Sync {
    fn code(&self) -> &'static str;

    /// Runs right after the reader.
    fn customize_dataset(&self, dataset: Dataset) -> Result<Dataset> {
        Ok(dataset)
    }

    /// Runs after the pipeline has stamped its attributes, right before the dataset is saved.
    fn finalize_dataset(&self, dataset: Dataset) -> Result<Dataset> {
        Ok(dataset)
    }

    /// Produces auxiliary artifacts; returns the paths it stored.
    fn plot_dataset(&self, _dataset: &Dataset, _context: &PlotContext<'_>) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

pub struct DefaultHooks;

impl PipelineHooks for DefaultHooks {
    fn code(&self) -> &'static str {
        "default"
    }
}

/// Writes a JSON summary (range and mean of every numeric variable) next to the dataset.
pub struct SummaryHooks;

#[derive(Debug, Serialize)]
struct DatasetSummary<'a> {
    location_id: &'a str,
    datastream: &'a str,
    start: Option<String>,
    end: Option<String>,
    dims: Vec<(&'a str, usize)>,
    variables: Vec<VariableSummary<'a>>,
}

#[derive(Debug, Serialize)]
struct VariableSummary<'a> {
    name: &'a str,
    dims: Vec<&'a str>,
    valid: usize,
    min: Option<f64>,
    max: Option<f64>,
    mean: Option<f64>,
}

impl PipelineHooks for SummaryHooks {
    fn code(&self) -> &'static str {
        "summary"
    }

    fn plot_dataset(&self, dataset: &Dataset, context: &PlotContext<'_>) -> Result<Vec<PathBuf>> {
        let summary = summarize(dataset, context);
        let filename = output_filename(dataset, context.datastream, Some("summary"), "json")?;

        context.storage.uploadable_dir(context.datastream, |dir| {
            let path = dir.join(&filename);
            let file = File::create(&path)
                .map_err(|source| PipelineError::io("failed to create summary", &path, source))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &summary)?;
            writer
                .flush()
                .map_err(|source| PipelineError::io("failed to write summary", &path, source))?;
            debug!(path = %path.display(), "wrote dataset summary");
            Ok(())
        })
    }
}

fn summarize<'a>(dataset: &'a Dataset, context: &PlotContext<'a>) -> DatasetSummary<'a> {
    let time = dataset.time();
    let variables = dataset
        .data_vars()
        .iter()
        .filter_map(|(name, variable)| match variable.values() {
            Values::Float(values) => {
                let valid: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
                let min = valid.iter().copied().reduce(f64::min);
                let max = valid.iter().copied().reduce(f64::max);
                let mean = (!valid.is_empty()).then(|| valid.iter().sum::<f64>() / valid.len() as f64);
                Some(VariableSummary {
                    name,
                    dims: variable.dims().iter().map(String::as_str).collect(),
                    valid: valid.len(),
                    min,
                    max,
                    mean,
                })
            }
            _ => None,
        })
        .collect();

    DatasetSummary {
        location_id: context.location_id,
        datastream: context.datastream,
        start: time.and_then(|t| t.iter().next()).map(|t| t.to_string()),
        end: time.and_then(|t| t.iter().last()).map(|t| t.to_string()),
        dims: dataset
            .dims()
            .iter()
            .map(|(name, len)| (name.as_str(), *len))
            .collect(),
        variables,
    }
}

/// Quick-look PNGs for metocean buoy data: surface met time series, conductivity with sea
/// surface temperature, and the current speed profile. Plots whose variables are absent
/// from the dataset are skipped.
pub struct MetoceanHooks;

const SURFACE_MET: &[&str] = &[
    "gill_horizontal_wind_speed",
    "gill_horizontal_wind_direction",
    "Air Temperature (C)",
    "surfacetemp - Surface Temperature (C)",
];

const CONDUCTIVITY: &[&str] = &["Conductivity (S/m)", "surfacetemp - Surface Temperature (C)"];

impl PipelineHooks for MetoceanHooks {
    fn code(&self) -> &'static str {
        "metocean"
    }

    fn plot_dataset(&self, dataset: &Dataset, context: &PlotContext<'_>) -> Result<Vec<PathBuf>> {
        let name =
            |title: &str| output_filename(dataset, context.datastream, Some(title), "png");
        let surface = name("surface_met_parameters")?;
        let conductivity = name("conductivity")?;
        let currents = name("current_velocity")?;

        context.storage.uploadable_dir(context.datastream, |dir| {
            plot_time_series(&dir.join(&surface), dataset, SURFACE_MET)?;
            plot_time_series(&dir.join(&conductivity), dataset, CONDUCTIVITY)?;
            plot_profile_heatmap(&dir.join(&currents), dataset, CURRENT_SPEED)?;
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HooksDescriptor {
    pub code: &'static str,
    pub description: &'static str,
}

static HOOKS: Lazy<Vec<HooksDescriptor>> = Lazy::new(|| {
    vec![
        HooksDescriptor {
            code: "default",
            description: "No customization; the dataset is saved as read",
        },
        HooksDescriptor {
            code: "summary",
            description: "Stores a JSON summary of every numeric variable alongside the dataset",
        },
        HooksDescriptor {
            code: "metocean",
            description: "Stores PNG plots of surface met, conductivity and current profiles",
        },
    ]
});

pub fn all_hooks_descriptors() -> &'static [HooksDescriptor] {
    HOOKS.as_slice()
}

pub fn hooks_descriptor(code: &str) -> Option<&'static HooksDescriptor> {
    HOOKS.iter().find(|descriptor| descriptor.code == code)
}

pub fn resolve_hooks(code: &str) -> Option<Box<dyn PipelineHooks>> {
    match code {
        "default" => Some(Box::new(DefaultHooks)),
        "summary" => Some(Box::new(SummaryHooks)),
        "metocean" => Some(Box::new(MetoceanHooks)),
        _ => None,
    }
}
