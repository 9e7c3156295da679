use buoy_reader::Dataset;

use crate::error::{PipelineError, Result};

/// `YYYYMMDD` and `HHMMSS` of the first timestamp.
pub fn start_date_and_time(dataset: &Dataset) -> Result<(String, String)> {
    let start = dataset.start_time().ok_or(PipelineError::EmptyDataset)?;
    Ok((
        start.format("%Y%m%d").to_string(),
        start.format("%H%M%S").to_string(),
    ))
}

/// `{datastream}.{date}.{time}[.{title}].{extension}`
pub fn output_filename(
    dataset: &Dataset,
    datastream: &str,
    title: Option<&str>,
    extension: &str,
) -> Result<String> {
    let (date, time) = start_date_and_time(dataset)?;
    let extension = extension.trim_start_matches('.');
    Ok(match title {
        Some(title) if !title.is_empty() => {
            format!("{datastream}.{date}.{time}.{title}.{extension}")
        }
        _ => format!("{datastream}.{date}.{time}.{extension}"),
    })
}
