use std::fmt::Display;
use std::path::Path;

use buoy_reader::{Dataset, DEPTH_DIM, TIME_DIM};
use plotters::prelude::*;
use tracing::debug;

use crate::error::{PipelineError, Result};

const WIDTH: u32 = 1200;
const PANEL_HEIGHT: u32 = 240;
const HEATMAP_HEIGHT: u32 = 600;

const LINE: RGBColor = RGBColor(33, 145, 140);
const LOW: RGBColor = RGBColor(68, 1, 84);
const HIGH: RGBColor = RGBColor(253, 231, 37);
const MISSING: RGBColor = RGBColor(211, 211, 211);

// The bitmap backend is built without a font renderer, so charts carry no text.

/// Stacks one line panel per named `(time)` float variable. Names absent from the
/// dataset are skipped; returns `false` (and writes nothing) when none are present.
pub fn plot_time_series(path: &Path, dataset: &Dataset, names: &[&str]) -> Result<bool> {
    let series: Vec<(&str, Vec<f64>)> = names
        .iter()
        .filter_map(|name| {
            let variable = dataset.data_var(name)?;
            if variable.dims().len() != 1 || variable.dims()[0] != TIME_DIM {
                return None;
            }
            let values = variable.as_float()?;
            Some((*name, values.iter().copied().collect()))
        })
        .collect();
    if series.is_empty() {
        return Ok(false);
    }

    let hours = elapsed_hours(dataset);
    let (x0, x1) = padded_range(hours.iter().copied()).unwrap_or((0.0, 1.0));

    let height = PANEL_HEIGHT * series.len() as u32;
    let root = BitMapBackend::new(path, (WIDTH, height)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| plot_error(path, e))?;

    let panels = root.split_evenly((series.len(), 1));
    for ((name, values), panel) in series.iter().zip(panels.iter()) {
        let Some((y0, y1)) = padded_range(values.iter().copied()) else {
            debug!(variable = *name, "no finite values to plot");
            continue;
        };
        let mut chart = ChartBuilder::on(panel)
            .margin(12)
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(|e| plot_error(path, e))?;
        for segment in finite_segments(&hours, values) {
            chart
                .draw_series(LineSeries::new(segment, &LINE))
                .map_err(|e| plot_error(path, e))?;
        }
    }

    root.present().map_err(|e| plot_error(path, e))?;
    debug!(path = %path.display(), panels = series.len(), "wrote time series plot");
    Ok(true)
}

/// Draws a `(time, depth)` float variable as shaded cells, time along x and depth along
/// y. Returns `false` (and writes nothing) when the variable is absent or not a profile.
pub fn plot_profile_heatmap(path: &Path, dataset: &Dataset, name: &str) -> Result<bool> {
    let Some(variable) = dataset.data_var(name) else {
        return Ok(false);
    };
    if variable.dims() != [TIME_DIM, DEPTH_DIM] {
        return Ok(false);
    }
    let (Some(values), Some(depth)) = (variable.as_float(), dataset.depth()) else {
        return Ok(false);
    };
    let &[n_time, n_depth] = values.shape() else {
        return Ok(false);
    };

    let cells: Vec<f64> = values.iter().copied().collect();
    let depth: Vec<f64> = depth.iter().copied().collect();
    let x_edges = cell_edges(&elapsed_hours(dataset));
    let y_edges = cell_edges(&depth);
    let (Some(&x0), Some(&x1), Some(&y0), Some(&y1)) =
        (x_edges.first(), x_edges.last(), y_edges.first(), y_edges.last())
    else {
        return Ok(false);
    };
    let scale = padded_range(cells.iter().copied()).unwrap_or((0.0, 1.0));

    let root = BitMapBackend::new(path, (WIDTH, HEATMAP_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| plot_error(path, e))?;
    let mut chart = ChartBuilder::on(&root)
        .margin(12)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(|e| plot_error(path, e))?;

    chart
        .draw_series((0..n_time).flat_map(|t| (0..n_depth).map(move |d| (t, d))).map(
            |(t, d)| {
                Rectangle::new(
                    [(x_edges[t], y_edges[d]), (x_edges[t + 1], y_edges[d + 1])],
                    shade(cells[t * n_depth + d], scale).filled(),
                )
            },
        ))
        .map_err(|e| plot_error(path, e))?;

    root.present().map_err(|e| plot_error(path, e))?;
    debug!(path = %path.display(), variable = name, n_time, n_depth, "wrote profile plot");
    Ok(true)
}

fn plot_error(path: &Path, err: impl Display) -> PipelineError {
    PipelineError::Plot {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Hours since the first timestamp.
fn elapsed_hours(dataset: &Dataset) -> Vec<f64> {
    let Some(time) = dataset.time() else {
        return Vec::new();
    };
    let Some(start) = time.iter().next().copied() else {
        return Vec::new();
    };
    time.iter()
        .map(|t| (*t - start).num_milliseconds() as f64 / 3_600_000.0)
        .collect()
}

/// Min and max of the finite values, widened when they coincide.
fn padded_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (low, high) = values
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            Some((low, high)) => Some((low.min(v), high.max(v))),
            None => Some((v, v)),
        })?;
    if high > low {
        Some((low, high))
    } else {
        let pad = if low == 0.0 { 1.0 } else { low.abs() * 0.1 };
        Some((low - pad, high + pad))
    }
}

/// Runs of consecutive finite points; a missing value breaks the line.
fn finite_segments(x: &[f64], y: &[f64]) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for (&x, &y) in x.iter().zip(y) {
        if y.is_finite() {
            current.push((x, y));
        } else if !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Boundaries of the cells centred on `centers`: midpoints between neighbours, with the
/// outer cells mirrored from their inner half.
fn cell_edges(centers: &[f64]) -> Vec<f64> {
    match centers {
        [] => Vec::new(),
        [only] => vec![only - 0.5, only + 0.5],
        [first, second, ..] => {
            let mut edges = Vec::with_capacity(centers.len() + 1);
            edges.push(first - (second - first) / 2.0);
            edges.extend(centers.windows(2).map(|pair| (pair[0] + pair[1]) / 2.0));
            let n = centers.len();
            edges.push(centers[n - 1] + (centers[n - 1] - centers[n - 2]) / 2.0);
            edges
        }
    }
}

fn shade(value: f64, (low, high): (f64, f64)) -> RGBColor {
    if !value.is_finite() {
        return MISSING;
    }
    let t = ((value - low) / (high - low)).clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
    RGBColor(mix(LOW.0, HIGH.0), mix(LOW.1, HIGH.1), mix(LOW.2, HIGH.2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cell_edges_bracket_depth_bins() {
        assert_eq!(cell_edges(&[5.0, 9.0, 13.0]), vec![3.0, 7.0, 11.0, 15.0]);
        assert_eq!(cell_edges(&[2.0]), vec![1.5, 2.5]);
        assert!(cell_edges(&[]).is_empty());
    }

    #[test]
    fn missing_values_split_lines() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [1.0, f64::NAN, 2.0, 3.0, f64::NAN];
        assert_eq!(
            finite_segments(&x, &y),
            vec![vec![(0.0, 1.0)], vec![(2.0, 2.0), (3.0, 3.0)]]
        );
    }

    #[test]
    fn flat_series_get_a_visible_range() {
        let (low, high) = padded_range([4.0, 4.0, f64::NAN].into_iter()).expect("range");
        assert_abs_diff_eq!(low, 3.6, epsilon = 1e-12);
        assert_abs_diff_eq!(high, 4.4, epsilon = 1e-12);
        assert!(padded_range([f64::NAN].into_iter()).is_none());
    }

    #[test]
    fn shading_spans_the_value_range() {
        assert_eq!(shade(0.0, (0.0, 10.0)), LOW);
        assert_eq!(shade(10.0, (0.0, 10.0)), HIGH);
        assert_eq!(shade(f64::NAN, (0.0, 10.0)), MISSING);
    }
}
