use ndarray::Array2;
use tracing::debug;

use crate::errors::{ReaderError, Result};
use crate::formats::schema::{
    direction_column, velocity_column, BIN_STRIDE_M, CURRENT_DIRECTION, CURRENT_SPEED,
    GILL_RENAMES, MARKER_COLUMNS, SURFACETEMP_RENAMES,
};
use crate::model::{Dataset, Values, Variable, DEPTH_DIM, TIME_DIM};
use crate::table::RawTable;
use crate::variant::{Variant, VariantSet};

/// Renames data variables. Every `from` must exist and no `to` may collide with another
/// variable; all other variables keep their data and position.
pub fn rename_variables(source: &str, dataset: Dataset, mapping: &[(&str, &str)]) -> Result<Dataset> {
    let missing: Vec<String> = mapping
        .iter()
        .filter(|(from, _)| dataset.data_var(from).is_none())
        .map(|(from, _)| from.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ReaderError::missing_columns(source, missing, "rename"));
    }

    let mut builder = dataset.into_builder();
    for (from, to) in mapping {
        if from == to {
            continue;
        }
        if builder.contains(to) {
            return Err(ReaderError::NameConflict {
                source_label: source.to_string(),
                name: to.to_string(),
                context: "rename target",
            });
        }
        builder.rename_data_var(from, *to);
        debug!(source, from, to, "renamed variable");
    }

    builder
        .build()
        .map_err(|err| ReaderError::dataset(source, err))
}

/// Stacks the paired `Vel{i} (mm/s)` / `Dir{i} (deg)` columns of an ADCP export into
/// `current_speed` and `current_direction` over `(time, depth)`.
///
/// The scan starts at bin 1 and stops at the first bin whose pair is incomplete; pairs past
/// that gap stay ordinary 1-D variables. Without any pair the dataset comes back unchanged
/// and without a `depth` dimension.
pub fn bin_currents(source: &str, table: &RawTable, dataset: Dataset) -> Result<Dataset> {
    let missing: Vec<String> = MARKER_COLUMNS
        .iter()
        .filter(|name| !table.has_column(name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ReaderError::missing_columns(source, missing, "depth binning"));
    }

    let mut first_bin = 0.0;
    for marker in MARKER_COLUMNS {
        first_bin += first_row_value(source, table, marker)?;
    }
    if !first_bin.is_finite() {
        return Err(ReaderError::value(
            source,
            table.first_data_line(),
            MARKER_COLUMNS[0],
            format!("first bin depth {first_bin} is not finite"),
        ));
    }

    let mut consumed: Vec<String> = Vec::new();
    let mut speed_bins: Vec<Vec<f64>> = Vec::new();
    let mut direction_bins: Vec<Vec<f64>> = Vec::new();
    let mut index = 1;
    loop {
        let velocity = velocity_column(index);
        let direction = direction_column(index);
        if !(table.has_column(&velocity) && table.has_column(&direction)) {
            break;
        }
        speed_bins.push(table.numeric_column(source, &velocity)?);
        direction_bins.push(table.numeric_column(source, &direction)?);
        consumed.push(velocity);
        consumed.push(direction);
        index += 1;
    }

    if speed_bins.is_empty() {
        debug!(source, "no velocity/direction pairs, leaving dataset without depth");
        return Ok(dataset);
    }

    let n_time = table.height();
    let n_depth = speed_bins.len();
    let depth: Vec<f64> = (0..n_depth)
        .map(|bin| first_bin + BIN_STRIDE_M * bin as f64)
        .collect();
    let speed = Array2::from_shape_fn((n_time, n_depth), |(t, d)| speed_bins[d][t]);
    let direction = Array2::from_shape_fn((n_time, n_depth), |(t, d)| direction_bins[d][t]);

    let mut builder = dataset.into_builder();
    for name in &consumed {
        builder.take_data_var(name);
    }
    for name in [DEPTH_DIM, CURRENT_SPEED, CURRENT_DIRECTION] {
        if builder.contains(name) {
            return Err(ReaderError::NameConflict {
                source_label: source.to_string(),
                name: name.to_string(),
                context: "depth binning output",
            });
        }
    }

    debug!(source, bins = n_depth, first_bin, "binned current profile");

    builder
        .coord(DEPTH_DIM, Variable::float_1d(DEPTH_DIM, depth))
        .data_var(
            CURRENT_SPEED,
            Variable::new([TIME_DIM, DEPTH_DIM], Values::Float(speed.into_dyn())),
        )
        .data_var(
            CURRENT_DIRECTION,
            Variable::new([TIME_DIM, DEPTH_DIM], Values::Float(direction.into_dyn())),
        )
        .build()
        .map_err(|err| ReaderError::dataset(source, err))
}

/// Applies the rules of every selected variant, surfacetemp then gill then currents.
pub fn apply_variants(
    source: &str,
    table: &RawTable,
    dataset: Dataset,
    variants: &VariantSet,
) -> Result<Dataset> {
    let mut dataset = dataset;
    for variant in variants.iter() {
        dataset = match variant {
            Variant::SurfaceTemp => rename_variables(source, dataset, SURFACETEMP_RENAMES)?,
            Variant::Gill => rename_variables(source, dataset, GILL_RENAMES)?,
            Variant::Currents => bin_currents(source, table, dataset)?,
        };
    }
    Ok(dataset)
}

fn first_row_value(source: &str, table: &RawTable, column: &str) -> Result<f64> {
    let line_index = table.first_data_line();
    let value = table
        .cell(column, 0)
        .ok_or_else(|| ReaderError::value(source, line_index, column, "marker value is empty"))?;
    match value.trim().parse::<f64>() {
        Ok(parsed) if !parsed.is_nan() => Ok(parsed),
        Ok(_) => Err(ReaderError::value(source, line_index, column, "marker value is NaN")),
        Err(err) => Err(ReaderError::value(
            source,
            line_index,
            column,
            format!("'{value}' is not a number: {err}"),
        )),
    }
}
