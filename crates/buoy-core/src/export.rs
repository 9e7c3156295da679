use buoy_reader::{Dataset, Values, Variable, DEPTH_DIM, TIME_DIM};
use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Flattens a dataset into one row per `time`, or per `(time, depth)` pair when the
/// dataset has a depth dimension. Rows are time-major.
pub fn dataset_to_dataframe(dataset: &Dataset) -> Result<DataFrame> {
    let n_time = dataset.dim_len(TIME_DIM).unwrap_or(0);
    let n_depth = dataset.dim_len(DEPTH_DIM);
    let layout = Layout { n_time, n_depth };

    let mut columns: Vec<Column> =
        Vec::with_capacity(dataset.coords().len() + dataset.data_vars().len());

    let times: Vec<i64> = dataset
        .time()
        .map(|time| time.iter().map(|t| t.and_utc().timestamp_micros()).collect())
        .unwrap_or_default();
    let times = layout.expand(&[TIME_DIM.to_string()], times);
    columns.push(
        Series::new(TIME_DIM.into(), times)
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
            .into(),
    );

    if let Some(depth) = dataset.depth() {
        let depth = layout.expand(&[DEPTH_DIM.to_string()], depth.iter().copied().collect());
        columns.push(Series::new(DEPTH_DIM.into(), depth).into());
    }

    let others = dataset
        .coords()
        .iter()
        .filter(|(name, _)| name.as_str() != TIME_DIM && name.as_str() != DEPTH_DIM)
        .chain(dataset.data_vars().iter());
    for (name, variable) in others {
        columns.push(variable_column(name, variable, &layout)?);
    }

    Ok(DataFrame::new(columns)?)
}

struct Layout {
    n_time: usize,
    n_depth: Option<usize>,
}

impl Layout {
    fn supports(&self, dims: &[String]) -> bool {
        match (dims, self.n_depth) {
            ([dim], _) => dim == TIME_DIM || dim == DEPTH_DIM,
            ([first, second], Some(_)) => first == TIME_DIM && second == DEPTH_DIM,
            _ => false,
        }
    }

    /// Repeats or tiles values laid out over `dims` to the row layout. `values` must
    /// already be in logical (row-major) order.
    fn expand<T: Clone>(&self, dims: &[String], values: Vec<T>) -> Vec<T> {
        let Some(n_depth) = self.n_depth else {
            return values;
        };
        match dims {
            [dim] if dim == TIME_DIM => values
                .into_iter()
                .flat_map(|value| std::iter::repeat(value).take(n_depth))
                .collect(),
            [dim] if dim == DEPTH_DIM => (0..self.n_time)
                .flat_map(|_| values.iter().cloned())
                .collect(),
            _ => values,
        }
    }
}

fn variable_column(name: &str, variable: &Variable, layout: &Layout) -> Result<Column> {
    let dims = variable.dims();
    if !layout.supports(dims) {
        return Err(PipelineError::UnsupportedDims {
            name: name.to_string(),
            dims: dims.join(", "),
        });
    }

    let series = match variable.values() {
        Values::Float(values) => {
            let values: Vec<f64> = values.iter().copied().collect();
            Series::new(name.into(), layout.expand(dims, values))
        }
        Values::Text(values) => {
            let values: Vec<String> = values.iter().cloned().collect();
            Series::new(name.into(), layout.expand(dims, values))
        }
        Values::Datetime(values) => {
            let values: Vec<i64> = values
                .iter()
                .map(|t| t.and_utc().timestamp_micros())
                .collect();
            Series::new(name.into(), layout.expand(dims, values))
                .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        }
    };
    Ok(series.into())
}
