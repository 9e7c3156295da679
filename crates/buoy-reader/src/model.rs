use std::fmt;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use ndarray::{Array1, ArrayD};
use thiserror::Error;

pub const TIME_DIM: &str = "time";
pub const DEPTH_DIM: &str = "depth";

#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Float(ArrayD<f64>),
    Text(ArrayD<String>),
    Datetime(ArrayD<NaiveDateTime>),
}

impl Values {
    pub fn shape(&self) -> &[usize] {
        match self {
            Values::Float(array) => array.shape(),
            Values::Text(array) => array.shape(),
            Values::Datetime(array) => array.shape(),
        }
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            Values::Float(_) => "float64",
            Values::Text(_) => "str",
            Values::Datetime(_) => "datetime",
        }
    }

    /// Equality that compares floats by bit pattern, so NaN cells match NaN cells.
    pub fn bit_eq(&self, other: &Values) -> bool {
        match (self, other) {
            (Values::Float(a), Values::Float(b)) => {
                a.shape() == b.shape()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => self == other,
        }
    }

    pub fn as_float(&self) -> Option<&ArrayD<f64>> {
        match self {
            Values::Float(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&ArrayD<String>> {
        match self {
            Values::Text(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&ArrayD<NaiveDateTime>> {
        match self {
            Values::Datetime(array) => Some(array),
            _ => None,
        }
    }
}

/// A named-dimension array. Variables are only reachable through a [`Dataset`], which
/// guarantees the shape matches the dimension lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    dims: Vec<String>,
    values: Values,
}

impl Variable {
    pub fn new<S: Into<String>>(dims: impl IntoIterator<Item = S>, values: Values) -> Self {
        Self {
            dims: dims.into_iter().map(Into::into).collect(),
            values,
        }
    }

    pub fn float_1d(dim: &str, data: Vec<f64>) -> Self {
        Self::new([dim], Values::Float(Array1::from_vec(data).into_dyn()))
    }

    pub fn text_1d(dim: &str, data: Vec<String>) -> Self {
        Self::new([dim], Values::Text(Array1::from_vec(data).into_dyn()))
    }

    pub fn datetime_1d(dim: &str, data: Vec<NaiveDateTime>) -> Self {
        Self::new([dim], Values::Datetime(Array1::from_vec(data).into_dyn()))
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    pub fn as_float(&self) -> Option<&ArrayD<f64>> {
        self.values.as_float()
    }

    pub fn as_text(&self) -> Option<&ArrayD<String>> {
        self.values.as_text()
    }

    pub fn as_datetime(&self) -> Option<&ArrayD<NaiveDateTime>> {
        self.values.as_datetime()
    }

    pub fn bit_eq(&self, other: &Variable) -> bool {
        self.dims == other.dims && self.values.bit_eq(&other.values)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    #[error("variable '{name}' has {ndim} dimension names but data of rank {rank}")]
    RankMismatch {
        name: String,
        ndim: usize,
        rank: usize,
    },
    #[error("variable '{name}' has length {found} along '{dim}', expected {expected}")]
    ShapeMismatch {
        name: String,
        dim: String,
        expected: usize,
        found: usize,
    },
    #[error("variable '{name}' repeats dimension '{dim}'")]
    RepeatedDimension { name: String, dim: String },
    #[error("'{0}' is defined more than once")]
    DuplicateName(String),
    #[error("coordinate '{0}' must be one-dimensional over a dimension of the same name")]
    InvalidCoordinate(String),
    #[error("dataset has no 'time' coordinate")]
    MissingTime,
}

/// Labeled multi-dimensional container: named dimensions, coordinate variables and data
/// variables. Immutable once built; transforms go through [`Dataset::into_builder`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    dims: IndexMap<String, usize>,
    coords: IndexMap<String, Variable>,
    data_vars: IndexMap<String, Variable>,
    attrs: IndexMap<String, String>,
}

impl Dataset {
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    pub fn into_builder(self) -> DatasetBuilder {
        DatasetBuilder {
            coords: self.coords,
            data_vars: self.data_vars,
            attrs: self.attrs,
        }
    }

    pub fn dims(&self) -> &IndexMap<String, usize> {
        &self.dims
    }

    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        self.dims.get(dim).copied()
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.dims.contains_key(dim)
    }

    pub fn coords(&self) -> &IndexMap<String, Variable> {
        &self.coords
    }

    pub fn data_vars(&self) -> &IndexMap<String, Variable> {
        &self.data_vars
    }

    pub fn attrs(&self) -> &IndexMap<String, String> {
        &self.attrs
    }

    pub fn coord(&self, name: &str) -> Option<&Variable> {
        self.coords.get(name)
    }

    pub fn data_var(&self, name: &str) -> Option<&Variable> {
        self.data_vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.coords.contains_key(name) || self.data_vars.contains_key(name)
    }

    pub fn time(&self) -> Option<&ArrayD<NaiveDateTime>> {
        self.coords.get(TIME_DIM).and_then(Variable::as_datetime)
    }

    pub fn depth(&self) -> Option<&ArrayD<f64>> {
        self.coords.get(DEPTH_DIM).and_then(Variable::as_float)
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.time().and_then(|time| time.iter().next().copied())
    }

    /// Same structure and attributes with every float compared by bit pattern. Unlike
    /// `==`, a dataset with missing (NaN) cells is `bit_eq` to itself.
    pub fn bit_eq(&self, other: &Dataset) -> bool {
        fn same_vars(a: &IndexMap<String, Variable>, b: &IndexMap<String, Variable>) -> bool {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|((na, va), (nb, vb))| na == nb && va.bit_eq(vb))
        }
        self.dims == other.dims
            && self.attrs == other.attrs
            && same_vars(&self.coords, &other.coords)
            && same_vars(&self.data_vars, &other.data_vars)
    }

    /// Sets a global attribute. Attributes never take part in validation.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset")?;
        let dims: Vec<String> = self
            .dims
            .iter()
            .map(|(name, len)| format!("{name}: {len}"))
            .collect();
        writeln!(f, "Dimensions:  ({})", dims.join(", "))?;
        writeln!(f, "Coordinates:")?;
        for (name, var) in &self.coords {
            writeln!(f, "  * {name:<40} ({}) {}", var.dims().join(", "), var.values().dtype())?;
        }
        writeln!(f, "Data variables:")?;
        for (name, var) in &self.data_vars {
            writeln!(f, "    {name:<40} ({}) {}", var.dims().join(", "), var.values().dtype())?;
        }
        if !self.attrs.is_empty() {
            writeln!(f, "Attributes:")?;
            for (key, value) in &self.attrs {
                writeln!(f, "    {key}: {value}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatasetBuilder {
    coords: IndexMap<String, Variable>,
    data_vars: IndexMap<String, Variable>,
    attrs: IndexMap<String, String>,
}

impl DatasetBuilder {
    pub fn coord(mut self, name: impl Into<String>, variable: Variable) -> Self {
        self.coords.insert(name.into(), variable);
        self
    }

    pub fn data_var(mut self, name: impl Into<String>, variable: Variable) -> Self {
        self.data_vars.insert(name.into(), variable);
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.coords.contains_key(name) || self.data_vars.contains_key(name)
    }

    /// Removes a data variable, keeping the relative order of the remaining ones.
    pub fn take_data_var(&mut self, name: &str) -> Option<Variable> {
        self.data_vars.shift_remove(name)
    }

    /// Renames a data variable in place within the variable order. Returns `false` when
    /// `from` is not a data variable.
    pub fn rename_data_var(&mut self, from: &str, to: impl Into<String>) -> bool {
        let Some(index) = self.data_vars.get_index_of(from) else {
            return false;
        };
        let Some((_, variable)) = self.data_vars.shift_remove_index(index) else {
            return false;
        };
        let (new_index, _) = self.data_vars.insert_full(to.into(), variable);
        self.data_vars.move_index(new_index, index);
        true
    }

    pub fn build(self) -> Result<Dataset, DatasetError> {
        for name in self.coords.keys() {
            if self.data_vars.contains_key(name) {
                return Err(DatasetError::DuplicateName(name.clone()));
            }
        }

        let mut dims: IndexMap<String, usize> = IndexMap::new();

        for (name, coord) in &self.coords {
            if coord.dims().len() != 1 || coord.dims()[0] != *name {
                return Err(DatasetError::InvalidCoordinate(name.clone()));
            }
        }

        for (name, variable) in self.coords.iter().chain(self.data_vars.iter()) {
            register_dims(&mut dims, name, variable)?;
        }

        if !self.coords.contains_key(TIME_DIM) {
            return Err(DatasetError::MissingTime);
        }

        Ok(Dataset {
            dims,
            coords: self.coords,
            data_vars: self.data_vars,
            attrs: self.attrs,
        })
    }
}

fn register_dims(
    dims: &mut IndexMap<String, usize>,
    name: &str,
    variable: &Variable,
) -> Result<(), DatasetError> {
    let shape = variable.shape();
    if shape.len() != variable.dims().len() {
        return Err(DatasetError::RankMismatch {
            name: name.to_string(),
            ndim: variable.dims().len(),
            rank: shape.len(),
        });
    }

    for (axis, dim) in variable.dims().iter().enumerate() {
        if variable.dims()[..axis].contains(dim) {
            return Err(DatasetError::RepeatedDimension {
                name: name.to_string(),
                dim: dim.clone(),
            });
        }
        let found = shape[axis];
        match dims.get(dim) {
            Some(&expected) if expected != found => {
                return Err(DatasetError::ShapeMismatch {
                    name: name.to_string(),
                    dim: dim.clone(),
                    expected,
                    found,
                });
            }
            Some(_) => {}
            None => {
                dims.insert(dim.clone(), found);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn times(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDateTime::parse_from_str("2020-12-01 00:00:00", "%Y-%m-%d %H:%M:%S")
            .expect("valid timestamp");
        (0..n)
            .map(|i| start + chrono::Duration::minutes(10 * i as i64))
            .collect()
    }

    #[test]
    fn build_registers_dimensions_in_order() {
        let ds = Dataset::builder()
            .coord(TIME_DIM, Variable::datetime_1d(TIME_DIM, times(3)))
            .coord(DEPTH_DIM, Variable::float_1d(DEPTH_DIM, vec![1.0, 5.0]))
            .data_var(
                "speed",
                Variable::new(
                    [TIME_DIM, DEPTH_DIM],
                    Values::Float(Array2::<f64>::zeros((3, 2)).into_dyn()),
                ),
            )
            .build()
            .expect("valid dataset");

        let dims: Vec<(&str, usize)> = ds.dims().iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(dims, vec![(TIME_DIM, 3), (DEPTH_DIM, 2)]);
        assert_eq!(ds.start_time(), Some(times(1)[0]));
    }

    #[test]
    fn build_rejects_shape_mismatch() {
        let err = Dataset::builder()
            .coord(TIME_DIM, Variable::datetime_1d(TIME_DIM, times(3)))
            .data_var("short", Variable::float_1d(TIME_DIM, vec![1.0, 2.0]))
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            DatasetError::ShapeMismatch {
                name: "short".to_string(),
                dim: TIME_DIM.to_string(),
                expected: 3,
                found: 2,
            }
        );
    }

    #[test]
    fn build_requires_time_coordinate() {
        let err = Dataset::builder()
            .data_var("x", Variable::float_1d(TIME_DIM, vec![1.0]))
            .build()
            .unwrap_err();
        assert_eq!(err, DatasetError::MissingTime);
    }

    #[test]
    fn rename_keeps_position() {
        let mut builder = Dataset::builder()
            .coord(TIME_DIM, Variable::datetime_1d(TIME_DIM, times(1)))
            .data_var("a", Variable::float_1d(TIME_DIM, vec![1.0]))
            .data_var("b", Variable::float_1d(TIME_DIM, vec![2.0]))
            .data_var("c", Variable::float_1d(TIME_DIM, vec![3.0]));

        assert!(builder.rename_data_var("b", "renamed"));
        assert!(!builder.rename_data_var("missing", "x"));

        let ds = builder.build().expect("valid dataset");
        let names: Vec<&str> = ds.data_vars().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "renamed", "c"]);
    }

    #[test]
    fn bit_eq_matches_missing_cells() {
        let with_gap = |value: f64| {
            Dataset::builder()
                .coord(TIME_DIM, Variable::datetime_1d(TIME_DIM, times(2)))
                .data_var("hmax", Variable::float_1d(TIME_DIM, vec![2.31, value]))
                .build()
                .expect("valid dataset")
        };

        assert!(with_gap(f64::NAN).bit_eq(&with_gap(f64::NAN)));
        assert_ne!(with_gap(f64::NAN), with_gap(f64::NAN));
        assert!(!with_gap(f64::NAN).bit_eq(&with_gap(2.4)));
        assert!(!with_gap(0.0).bit_eq(&with_gap(-0.0)));
    }
}
